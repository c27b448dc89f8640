//! Round Table Consensus engine.
//!
//! A deterministic, tick-driven engine that runs a fixed-phase consensus
//! protocol (PROPOSE → FEEDBACK/REVISE cycles → STAKE rounds → FINALIZE)
//! over a single issue, with Conviction Points as the scarce resource
//! agents spend to propose, critique, revise, and stake on proposals.
//!
//! # Architecture
//!
//! - **core**: the logical clock driving tick advancement.
//! - **models**: domain types (Agent, Issue, Proposal, Stake, Ledger).
//! - **credit**: sole authority over CP balances and stake custody.
//! - **registry**: atomic stake storage and the conviction-weighting math.
//! - **graph**: the versioned proposal arena.
//! - **phase**: the phase state machine and per-phase turn tracking.
//! - **orchestrator**: the action API, tick loop, config, and checkpointing.
//!
//! # Critical invariants
//!
//! 1. Every CP unit is always either a liquid balance or a locked stake,
//!    never both, never neither.
//! 2. Every run is fully deterministic given its configuration and action
//!    sequence; nothing depends on wall-clock time or unseeded randomness.
//! 3. The ledger is append-only; nothing is ever mutated once committed.

pub mod core;
pub mod credit;
pub mod graph;
pub mod models;
pub mod orchestrator;
pub mod phase;
pub mod registry;

pub use core::time::Clock;
pub use credit::{CreditError, CreditManager};
pub use graph::{ProposalError, ProposalGraph};
pub use models::{Agent, Issue, IssueStatus, Ledger, LedgerEvent, Proposal, ProposalBody};
pub use orchestrator::{Action, ActionResult, Orchestrator, RtcConfig, SimulationError, TickResult};
pub use phase::{Phase, PhaseTracker};
pub use registry::{ConvictionParams, StakeRegistry};
