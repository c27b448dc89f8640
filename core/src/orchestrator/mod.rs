//! Orchestrator — the process-wide driver and its supporting modules.
//!
//! See `engine.rs` for the main tick loop and action API.

pub mod action;
pub mod checkpoint;
pub mod config;
pub mod engine;

pub use action::{Action, ActionResult};
pub use checkpoint::{compute_config_hash, AgentSnapshot, ProposalSnapshot, StakeSnapshot, StateSnapshot};
pub use config::{AgentRosterEntry, ConfigError, RtcConfig, MAX_STAKE_ROUNDS};
pub use engine::{Orchestrator, SimulationError, TickResult};
