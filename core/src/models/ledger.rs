//! The append-only event log for consensus state changes.
//!
//! This module defines the `LedgerEvent` enum, which captures every
//! state-changing or rejected action during a run. The ledger doubles as the
//! system's only observability surface: there is no separate logging
//! backend, because the audit trail already is the log. Events enable:
//! - Deterministic replay (re-run the committed action sequence)
//! - Debugging (reconstruct what happened and when)
//! - Auditing (verify CP conservation and phase integrity)
//! - Blind-staking visibility windows (queries filter by committed round)
//!
//! # Example
//!
//! ```
//! use round_table_core_rs::models::ledger::{Ledger, LedgerEvent};
//!
//! let mut ledger = Ledger::new();
//! let seq = ledger.append(LedgerEvent::CreditAward {
//!     tick: 0,
//!     agent_id: "A1".to_string(),
//!     amount: 100,
//!     reason: "enrollment".to_string(),
//! });
//! assert_eq!(seq, 0);
//! assert_eq!(ledger.len(), 1);
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single immutable entry in the ledger.
///
/// All events carry a `tick` for temporal ordering; the enclosing
/// [`Ledger`] assigns the monotonic `seq` and `phase` at append time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LedgerEvent {
    CreditAward {
        tick: usize,
        agent_id: String,
        amount: i64,
        reason: String,
    },
    CreditBurn {
        tick: usize,
        agent_id: String,
        amount: i64,
        reason: String,
    },
    StakeRecorded {
        tick: usize,
        agent_id: String,
        stake_id: String,
        proposal_id: String,
        amount: i64,
        mandatory: bool,
    },
    StakeSwitched {
        tick: usize,
        agent_id: String,
        stake_id: String,
        from_proposal: String,
        to_proposal: String,
        previous_rounds_held: u32,
    },
    StakeWithdrawn {
        tick: usize,
        agent_id: String,
        stake_id: String,
        proposal_id: String,
        amount: i64,
        reason: String,
    },
    ConvictionUpdated {
        tick: usize,
        stake_id: String,
        rounds_held: u32,
        weight: f64,
    },
    ConvictionSwitched {
        tick: usize,
        stake_id: String,
        previous_rounds_held: u32,
    },
    ProposalAccepted {
        tick: usize,
        agent_id: String,
        proposal_id: String,
    },
    ProposalRejected {
        tick: usize,
        agent_id: String,
        reason: String,
    },
    RevisionRecorded {
        tick: usize,
        agent_id: String,
        old_proposal_id: String,
        new_proposal_id: String,
        delta: f64,
        cost: i64,
    },
    FeedbackRecorded {
        tick: usize,
        agent_id: String,
        target_proposal_id: String,
    },
    InsufficientCredit {
        tick: usize,
        agent_id: String,
        needed: i64,
        available: i64,
        context: String,
    },
    AgentReady {
        tick: usize,
        agent_id: String,
    },
    PhaseTransition {
        tick: usize,
        from_phase: String,
        to_phase: String,
    },
    PhaseTimeout {
        tick: usize,
        agent_id: String,
        phase: String,
    },
    Finalize {
        tick: usize,
        winner_proposal_id: String,
        score: f64,
        tie_broken: bool,
    },
}

impl LedgerEvent {
    /// Tick at which this event occurred.
    pub fn tick(&self) -> usize {
        match self {
            LedgerEvent::CreditAward { tick, .. }
            | LedgerEvent::CreditBurn { tick, .. }
            | LedgerEvent::StakeRecorded { tick, .. }
            | LedgerEvent::StakeSwitched { tick, .. }
            | LedgerEvent::StakeWithdrawn { tick, .. }
            | LedgerEvent::ConvictionUpdated { tick, .. }
            | LedgerEvent::ConvictionSwitched { tick, .. }
            | LedgerEvent::ProposalAccepted { tick, .. }
            | LedgerEvent::ProposalRejected { tick, .. }
            | LedgerEvent::RevisionRecorded { tick, .. }
            | LedgerEvent::FeedbackRecorded { tick, .. }
            | LedgerEvent::InsufficientCredit { tick, .. }
            | LedgerEvent::AgentReady { tick, .. }
            | LedgerEvent::PhaseTransition { tick, .. }
            | LedgerEvent::PhaseTimeout { tick, .. }
            | LedgerEvent::Finalize { tick, .. } => *tick,
        }
    }

    /// Short tag used as the `event_type` column and for `events_of_type` queries.
    pub fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::CreditAward { .. } => "credit_award",
            LedgerEvent::CreditBurn { .. } => "credit_burn",
            LedgerEvent::StakeRecorded { .. } => "stake_recorded",
            LedgerEvent::StakeSwitched { .. } => "stake_switched",
            LedgerEvent::StakeWithdrawn { .. } => "stake_withdrawn",
            LedgerEvent::ConvictionUpdated { .. } => "conviction_updated",
            LedgerEvent::ConvictionSwitched { .. } => "conviction_switched",
            LedgerEvent::ProposalAccepted { .. } => "proposal_accepted",
            LedgerEvent::ProposalRejected { .. } => "proposal_rejected",
            LedgerEvent::RevisionRecorded { .. } => "revision_recorded",
            LedgerEvent::FeedbackRecorded { .. } => "feedback_recorded",
            LedgerEvent::InsufficientCredit { .. } => "insufficient_credit",
            LedgerEvent::AgentReady { .. } => "agent_ready",
            LedgerEvent::PhaseTransition { .. } => "phase_transition",
            LedgerEvent::PhaseTimeout { .. } => "phase_timeout",
            LedgerEvent::Finalize { .. } => "finalize",
        }
    }

    /// Agent this event is attributed to, if any.
    pub fn agent_id(&self) -> Option<&str> {
        match self {
            LedgerEvent::CreditAward { agent_id, .. }
            | LedgerEvent::CreditBurn { agent_id, .. }
            | LedgerEvent::StakeRecorded { agent_id, .. }
            | LedgerEvent::StakeSwitched { agent_id, .. }
            | LedgerEvent::StakeWithdrawn { agent_id, .. }
            | LedgerEvent::ProposalAccepted { agent_id, .. }
            | LedgerEvent::ProposalRejected { agent_id, .. }
            | LedgerEvent::RevisionRecorded { agent_id, .. }
            | LedgerEvent::FeedbackRecorded { agent_id, .. }
            | LedgerEvent::InsufficientCredit { agent_id, .. }
            | LedgerEvent::AgentReady { agent_id, .. }
            | LedgerEvent::PhaseTimeout { agent_id, .. } => Some(agent_id),
            _ => None,
        }
    }

    /// Canonical JSON payload with recursively sorted object keys, so two
    /// logically identical events serialize byte-for-byte identically
    /// regardless of internal map iteration order.
    pub fn payload_json(&self) -> String {
        let value = serde_json::to_value(self).expect("LedgerEvent always serializes");
        let canonical = canonicalize(value);
        serde_json::to_string(&canonical).expect("canonical value always serializes")
    }
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> =
                map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(arr) => Value::Array(arr.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// A fully committed row: the immutable envelope around a [`LedgerEvent`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerRow {
    pub seq: u64,
    pub tick: usize,
    pub phase: String,
    pub event: LedgerEvent,
}

/// Append-only, sequence-numbered event log.
///
/// Single-writer: all mutation funnels through [`Ledger::append`], which
/// assigns the next `seq`. Nothing is ever mutated or removed once
/// committed; `clear` exists only for test fixtures.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    rows: Vec<LedgerRow>,
    current_phase_label: String,
    finalized: bool,
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            rows: Vec::new(),
            current_phase_label: "propose".to_string(),
            finalized: false,
        }
    }

    /// Inform the ledger of the current phase label, used to tag subsequent
    /// appended rows. Does not itself append an event.
    pub fn set_phase_label(&mut self, label: impl Into<String>) {
        self.current_phase_label = label.into();
    }

    pub fn phase_label(&self) -> &str {
        &self.current_phase_label
    }

    /// Append an event, returning its assigned sequence number.
    ///
    /// The ledger itself never rejects or panics on a post-finalize append;
    /// it trusts the orchestrator's own phase gating (`submit_action` and
    /// `tick` both refuse to dispatch once the phase is terminal) to make
    /// that case unreachable. `is_finalized` is exposed so callers can
    /// assert the invariant themselves if they want to.
    pub fn append(&mut self, event: LedgerEvent) -> u64 {
        if matches!(event, LedgerEvent::Finalize { .. }) {
            self.finalized = true;
        }
        let seq = self.rows.len() as u64;
        self.rows.push(LedgerRow {
            seq,
            tick: event.tick(),
            phase: self.current_phase_label.clone(),
            event,
        });
        seq
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn rows(&self) -> &[LedgerRow] {
        &self.rows
    }

    /// Rows with `from_seq <= seq < to_seq`.
    pub fn range(&self, from_seq: u64, to_seq: u64) -> Vec<&LedgerRow> {
        self.rows
            .iter()
            .filter(|r| r.seq >= from_seq && r.seq < to_seq)
            .collect()
    }

    pub fn rows_at_tick(&self, tick: usize) -> Vec<&LedgerRow> {
        self.rows.iter().filter(|r| r.tick == tick).collect()
    }

    pub fn rows_of_type(&self, event_type: &str) -> Vec<&LedgerRow> {
        self.rows
            .iter()
            .filter(|r| r.event.event_type() == event_type)
            .collect()
    }

    pub fn rows_for_agent(&self, agent_id: &str) -> Vec<&LedgerRow> {
        self.rows
            .iter()
            .filter(|r| r.event.agent_id() == Some(agent_id))
            .collect()
    }

    /// All rows with `tick <= max_tick`, implementing the blind-staking
    /// visibility filter for `query_state`.
    pub fn rows_visible_through(&self, max_tick: usize) -> Vec<&LedgerRow> {
        self.rows.iter().filter(|r| r.tick <= max_tick).collect()
    }

    #[cfg(test)]
    fn clear(&mut self) {
        self.rows.clear();
        self.finalized = false;
    }
}
