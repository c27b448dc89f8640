//! Phase engine: the tagged-variant state machine driving a run.
//!
//! Modeled per the design note as `Phase = Propose | Feedback(i) | Revise(i)
//! | Stake(j) | Finalize`, with per-phase turn tracking (readiness plus a
//! "think" timeout) kept separately in [`PhaseTracker`] so the enum itself
//! stays a plain, cheap-to-copy tag.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum PhaseError {
    #[error("action not valid in phase {phase}")]
    InvalidForPhase { phase: String },
}

/// A single state in the fixed RTC lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Propose,
    Feedback(u32),
    Revise(u32),
    Stake(u32),
    Finalize,
}

impl Phase {
    /// Short tag used to label ledger rows.
    pub fn label(&self) -> String {
        match self {
            Phase::Propose => "propose".to_string(),
            Phase::Feedback(i) => format!("feedback_{i}"),
            Phase::Revise(i) => format!("revise_{i}"),
            Phase::Stake(j) => format!("stake_{j}"),
            Phase::Finalize => "finalize".to_string(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Finalize)
    }

    pub fn is_stake(&self) -> bool {
        matches!(self, Phase::Stake(_))
    }

    /// Compute the next phase given the configured repetition counts.
    /// `Finalize` is absorbing.
    pub fn next(&self, revision_cycles: u32, stake_rounds: u32) -> Phase {
        match *self {
            Phase::Propose => {
                if revision_cycles == 0 {
                    advance_into_stake(0, stake_rounds)
                } else {
                    Phase::Feedback(1)
                }
            }
            Phase::Feedback(i) => Phase::Revise(i),
            Phase::Revise(i) => {
                if i >= revision_cycles {
                    advance_into_stake(0, stake_rounds)
                } else {
                    Phase::Feedback(i + 1)
                }
            }
            Phase::Stake(j) => {
                if j >= stake_rounds {
                    Phase::Finalize
                } else {
                    Phase::Stake(j + 1)
                }
            }
            Phase::Finalize => Phase::Finalize,
        }
    }
}

fn advance_into_stake(_unused: u32, stake_rounds: u32) -> Phase {
    if stake_rounds == 0 {
        Phase::Finalize
    } else {
        Phase::Stake(1)
    }
}

/// Tracks per-phase turn completion: who has signaled ready or acted, and
/// how many consecutive idle ticks each assigned agent has accumulated.
#[derive(Debug, Clone, Default)]
pub struct PhaseTracker {
    ready: BTreeSet<String>,
    think_ticks: std::collections::BTreeMap<String, u32>,
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear turn state; called on every phase transition.
    pub fn reset(&mut self) {
        self.ready.clear();
        self.think_ticks.clear();
    }

    pub fn mark_ready(&mut self, agent_id: &str) {
        self.ready.insert(agent_id.to_string());
    }

    pub fn is_ready(&self, agent_id: &str) -> bool {
        self.ready.contains(agent_id)
    }

    /// Every assigned agent either acted or was kicked out this tick.
    pub fn all_ready(&self, assigned: &BTreeSet<String>) -> bool {
        assigned.iter().all(|a| self.ready.contains(a))
    }

    /// Advance the think-tick counter for every not-yet-ready assigned
    /// agent; returns those whose counter just reached `max_think_ticks`
    /// (candidates for kick-out substitution this tick).
    pub fn advance_think_ticks(
        &mut self,
        assigned: &BTreeSet<String>,
        max_think_ticks: u32,
    ) -> Vec<String> {
        let mut timed_out = Vec::new();
        for agent_id in assigned {
            if self.ready.contains(agent_id) {
                continue;
            }
            let counter = self.think_ticks.entry(agent_id.clone()).or_insert(0);
            *counter += 1;
            if *counter >= max_think_ticks {
                timed_out.push(agent_id.clone());
            }
        }
        timed_out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn propose_advances_to_first_feedback_round() {
        assert_eq!(Phase::Propose.next(2, 3), Phase::Feedback(1));
    }

    #[test]
    fn feedback_advances_to_matching_revise() {
        assert_eq!(Phase::Feedback(1).next(2, 3), Phase::Revise(1));
    }

    #[test]
    fn revise_cycles_until_exhausted_then_enters_stake() {
        assert_eq!(Phase::Revise(1).next(2, 3), Phase::Feedback(2));
        assert_eq!(Phase::Revise(2).next(2, 3), Phase::Stake(1));
    }

    #[test]
    fn stake_rounds_then_finalize() {
        assert_eq!(Phase::Stake(1).next(2, 3), Phase::Stake(2));
        assert_eq!(Phase::Stake(3).next(2, 3), Phase::Finalize);
    }

    #[test]
    fn finalize_is_absorbing() {
        assert_eq!(Phase::Finalize.next(2, 3), Phase::Finalize);
    }

    #[test]
    fn zero_revision_cycles_skips_straight_to_stake() {
        assert_eq!(Phase::Propose.next(0, 1), Phase::Stake(1));
    }

    #[test]
    fn zero_stake_rounds_skips_straight_to_finalize() {
        assert_eq!(Phase::Revise(1).next(1, 0), Phase::Finalize);
    }

    #[test]
    fn tracker_all_ready_requires_every_assigned_agent() {
        let mut tracker = PhaseTracker::new();
        let assigned: BTreeSet<String> = ["A1", "A2"].iter().map(|s| s.to_string()).collect();
        tracker.mark_ready("A1");
        assert!(!tracker.all_ready(&assigned));
        tracker.mark_ready("A2");
        assert!(tracker.all_ready(&assigned));
    }

    #[test]
    fn tracker_reports_timeouts_at_max_think_ticks() {
        let mut tracker = PhaseTracker::new();
        let assigned: BTreeSet<String> = ["A1"].iter().map(|s| s.to_string()).collect();
        assert!(tracker.advance_think_ticks(&assigned, 3).is_empty());
        assert!(tracker.advance_think_ticks(&assigned, 3).is_empty());
        let timed_out = tracker.advance_think_ticks(&assigned, 3);
        assert_eq!(timed_out, vec!["A1".to_string()]);
    }

    #[test]
    fn tracker_reset_clears_readiness_and_counters() {
        let mut tracker = PhaseTracker::new();
        tracker.mark_ready("A1");
        tracker.reset();
        assert!(!tracker.is_ready("A1"));
    }
}
