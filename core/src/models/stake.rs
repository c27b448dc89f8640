//! Atomic stake records.
//!
//! Conviction accrues per stake record, not per agent: two stakes placed by
//! the same agent on the same proposal carry independent `rounds_held`
//! counters keyed by their own origin ticks.

use serde::{Deserialize, Serialize};

/// Whether a stake is the mandatory self-stake locked at proposal submission,
/// or a voluntary stake placed during a STAKE round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StakeKind {
    MandatorySelf,
    Voluntary,
}

/// A single atomic unit of locked CP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakeRecord {
    id: String,
    agent_id: String,
    proposal_id: String,
    amount: i64,
    origin_tick: usize,
    rounds_held: u32,
    kind: StakeKind,
}

impl StakeRecord {
    pub fn new(
        id: String,
        agent_id: String,
        proposal_id: String,
        amount: i64,
        origin_tick: usize,
        kind: StakeKind,
    ) -> Self {
        Self {
            id,
            agent_id,
            proposal_id,
            amount,
            origin_tick,
            rounds_held: 0,
            kind,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn proposal_id(&self) -> &str {
        &self.proposal_id
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn origin_tick(&self) -> usize {
        self.origin_tick
    }

    pub fn rounds_held(&self) -> u32 {
        self.rounds_held
    }

    pub fn kind(&self) -> StakeKind {
        self.kind
    }

    pub fn is_mandatory(&self) -> bool {
        matches!(self.kind, StakeKind::MandatorySelf)
    }

    /// Called once per STAKE round for stakes that did not move this round.
    pub fn increment_rounds_held(&mut self, saturation_rounds: u32) {
        self.rounds_held = (self.rounds_held + 1).min(saturation_rounds);
    }

    /// Reset to a fresh hold, returning the previous count for event logging.
    pub fn reset_rounds_held(&mut self) -> u32 {
        let previous = self.rounds_held;
        self.rounds_held = 0;
        previous
    }

    /// Reduce the locked amount in place (partial un-stake via auto-tap).
    /// Does not touch `rounds_held` or `proposal_id`.
    pub fn reduce_amount(&mut self, by: i64) {
        self.amount -= by;
    }

    /// Move this record onto a different proposal (switch or transfer on
    /// revision). Retarget does not itself reset `rounds_held`; callers
    /// decide (revision transfer preserves it, voluntary switch resets it).
    pub fn retarget(&mut self, new_proposal_id: String, new_origin_tick: usize) {
        self.proposal_id = new_proposal_id;
        self.origin_tick = new_origin_tick;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StakeRecord {
        StakeRecord::new(
            "S1".to_string(),
            "A1".to_string(),
            "P-A2@v1".to_string(),
            20,
            10,
            StakeKind::Voluntary,
        )
    }

    #[test]
    fn starts_with_zero_rounds_held() {
        assert_eq!(sample().rounds_held(), 0);
    }

    #[test]
    fn increment_saturates_at_bound() {
        let mut stake = sample();
        for _ in 0..10 {
            stake.increment_rounds_held(5);
        }
        assert_eq!(stake.rounds_held(), 5);
    }

    #[test]
    fn reset_returns_previous_value() {
        let mut stake = sample();
        stake.increment_rounds_held(5);
        stake.increment_rounds_held(5);
        let previous = stake.reset_rounds_held();
        assert_eq!(previous, 2);
        assert_eq!(stake.rounds_held(), 0);
    }

    #[test]
    fn mandatory_self_is_flagged() {
        let mandatory = StakeRecord::new(
            "S2".to_string(),
            "A1".to_string(),
            "P-A1@v1".to_string(),
            50,
            0,
            StakeKind::MandatorySelf,
        );
        assert!(mandatory.is_mandatory());
        assert!(!sample().is_mandatory());
    }
}
