//! Stake registry and conviction engine.
//!
//! Owns every atomic [`StakeRecord`] and the pure conviction math used to
//! score proposals. Mutation is still gated through
//! [`crate::credit::CreditManager`], which is the only component allowed to
//! create, move, or remove a stake; this module is the computational core it
//! drives.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::stake::{StakeKind, StakeRecord};

#[derive(Debug, Error, PartialEq)]
pub enum StakeError {
    #[error("stake {stake_id} not found")]
    StakeNotFound { stake_id: String },
    #[error("stake {stake_id} is a mandatory self-stake and cannot be switched or withdrawn")]
    StakeImmutable { stake_id: String },
}

/// Parameters governing the conviction-weighting curve. Frozen at
/// construction, mirroring the rest of the configuration surface.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConvictionParams {
    pub max_conviction_multiplier: f64,
    pub conviction_target_fraction: f64,
    pub conviction_saturation_rounds: u32,
}

impl ConvictionParams {
    /// `k = -ln(1 - ConvictionTargetFraction) / ConvictionSaturationRounds`
    fn k(&self) -> f64 {
        -(1.0 - self.conviction_target_fraction).ln() / self.conviction_saturation_rounds as f64
    }

    /// `mult(r) = 1 + (MaxConvictionMultiplier - 1) * (1 - exp(-k*r))`
    ///
    /// A pure function of `r` and configuration, independent of agent
    /// identity or proposal identity.
    pub fn multiplier(&self, rounds_held: u32) -> f64 {
        let k = self.k();
        1.0 + (self.max_conviction_multiplier - 1.0) * (1.0 - (-k * rounds_held as f64).exp())
    }
}

#[derive(Debug, Clone, Default)]
pub struct StakeRegistry {
    stakes: BTreeMap<String, StakeRecord>,
    next_id: u64,
    params: Option<ConvictionParams>,
}

impl StakeRegistry {
    pub fn new(params: ConvictionParams) -> Self {
        Self {
            stakes: BTreeMap::new(),
            next_id: 0,
            params: Some(params),
        }
    }

    fn params(&self) -> ConvictionParams {
        self.params.expect("StakeRegistry constructed without conviction params")
    }

    fn next_stake_id(&mut self) -> String {
        let id = format!("S{}", self.next_id);
        self.next_id += 1;
        id
    }

    /// Record a new atomic stake, returning its assigned ID.
    pub fn add(
        &mut self,
        agent_id: String,
        proposal_id: String,
        amount: i64,
        kind: StakeKind,
        tick: usize,
    ) -> String {
        let id = self.next_stake_id();
        let record = StakeRecord::new(id.clone(), agent_id, proposal_id, amount, tick, kind);
        self.stakes.insert(id.clone(), record);
        id
    }

    pub fn get(&self, stake_id: &str) -> Option<&StakeRecord> {
        self.stakes.get(stake_id)
    }

    /// Insert a stake record as-is, preserving its ID and `rounds_held`.
    /// Used only to rebuild a registry from a checkpoint; advances the
    /// internal ID counter past any numeric suffix it recognizes so freshly
    /// minted IDs never collide with a restored one.
    pub fn restore(&mut self, record: StakeRecord) {
        if let Some(n) = record.id().strip_prefix('S').and_then(|s| s.parse::<u64>().ok()) {
            self.next_id = self.next_id.max(n + 1);
        }
        self.stakes.insert(record.id().to_string(), record);
    }

    pub fn get_mut(&mut self, stake_id: &str) -> Option<&mut StakeRecord> {
        self.stakes.get_mut(stake_id)
    }

    /// Reduce a stake's locked amount in place, preserving its ID and
    /// `rounds_held`. Used by the auto-stake-tap path, which partially
    /// un-stakes a mandatory self-stake rather than replacing it.
    pub fn reduce_amount(&mut self, stake_id: &str, by: i64) -> Result<(), StakeError> {
        let stake = self
            .stakes
            .get_mut(stake_id)
            .ok_or_else(|| StakeError::StakeNotFound {
                stake_id: stake_id.to_string(),
            })?;
        stake.reduce_amount(by);
        Ok(())
    }

    pub fn remove(&mut self, stake_id: &str) -> Result<StakeRecord, StakeError> {
        self.stakes
            .remove(stake_id)
            .ok_or_else(|| StakeError::StakeNotFound {
                stake_id: stake_id.to_string(),
            })
    }

    pub fn stakes_for_proposal(&self, proposal_id: &str) -> Vec<&StakeRecord> {
        self.stakes
            .values()
            .filter(|s| s.proposal_id() == proposal_id)
            .collect()
    }

    pub fn stakes_for_agent(&self, agent_id: &str) -> Vec<&StakeRecord> {
        self.stakes
            .values()
            .filter(|s| s.agent_id() == agent_id)
            .collect()
    }

    pub fn all(&self) -> impl Iterator<Item = &StakeRecord> {
        self.stakes.values()
    }

    pub fn locked_by_agent(&self, agent_id: &str) -> i64 {
        self.stakes_for_agent(agent_id).iter().map(|s| s.amount()).sum()
    }

    /// Effective weight of a single stake under the current conviction curve.
    pub fn effective_weight(&self, stake: &StakeRecord) -> f64 {
        stake.amount() as f64 * self.params().multiplier(stake.rounds_held())
    }

    /// `score(proposal) = sqrt(sum of effective_weight over its active stakes)`.
    pub fn score(&self, proposal_id: &str) -> f64 {
        let total: f64 = self
            .stakes_for_proposal(proposal_id)
            .iter()
            .map(|s| self.effective_weight(s))
            .sum();
        total.sqrt()
    }

    /// Maximum origin tick of any stake currently targeting this proposal;
    /// used as the tie-breaker in FINALIZE.
    pub fn last_stake_tick(&self, proposal_id: &str) -> Option<usize> {
        self.stakes_for_proposal(proposal_id)
            .iter()
            .map(|s| s.origin_tick())
            .max()
    }

    /// Called once per STAKE round. Every stake whose ID is not in
    /// `moved_this_round` has its `rounds_held` incremented (saturating);
    /// stakes that moved already had their counter reset by the move itself.
    pub fn advance_round(&mut self, moved_this_round: &std::collections::HashSet<String>) {
        let saturation = self.params().conviction_saturation_rounds;
        for (id, stake) in self.stakes.iter_mut() {
            if !moved_this_round.contains(id) {
                stake.increment_rounds_held(saturation);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ConvictionParams {
        ConvictionParams {
            max_conviction_multiplier: 2.0,
            conviction_target_fraction: 0.98,
            conviction_saturation_rounds: 5,
        }
    }

    #[test]
    fn multiplier_at_zero_rounds_is_one() {
        assert_eq!(params().multiplier(0), 1.0);
    }

    #[test]
    fn multiplier_approaches_target_at_saturation() {
        let m = params().multiplier(5);
        // at r == ConvictionSaturationRounds, exp(-k*r) collapses to exactly
        // (1 - ConvictionTargetFraction) by construction of k.
        let expected = 1.0 + (2.0 - 1.0) * 0.98;
        assert!((m - expected).abs() < 1e-9);
    }

    #[test]
    fn multiplier_is_pure_function_of_rounds_and_config() {
        let a = params().multiplier(3);
        let b = params().multiplier(3);
        assert_eq!(a, b);
    }

    #[test]
    fn score_aggregates_multiple_stakes() {
        let mut registry = StakeRegistry::new(params());
        registry.add("A1".to_string(), "P-A2@v1".to_string(), 20, StakeKind::Voluntary, 0);
        registry.add("A3".to_string(), "P-A2@v1".to_string(), 10, StakeKind::Voluntary, 0);
        let score = registry.score("P-A2@v1");
        assert!((score - 30.0_f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn score_is_zero_for_unstaked_proposal() {
        let registry = StakeRegistry::new(params());
        assert_eq!(registry.score("P-X@v1"), 0.0);
    }

    #[test]
    fn advance_round_increments_unmoved_stakes_only() {
        let mut registry = StakeRegistry::new(params());
        let id = registry.add("A1".to_string(), "P-A2@v1".to_string(), 20, StakeKind::Voluntary, 0);
        registry.advance_round(&std::collections::HashSet::new());
        assert_eq!(registry.get(&id).unwrap().rounds_held(), 1);
    }

    #[test]
    fn advance_round_skips_moved_stakes() {
        let mut registry = StakeRegistry::new(params());
        let id = registry.add("A1".to_string(), "P-A2@v1".to_string(), 20, StakeKind::Voluntary, 0);
        let moved: std::collections::HashSet<String> = [id.clone()].into_iter().collect();
        registry.advance_round(&moved);
        assert_eq!(registry.get(&id).unwrap().rounds_held(), 0);
    }

    #[test]
    fn restore_preserves_id_and_rounds_held() {
        let mut registry = StakeRegistry::new(params());
        let mut record = StakeRecord::new(
            "S7".to_string(),
            "A1".to_string(),
            "P-A2@v1".to_string(),
            20,
            0,
            StakeKind::Voluntary,
        );
        record.increment_rounds_held(5);
        registry.restore(record);
        assert_eq!(registry.get("S7").unwrap().rounds_held(), 1);
        let fresh_id = registry.add("A3".to_string(), "P-A2@v1".to_string(), 5, StakeKind::Voluntary, 0);
        assert_ne!(fresh_id, "S7");
    }

    #[test]
    fn last_stake_tick_tracks_maximum_origin() {
        let mut registry = StakeRegistry::new(params());
        registry.add("A1".to_string(), "P-A2@v1".to_string(), 20, StakeKind::Voluntary, 10);
        registry.add("A3".to_string(), "P-A2@v1".to_string(), 10, StakeKind::Voluntary, 42);
        assert_eq!(registry.last_stake_tick("P-A2@v1"), Some(42));
    }
}
