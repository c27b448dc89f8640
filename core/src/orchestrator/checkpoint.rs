//! Checkpoint — save/restore a run's full state.
//!
//! Enables pausing and resuming a consensus run without losing the audit
//! trail or the conviction curve's progress.
//!
//! # Critical invariants
//!
//! - **Determinism**: same config + replayed action sequence reproduces
//!   identical state.
//! - **CP conservation**: every CP unit is either a liquid balance or a
//!   locked stake amount, never both, never neither.
//! - **Config matching**: a snapshot can only be restored against the
//!   config whose hash it recorded.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::agent::Agent;
use crate::models::proposal::{Proposal, ProposalBody};
use crate::models::stake::{StakeKind, StakeRecord};
use crate::orchestrator::config::RtcConfig;
use crate::orchestrator::engine::SimulationError;
use crate::phase::Phase;

/// Complete orchestrator state snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Opaque identifier for this snapshot, distinct from the run's own IDs.
    pub snapshot_id: String,
    pub tick: usize,
    pub phase: Phase,
    /// Total CP in circulation at time of snapshot, independent of the
    /// agent/stake lists below, so `validate_snapshot` can catch a snapshot
    /// whose own fields are internally consistent but drifted from the run.
    pub total_cp: i64,
    pub agents: Vec<AgentSnapshot>,
    pub proposals: Vec<ProposalSnapshot>,
    pub stakes: Vec<StakeSnapshot>,
    /// SHA256 hash of the config this snapshot was taken under.
    pub config_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub uid: String,
    pub display_name: String,
    pub enrolled: bool,
    pub balance: i64,
}

impl AgentSnapshot {
    pub fn from_agent(agent: &Agent, balance: i64) -> Self {
        Self {
            uid: agent.uid().to_string(),
            display_name: agent.display_name().to_string(),
            enrolled: agent.is_enrolled(),
            balance,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalSnapshot {
    pub id: String,
    pub author_id: String,
    pub issue_id: String,
    pub parent_id: Option<String>,
    pub version: u32,
    pub body: ProposalBody,
    pub created_tick: usize,
    pub updated_tick: usize,
    pub archived: bool,
    pub active: bool,
}

impl From<&Proposal> for ProposalSnapshot {
    fn from(p: &Proposal) -> Self {
        Self {
            id: p.id().to_string(),
            author_id: p.author_id().to_string(),
            issue_id: p.issue_id().to_string(),
            parent_id: p.parent_id().map(|s| s.to_string()),
            version: p.version(),
            body: p.body().clone(),
            created_tick: p.created_tick(),
            updated_tick: p.updated_tick(),
            archived: p.is_archived(),
            active: p.is_active(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakeSnapshot {
    pub id: String,
    pub agent_id: String,
    pub proposal_id: String,
    pub amount: i64,
    pub origin_tick: usize,
    pub rounds_held: u32,
    pub kind: StakeKind,
}

impl From<&StakeRecord> for StakeSnapshot {
    fn from(s: &StakeRecord) -> Self {
        Self {
            id: s.id().to_string(),
            agent_id: s.agent_id().to_string(),
            proposal_id: s.proposal_id().to_string(),
            amount: s.amount(),
            origin_tick: s.origin_tick(),
            rounds_held: s.rounds_held(),
            kind: s.kind(),
        }
    }
}

/// Generate a fresh opaque snapshot identifier.
pub fn new_snapshot_id() -> String {
    Uuid::new_v4().to_string()
}

/// Deterministic SHA256 hash of a config, used to verify that a snapshot is
/// restored against the config it was taken under. Canonicalizes key order
/// first so hashing never depends on map iteration order.
pub fn compute_config_hash(config: &RtcConfig) -> String {
    use serde_json::Value;
    use std::collections::BTreeMap;

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

    let value = serde_json::to_value(config).expect("RtcConfig always serializes");
    let canonical = canonicalize(value);
    let json = serde_json::to_string(&canonical).expect("canonical value always serializes");

    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Validate a snapshot's internal integrity before it is accepted for
/// resume: CP conservation and stake/proposal referential integrity.
pub fn validate_snapshot(snapshot: &StateSnapshot, expected_total_cp: i64) -> Result<(), SimulationError> {
    let liquid: i64 = snapshot.agents.iter().map(|a| a.balance).sum();
    let locked: i64 = snapshot.stakes.iter().map(|s| s.amount).sum();
    if liquid + locked != expected_total_cp {
        return Err(SimulationError::SnapshotInvalid(format!(
            "CP conservation violated: expected {}, found {} liquid + {} locked",
            expected_total_cp, liquid, locked
        )));
    }

    let proposal_ids: HashMap<&str, ()> = snapshot.proposals.iter().map(|p| (p.id.as_str(), ())).collect();
    for stake in &snapshot.stakes {
        if !proposal_ids.contains_key(stake.proposal_id.as_str()) {
            return Err(SimulationError::SnapshotInvalid(format!(
                "stake {} targets unknown proposal {}",
                stake.id, stake.proposal_id
            )));
        }
    }

    let mut active_lines: HashMap<&str, u32> = HashMap::new();
    for proposal in &snapshot.proposals {
        if proposal.active {
            *active_lines.entry(proposal.author_id.as_str()).or_insert(0) += 1;
        }
    }
    if active_lines.values().any(|count| *count > 1) {
        return Err(SimulationError::SnapshotInvalid(
            "an author line has more than one active proposal version".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_hash_is_deterministic() {
        let h1 = compute_config_hash(&RtcConfig::default());
        let h2 = compute_config_hash(&RtcConfig::default());
        assert_eq!(h1, h2);
    }

    #[test]
    fn config_hash_differs_for_different_configs() {
        let mut other = RtcConfig::default();
        other.stake_rounds = 7;
        assert_ne!(compute_config_hash(&RtcConfig::default()), compute_config_hash(&other));
    }

    fn sample_snapshot() -> StateSnapshot {
        StateSnapshot {
            snapshot_id: new_snapshot_id(),
            tick: 3,
            phase: Phase::Stake(1),
            total_cp: 100,
            agents: vec![AgentSnapshot {
                uid: "A1".to_string(),
                display_name: "Alice".to_string(),
                enrolled: true,
                balance: 50,
            }],
            proposals: vec![ProposalSnapshot {
                id: "P-A1@v1".to_string(),
                author_id: "A1".to_string(),
                issue_id: "ISSUE-1".to_string(),
                parent_id: None,
                version: 1,
                body: ProposalBody::new("T", "A", "R"),
                created_tick: 0,
                updated_tick: 0,
                archived: false,
                active: true,
            }],
            stakes: vec![StakeSnapshot {
                id: "S0".to_string(),
                agent_id: "A1".to_string(),
                proposal_id: "P-A1@v1".to_string(),
                amount: 50,
                origin_tick: 0,
                rounds_held: 1,
                kind: StakeKind::MandatorySelf,
            }],
            config_hash: compute_config_hash(&RtcConfig::default()),
        }
    }

    #[test]
    fn validate_snapshot_accepts_conserved_cp() {
        assert!(validate_snapshot(&sample_snapshot(), 100).is_ok());
    }

    #[test]
    fn validate_snapshot_rejects_cp_mismatch() {
        assert!(validate_snapshot(&sample_snapshot(), 999).is_err());
    }

    #[test]
    fn validate_snapshot_rejects_dangling_stake() {
        let mut snapshot = sample_snapshot();
        snapshot.stakes[0].proposal_id = "P-GHOST@v1".to_string();
        assert!(validate_snapshot(&snapshot, 100).is_err());
    }

    #[test]
    fn validate_snapshot_rejects_multiple_active_versions_same_author() {
        let mut snapshot = sample_snapshot();
        let mut duplicate = snapshot.proposals[0].clone();
        duplicate.id = "P-A1@v2".to_string();
        duplicate.version = 2;
        snapshot.proposals.push(duplicate);
        assert!(validate_snapshot(&snapshot, 100).is_err());
    }
}
