//! Versioned proposal graph.
//!
//! Arena-indexed by the stable `P<author>@v<n>` string ID inside a
//! `BTreeMap` for deterministic iteration order. Parent links are IDs, not
//! pointers; archived versions are never mutated again.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::models::ledger::{Ledger, LedgerEvent};
use crate::models::proposal::{dissimilarity, noaction_body, Proposal, ProposalBody, NOACTION_AUTHOR};

#[derive(Debug, Error, PartialEq)]
pub enum ProposalError {
    #[error("agent {agent_id} already has an active proposal")]
    AlreadyHasActiveProposal { agent_id: String },
    #[error("proposal {proposal_id} not found")]
    ProposalNotFound { proposal_id: String },
    #[error("proposal {proposal_id} is not authored by {agent_id}")]
    NotAuthor { agent_id: String, proposal_id: String },
    #[error("insufficient CP for self-stake")]
    InsufficientCpForStake,
}

/// Arena of proposal versions plus one active-line index per author.
#[derive(Debug, Clone, Default)]
pub struct ProposalGraph {
    versions: BTreeMap<String, Proposal>,
    active_by_author: BTreeMap<String, String>,
}

impl ProposalGraph {
    pub fn new() -> Self {
        Self {
            versions: BTreeMap::new(),
            active_by_author: BTreeMap::new(),
        }
    }

    pub fn get(&self, proposal_id: &str) -> Option<&Proposal> {
        self.versions.get(proposal_id)
    }

    pub fn active_proposal_for(&self, author_id: &str) -> Option<&Proposal> {
        self.active_by_author
            .get(author_id)
            .and_then(|id| self.versions.get(id))
    }

    pub fn has_active_proposal(&self, author_id: &str) -> bool {
        self.active_by_author.contains_key(author_id)
    }

    pub fn active_versions(&self) -> impl Iterator<Item = &Proposal> {
        self.active_by_author.values().filter_map(|id| self.versions.get(id))
    }

    /// Every stored version, active or archived. Used by checkpointing.
    pub fn all_versions(&self) -> impl Iterator<Item = &Proposal> {
        self.versions.values()
    }

    /// Insert a version rebuilt from a checkpoint, restoring the
    /// active-line index if it is marked active.
    pub fn restore_version(&mut self, proposal: Proposal) {
        if proposal.is_active() {
            self.active_by_author.insert(proposal.author_id().to_string(), proposal.id().to_string());
        }
        self.versions.insert(proposal.id().to_string(), proposal);
    }

    /// Create the canonical v1 proposal for `author_id`, without touching
    /// Credit Manager. The self-stake and any rejection path are the
    /// orchestrator's responsibility, since they require the credit ledger.
    pub fn submit(
        &mut self,
        ledger: &mut Ledger,
        author_id: &str,
        body: ProposalBody,
        tick: usize,
    ) -> Result<String, ProposalError> {
        if self.has_active_proposal(author_id) {
            return Err(ProposalError::AlreadyHasActiveProposal {
                agent_id: author_id.to_string(),
            });
        }
        let proposal = Proposal::new_v1(author_id.to_string(), "issue".to_string(), body, tick);
        let id = proposal.id().to_string();
        self.versions.insert(id.clone(), proposal);
        self.active_by_author.insert(author_id.to_string(), id.clone());
        ledger.append(LedgerEvent::ProposalAccepted {
            tick,
            agent_id: author_id.to_string(),
            proposal_id: id.clone(),
        });
        Ok(id)
    }

    /// Assign `author_id` to the canonical NoAction line. A separate
    /// NoAction proposal line is created per author so its self-stake
    /// custody still maps one-to-one with the owning agent, while the body
    /// content is shared and identical across every such line.
    pub fn submit_noaction(
        &mut self,
        ledger: &mut Ledger,
        author_id: &str,
        tick: usize,
    ) -> Result<String, ProposalError> {
        if self.has_active_proposal(author_id) {
            return Err(ProposalError::AlreadyHasActiveProposal {
                agent_id: author_id.to_string(),
            });
        }
        let body = noaction_body();
        let noaction_author = format!("{}{}", NOACTION_AUTHOR, author_id);
        let proposal = Proposal::new_v1(noaction_author, "issue".to_string(), body, tick);
        let id = proposal.id().to_string();
        self.versions.insert(id.clone(), proposal);
        self.active_by_author.insert(author_id.to_string(), id.clone());
        ledger.append(LedgerEvent::ProposalAccepted {
            tick,
            agent_id: author_id.to_string(),
            proposal_id: id.clone(),
        });
        Ok(id)
    }

    /// Compute the dissimilarity Δ between `author_id`'s current active
    /// version and a prospective new body, without committing anything.
    pub fn preview_delta(&self, author_id: &str, new_body: &ProposalBody) -> Result<f64, ProposalError> {
        let active = self
            .active_proposal_for(author_id)
            .ok_or_else(|| ProposalError::ProposalNotFound {
                proposal_id: author_id.to_string(),
            })?;
        Ok(dissimilarity(active.body(), new_body))
    }

    /// Create the next version in `author_id`'s line, archiving the parent.
    /// Self-stake transfer is the orchestrator's job (it needs Credit
    /// Manager); `cost` is supplied by the caller since only it knows the
    /// CP actually deducted for this revision.
    pub fn revise(
        &mut self,
        ledger: &mut Ledger,
        author_id: &str,
        new_body: ProposalBody,
        cost: i64,
        tick: usize,
    ) -> Result<(String, String, f64), ProposalError> {
        let parent_id = self
            .active_by_author
            .get(author_id)
            .cloned()
            .ok_or_else(|| ProposalError::ProposalNotFound {
                proposal_id: author_id.to_string(),
            })?;

        let delta = {
            let parent = self.versions.get(&parent_id).expect("active index always points at a stored version");
            dissimilarity(parent.body(), &new_body)
        };

        let new_version = {
            let parent = self.versions.get(&parent_id).unwrap();
            Proposal::revise_from(parent, new_body, tick)
        };
        let new_id = new_version.id().to_string();

        if let Some(parent) = self.versions.get_mut(&parent_id) {
            parent.archive();
        }
        self.versions.insert(new_id.clone(), new_version);
        self.active_by_author.insert(author_id.to_string(), new_id.clone());

        ledger.append(LedgerEvent::RevisionRecorded {
            tick,
            agent_id: author_id.to_string(),
            old_proposal_id: parent_id.clone(),
            new_proposal_id: new_id.clone(),
            delta,
            cost,
        });

        Ok((parent_id, new_id, delta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(action: &str) -> ProposalBody {
        ProposalBody::new("Title", action, "Rationale")
    }

    #[test]
    fn submit_creates_active_v1() {
        let mut ledger = Ledger::new();
        let mut graph = ProposalGraph::new();
        let id = graph.submit(&mut ledger, "A1", body("do the thing"), 0).unwrap();
        assert_eq!(id, "P-A1@v1");
        assert!(graph.has_active_proposal("A1"));
    }

    #[test]
    fn submit_rejects_second_proposal_for_same_author() {
        let mut ledger = Ledger::new();
        let mut graph = ProposalGraph::new();
        graph.submit(&mut ledger, "A1", body("first"), 0).unwrap();
        let result = graph.submit(&mut ledger, "A1", body("second"), 1);
        assert_eq!(
            result,
            Err(ProposalError::AlreadyHasActiveProposal {
                agent_id: "A1".to_string()
            })
        );
    }

    #[test]
    fn revise_archives_parent_and_activates_child() {
        let mut ledger = Ledger::new();
        let mut graph = ProposalGraph::new();
        graph.submit(&mut ledger, "A1", body("first draft"), 0).unwrap();
        let (old_id, new_id, delta) = graph.revise(&mut ledger, "A1", body("first draft revised"), 25, 5).unwrap();

        assert_eq!(old_id, "P-A1@v1");
        assert_eq!(new_id, "P-A1@v2");
        assert!(delta > 0.0);
        assert!(graph.get(&old_id).unwrap().is_archived());
        assert!(graph.get(&new_id).unwrap().is_active());
        assert_eq!(graph.active_proposal_for("A1").unwrap().id(), "P-A1@v2");
    }

    #[test]
    fn revise_with_identical_body_has_zero_delta() {
        let mut ledger = Ledger::new();
        let mut graph = ProposalGraph::new();
        graph.submit(&mut ledger, "A1", body("same text throughout"), 0).unwrap();
        let (_, _, delta) = graph.revise(&mut ledger, "A1", body("same text throughout"), 0, 1).unwrap();
        assert_eq!(delta, 0.0);
    }

    #[test]
    fn noaction_lines_are_distinct_per_author() {
        let mut ledger = Ledger::new();
        let mut graph = ProposalGraph::new();
        let id_a = graph.submit_noaction(&mut ledger, "A1", 0).unwrap();
        let id_b = graph.submit_noaction(&mut ledger, "A2", 0).unwrap();
        assert_ne!(id_a, id_b);
        assert!(graph.get(&id_a).unwrap().is_noaction());
    }
}
