//! The agent-facing action API surface.
//!
//! Every action carries a credential for identity binding and is validated
//! in the fixed order the component design lays out: authentication → issue
//! assignment → phase admissibility → resource → semantic → commit. Only
//! the commit step mutates state.

use serde::{Deserialize, Serialize};

use crate::models::proposal::ProposalBody;

/// An action submitted by an agent, bound to their credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Action {
    SubmitProposal { body: ProposalBody },
    SignalReady,
    SubmitFeedback { target_proposal_id: String, body: String },
    SubmitRevision { new_body: ProposalBody },
    StakeAdd { proposal_id: String, amount: i64 },
    StakeSwitch { stake_id: String, new_proposal_id: String },
    StakeWithdraw { stake_id: String },
}

/// Outcome of submitting an action, returned synchronously to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionResult {
    Ok,
    OkWithId(String),
    RejectedInvalidPhase,
    RejectedUnauthenticated,
    RejectedInsufficientCredit,
    RejectedQuotaExceeded,
    RejectedSemantic(String),
    RejectedNotFound,
}

impl ActionResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, ActionResult::Ok | ActionResult::OkWithId(_))
    }
}
