//! Domain models for the consensus engine.

pub mod agent;
pub mod feedback;
pub mod issue;
pub mod ledger;
pub mod proposal;
pub mod stake;

pub use agent::{Agent, Credential};
pub use feedback::FeedbackRecord;
pub use issue::{Issue, IssueStatus};
pub use ledger::{Ledger, LedgerEvent, LedgerRow};
pub use proposal::{dissimilarity, noaction_body, Proposal, ProposalBody, NOACTION_AUTHOR};
pub use stake::{StakeKind, StakeRecord};
