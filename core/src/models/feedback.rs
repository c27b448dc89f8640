//! Feedback records.
//!
//! Append-only and never revised: once submitted, a feedback record is part
//! of the permanent audit trail for the proposal it targets.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    author_id: String,
    target_proposal_id: String,
    body: String,
    created_tick: usize,
}

impl FeedbackRecord {
    pub fn new(
        author_id: String,
        target_proposal_id: String,
        body: String,
        created_tick: usize,
    ) -> Self {
        Self {
            author_id,
            target_proposal_id,
            body,
            created_tick,
        }
    }

    pub fn author_id(&self) -> &str {
        &self.author_id
    }

    pub fn target_proposal_id(&self) -> &str {
        &self.target_proposal_id
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn created_tick(&self) -> usize {
        self.created_tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_fields_as_given() {
        let fb = FeedbackRecord::new(
            "A1".to_string(),
            "P-A2@v1".to_string(),
            "Consider the edge cases around revision cost.".to_string(),
            3,
        );
        assert_eq!(fb.author_id(), "A1");
        assert_eq!(fb.target_proposal_id(), "P-A2@v1");
        assert_eq!(fb.created_tick(), 3);
    }
}
