//! Issue model.
//!
//! An issue is the single decision instance a consensus run resolves. Exactly
//! one issue is active per run; its assigned agent set and configuration
//! snapshot are frozen at creation.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Terminal state of an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueStatus {
    Active,
    Finalized,
}

/// A single decision instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    id: String,
    problem_statement: String,
    background: String,
    indicators: Vec<String>,
    goals: Vec<String>,
    attachments: Vec<String>,
    assigned_agents: BTreeSet<String>,
    created_tick: usize,
    status: IssueStatus,
}

impl Issue {
    pub fn new(
        id: String,
        problem_statement: String,
        background: String,
        assigned_agents: BTreeSet<String>,
        created_tick: usize,
    ) -> Self {
        Self {
            id,
            problem_statement,
            background,
            indicators: Vec::new(),
            goals: Vec::new(),
            attachments: Vec::new(),
            assigned_agents,
            created_tick,
            status: IssueStatus::Active,
        }
    }

    pub fn with_indicators(mut self, indicators: Vec<String>) -> Self {
        self.indicators = indicators;
        self
    }

    pub fn with_goals(mut self, goals: Vec<String>) -> Self {
        self.goals = goals;
        self
    }

    pub fn with_attachments(mut self, attachments: Vec<String>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn problem_statement(&self) -> &str {
        &self.problem_statement
    }

    pub fn background(&self) -> &str {
        &self.background
    }

    pub fn assigned_agents(&self) -> &BTreeSet<String> {
        &self.assigned_agents
    }

    pub fn is_assigned(&self, agent_uid: &str) -> bool {
        self.assigned_agents.contains(agent_uid)
    }

    pub fn created_tick(&self) -> usize {
        self.created_tick
    }

    pub fn status(&self) -> IssueStatus {
        self.status
    }

    pub fn finalize(&mut self) {
        self.status = IssueStatus::Finalized;
    }

    pub fn is_finalized(&self) -> bool {
        self.status == IssueStatus::Finalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Issue {
        let agents: BTreeSet<String> = ["A1", "A2", "A3"].iter().map(|s| s.to_string()).collect();
        Issue::new(
            "ISSUE-1".to_string(),
            "Should we adopt RTC?".to_string(),
            "Background text".to_string(),
            agents,
            0,
        )
    }

    #[test]
    fn starts_active() {
        let issue = sample();
        assert_eq!(issue.status(), IssueStatus::Active);
        assert!(!issue.is_finalized());
    }

    #[test]
    fn finalize_transitions_terminally() {
        let mut issue = sample();
        issue.finalize();
        assert!(issue.is_finalized());
    }

    #[test]
    fn tracks_assignment() {
        let issue = sample();
        assert!(issue.is_assigned("A1"));
        assert!(!issue.is_assigned("A9"));
    }
}
