//! Versioned proposals.
//!
//! A proposal line is a chain of immutable versions sharing one author;
//! exactly one version per line is ever `active`. The canonical NoAction
//! proposal is the one line shared by every agent who never submits their
//! own content.

use serde::{Deserialize, Serialize};

pub const NOACTION_AUTHOR: &str = "__noaction__";

/// The user-authored content of a proposal version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalBody {
    pub title: String,
    pub action: String,
    pub rationale: String,
    pub impact: Option<String>,
    pub risk: Option<String>,
    pub notes: Option<String>,
    pub refs: Vec<String>,
}

impl ProposalBody {
    pub fn new(title: impl Into<String>, action: impl Into<String>, rationale: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            action: action.into(),
            rationale: rationale.into(),
            impact: None,
            risk: None,
            notes: None,
            refs: Vec::new(),
        }
    }

}

/// Canonical NoAction body, identical across every issue.
pub fn noaction_body() -> ProposalBody {
    ProposalBody::new(
        "No action",
        "Take no action on this issue.",
        "Default assignment for agents who did not submit a distinct proposal.",
    )
}

fn tokenize(body: &ProposalBody) -> Vec<String> {
    let combined = format!("{} {} {}", body.title, body.action, body.rationale);
    combined
        .split_ascii_whitespace()
        .map(|s| s.to_string())
        .collect()
}

/// Token-level diff ratio between two proposal bodies, via Myers-style LCS
/// alignment over whitespace-tokenized `title`+`action`+`rationale`.
///
/// Returns a value in `[0, 1]`: 0 when the bodies are token-identical, 1 when
/// they share no tokens in common. Used to price revisions
/// (`RevisionCost(Δ) = round(ProposalSelfStake × Δ)`).
pub fn dissimilarity(old: &ProposalBody, new: &ProposalBody) -> f64 {
    let old_tokens = tokenize(old);
    let new_tokens = tokenize(new);

    let max_len = old_tokens.len().max(new_tokens.len());
    if max_len == 0 {
        return 0.0;
    }

    let lcs_len = lcs_length(&old_tokens, &new_tokens);
    let changed = max_len - lcs_len;
    changed as f64 / max_len as f64
}

/// Classic dynamic-programming LCS length over token slices. This is the
/// alignment Myers' algorithm also converges on; the DP form is used here
/// since proposal bodies are short, bounded by `FeedbackCharLimit`-scale text.
fn lcs_length(a: &[String], b: &[String]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut row = vec![0usize; b.len() + 1];
    for a_tok in a {
        let mut prev_diag = 0;
        let mut new_row = vec![0usize; b.len() + 1];
        for (j, b_tok) in b.iter().enumerate() {
            let above = row[j + 1];
            let left = new_row[j];
            new_row[j + 1] = if a_tok == b_tok {
                prev_diag + 1
            } else {
                above.max(left)
            };
            prev_diag = row[j + 1];
        }
        row = new_row;
    }
    row[b.len()]
}

/// A single immutable version of a proposal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    id: String,
    author_id: String,
    issue_id: String,
    parent_id: Option<String>,
    version: u32,
    body: ProposalBody,
    created_tick: usize,
    updated_tick: usize,
    archived: bool,
    active: bool,
}

impl Proposal {
    /// Build the `P<author>@v<n>` identifier scheme.
    pub fn make_id(author_id: &str, version: u32) -> String {
        format!("P-{}@v{}", author_id, version)
    }

    pub fn new_v1(author_id: String, issue_id: String, body: ProposalBody, created_tick: usize) -> Self {
        let id = Self::make_id(&author_id, 1);
        Self {
            id,
            author_id,
            issue_id,
            parent_id: None,
            version: 1,
            body,
            created_tick,
            updated_tick: created_tick,
            archived: false,
            active: true,
        }
    }

    /// Derive the next version in this line from its current active parent.
    pub fn revise_from(parent: &Proposal, new_body: ProposalBody, tick: usize) -> Self {
        let version = parent.version + 1;
        let id = Self::make_id(&parent.author_id, version);
        Self {
            id,
            author_id: parent.author_id.clone(),
            issue_id: parent.issue_id.clone(),
            parent_id: Some(parent.id.clone()),
            version,
            body: new_body,
            created_tick: tick,
            updated_tick: tick,
            archived: false,
            active: true,
        }
    }

    /// Rebuild a version from its raw fields. Used only to restore a
    /// checkpointed graph, where every field is already known.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: String,
        author_id: String,
        issue_id: String,
        parent_id: Option<String>,
        version: u32,
        body: ProposalBody,
        created_tick: usize,
        updated_tick: usize,
        archived: bool,
        active: bool,
    ) -> Self {
        Self {
            id,
            author_id,
            issue_id,
            parent_id,
            version,
            body,
            created_tick,
            updated_tick,
            archived,
            active,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn author_id(&self) -> &str {
        &self.author_id
    }

    pub fn issue_id(&self) -> &str {
        &self.issue_id
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn body(&self) -> &ProposalBody {
        &self.body
    }

    pub fn created_tick(&self) -> usize {
        self.created_tick
    }

    pub fn updated_tick(&self) -> usize {
        self.updated_tick
    }

    pub fn is_archived(&self) -> bool {
        self.archived
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_noaction(&self) -> bool {
        self.author_id.starts_with(NOACTION_AUTHOR)
    }

    /// Mark this version superseded by a newer one. Archived versions are
    /// never mutated again.
    pub fn archive(&mut self) {
        self.archived = true;
        self.active = false;
    }
}
