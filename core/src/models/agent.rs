//! Agent identity.
//!
//! Represents a participant in the consensus run. An `Agent` carries only
//! identity and enrollment metadata; its CP balance lives in the
//! [`crate::credit::CreditManager`], never here (see the balance-location
//! invariant in the data model).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Opaque credential used to bind an action to an agent's identity.
///
/// The value is never logged; only its presence/match result is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential(pub String);

/// A participant invited into the run.
///
/// # Example
/// ```
/// use round_table_core_rs::models::agent::Agent;
///
/// let mut agent = Agent::new("A1".to_string(), "Alice".to_string(), "secret-1".to_string());
/// assert_eq!(agent.uid(), "A1");
/// assert!(agent.authenticate("secret-1"));
/// assert!(!agent.authenticate("wrong"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Stable unique identifier (e.g. "A1").
    uid: String,

    /// Human-readable display name.
    display_name: String,

    /// Opaque credential bound at invitation time.
    credential: Credential,

    /// Optional callback hook (URL, channel name, etc.) for an external brain.
    /// The engine never dereferences this; it is opaque passthrough metadata.
    callback_hook: Option<String>,

    /// Optional free-form metadata.
    metadata: BTreeMap<String, String>,

    /// Whether this agent has authenticated (enrolled) in the run.
    enrolled: bool,
}

impl Agent {
    /// Create a new, not-yet-enrolled agent.
    pub fn new(uid: String, display_name: String, credential: String) -> Self {
        Self {
            uid,
            display_name,
            credential: Credential(credential),
            callback_hook: None,
            metadata: BTreeMap::new(),
            enrolled: false,
        }
    }

    /// Attach an optional callback hook.
    pub fn with_callback_hook(mut self, hook: impl Into<String>) -> Self {
        self.callback_hook = Some(hook.into());
        self
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn callback_hook(&self) -> Option<&str> {
        self.callback_hook.as_deref()
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn is_enrolled(&self) -> bool {
        self.enrolled
    }

    /// Check a presented credential against this agent's bound credential.
    /// Enrolls the agent as a side effect of a successful match, matching the
    /// spec's "enrolled on authentication" lifecycle rule.
    pub fn authenticate(&mut self, presented: &str) -> bool {
        let ok = self.credential.0 == presented;
        if ok {
            self.enrolled = true;
        }
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authenticate_enrolls_on_match() {
        let mut agent = Agent::new("A1".to_string(), "Alice".to_string(), "secret".to_string());
        assert!(!agent.is_enrolled());
        assert!(agent.authenticate("secret"));
        assert!(agent.is_enrolled());
    }

    #[test]
    fn authenticate_rejects_wrong_credential_without_enrolling() {
        let mut agent = Agent::new("A1".to_string(), "Alice".to_string(), "secret".to_string());
        assert!(!agent.authenticate("nope"));
        assert!(!agent.is_enrolled());
    }

    #[test]
    fn builder_methods_attach_optional_fields() {
        let agent = Agent::new("A1".to_string(), "Alice".to_string(), "secret".to_string())
            .with_callback_hook("https://example.invalid/webhook")
            .with_metadata("org", "acme");

        assert_eq!(agent.callback_hook(), Some("https://example.invalid/webhook"));
        assert_eq!(agent.metadata().get("org").map(String::as_str), Some("acme"));
    }
}
