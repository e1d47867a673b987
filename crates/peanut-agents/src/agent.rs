//! The agent entity and its validation.

use peanut_core::{Error, Result, Timestamp};
use peanut_crypto::random_id;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The kinds of backends the gateway can route to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    /// A local inference endpoint (Ollama-compatible).
    LocalInference,
    /// The dedicated upstream code-assistant service.
    CodeAssistant,
    /// First hosted model API.
    HostedA,
    /// Second hosted model API.
    HostedB,
    /// Anything else speaking the chat protocol.
    Custom,
}

/// A registered backend agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Opaque 128-bit id.
    pub id: String,
    /// Human name (2–64 chars).
    pub name: String,
    /// Backend kind; immutable after creation.
    #[serde(rename = "type")]
    pub agent_type: AgentType,
    /// Base URL of the backend (http/https).
    pub endpoint: String,
    /// Model identifier passed through on every call.
    pub model: String,
    /// Per-request token ceiling (1–200000).
    pub max_tokens: u32,
    /// Sampling temperature (0.0–2.0).
    pub temperature: f32,
    /// Operator-facing priority (1–10).
    pub priority: u8,
    /// Dispatch weight (1–100).
    pub weight: u32,
    /// Ordered labels.
    pub tags: Vec<String>,
    /// Free-form configuration.
    pub metadata: Value,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last modification time.
    pub updated_at: Timestamp,
}

/// Fields accepted when registering an agent.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentDraft {
    /// Human name.
    pub name: String,
    /// Backend kind.
    #[serde(rename = "type")]
    pub agent_type: AgentType,
    /// Base URL.
    pub endpoint: String,
    /// Model identifier.
    pub model: String,
    /// Token ceiling; defaults to 4096.
    pub max_tokens: Option<u32>,
    /// Temperature; defaults to 0.7.
    pub temperature: Option<f32>,
    /// Priority; defaults to 5.
    pub priority: Option<u8>,
    /// Weight; defaults to 1.
    pub weight: Option<u32>,
    /// Labels; defaults to empty.
    pub tags: Option<Vec<String>>,
    /// Free-form configuration; defaults to `{}`.
    pub metadata: Option<Value>,
}

/// Partial update; the type can never change.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentPatch {
    /// New name.
    pub name: Option<String>,
    /// New endpoint.
    pub endpoint: Option<String>,
    /// New model.
    pub model: Option<String>,
    /// New token ceiling.
    pub max_tokens: Option<u32>,
    /// New temperature.
    pub temperature: Option<f32>,
    /// New priority.
    pub priority: Option<u8>,
    /// New weight.
    pub weight: Option<u32>,
    /// New labels.
    pub tags: Option<Vec<String>>,
    /// New configuration.
    pub metadata: Option<Value>,
}

impl Agent {
    /// Validate a draft into a new agent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] naming the first offending field.
    pub fn from_draft(draft: AgentDraft) -> Result<Self> {
        let now = Timestamp::now();
        let agent = Self {
            id: random_id(),
            name: draft.name,
            agent_type: draft.agent_type,
            endpoint: draft.endpoint,
            model: draft.model,
            max_tokens: draft.max_tokens.unwrap_or(4096),
            temperature: draft.temperature.unwrap_or(0.7),
            priority: draft.priority.unwrap_or(5),
            weight: draft.weight.unwrap_or(1),
            tags: draft.tags.unwrap_or_default(),
            metadata: draft.metadata.unwrap_or_else(|| Value::Object(serde_json::Map::new())),
            created_at: now,
            updated_at: now,
        };
        agent.validate()?;
        Ok(agent)
    }

    /// Apply a partial update, returning the new snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if any resulting field is out of
    /// range.
    pub fn apply(mut self, patch: AgentPatch) -> Result<Self> {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(endpoint) = patch.endpoint {
            self.endpoint = endpoint;
        }
        if let Some(model) = patch.model {
            self.model = model;
        }
        if let Some(max_tokens) = patch.max_tokens {
            self.max_tokens = max_tokens;
        }
        if let Some(temperature) = patch.temperature {
            self.temperature = temperature;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(weight) = patch.weight {
            self.weight = weight;
        }
        if let Some(tags) = patch.tags {
            self.tags = tags;
        }
        if let Some(metadata) = patch.metadata {
            self.metadata = metadata;
        }
        self.updated_at = Timestamp::now();
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        let name_len = self.name.chars().count();
        if !(2..=64).contains(&name_len) {
            return Err(Error::Validation(
                "name must be 2-64 characters".to_string(),
            ));
        }
        let endpoint = url::Url::parse(&self.endpoint)
            .map_err(|e| Error::Validation(format!("endpoint: {e}")))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(Error::Validation(
                "endpoint must be http or https".to_string(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(Error::Validation("model must not be empty".to_string()));
        }
        if !(1..=200_000).contains(&self.max_tokens) {
            return Err(Error::Validation(
                "max_tokens must be 1-200000".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(Error::Validation(
                "temperature must be 0.0-2.0".to_string(),
            ));
        }
        if !(1..=10).contains(&self.priority) {
            return Err(Error::Validation("priority must be 1-10".to_string()));
        }
        if !(1..=100).contains(&self.weight) {
            return Err(Error::Validation("weight must be 1-100".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn draft(name: &str, weight: u32) -> AgentDraft {
        AgentDraft {
            name: name.to_string(),
            agent_type: AgentType::LocalInference,
            endpoint: "http://127.0.0.1:11434".to_string(),
            model: "llama3".to_string(),
            max_tokens: Some(4096),
            temperature: Some(0.7),
            priority: Some(5),
            weight: Some(weight),
            tags: None,
            metadata: None,
        }
    }

    #[test]
    fn test_draft_accepted() {
        let agent = Agent::from_draft(draft("local-llama", 5)).unwrap();
        assert_eq!(agent.weight, 5);
        assert_eq!(agent.id.len(), 32);
        assert!(agent.metadata.is_object());
    }

    #[test]
    fn test_field_ranges_enforced() {
        let mut d = draft("x", 1);
        assert!(Agent::from_draft(d.clone()).is_err(), "1-char name");

        d = draft("ok-name", 0);
        assert!(Agent::from_draft(d.clone()).is_err(), "zero weight");

        d = draft("ok-name", 101);
        assert!(Agent::from_draft(d.clone()).is_err(), "weight over 100");

        d = draft("ok-name", 1);
        d.endpoint = "not a url".to_string();
        assert!(Agent::from_draft(d.clone()).is_err(), "bad endpoint");

        d = draft("ok-name", 1);
        d.endpoint = "ftp://example.com".to_string();
        assert!(Agent::from_draft(d.clone()).is_err(), "bad scheme");

        d = draft("ok-name", 1);
        d.model = "  ".to_string();
        assert!(Agent::from_draft(d.clone()).is_err(), "blank model");

        d = draft("ok-name", 1);
        d.max_tokens = Some(200_001);
        assert!(Agent::from_draft(d.clone()).is_err(), "token ceiling");

        d = draft("ok-name", 1);
        d.temperature = Some(2.5);
        assert!(Agent::from_draft(d.clone()).is_err(), "temperature");

        d = draft("ok-name", 1);
        d.priority = Some(11);
        assert!(Agent::from_draft(d).is_err(), "priority");
    }

    #[test]
    fn test_patch_revalidates() {
        let agent = Agent::from_draft(draft("local-llama", 5)).unwrap();
        let err = agent
            .clone()
            .apply(AgentPatch {
                weight: Some(0),
                ..AgentPatch::default()
            })
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let updated = agent
            .apply(AgentPatch {
                weight: Some(9),
                model: Some("llama3.1".to_string()),
                ..AgentPatch::default()
            })
            .unwrap();
        assert_eq!(updated.weight, 9);
        assert_eq!(updated.model, "llama3.1");
    }

    #[test]
    fn test_type_wire_names() {
        let json = serde_json::to_string(&AgentType::LocalInference).unwrap();
        assert_eq!(json, "\"local_inference\"");
        let parsed: AgentType = serde_json::from_str("\"code_assistant\"").unwrap();
        assert_eq!(parsed, AgentType::CodeAssistant);
    }
}
