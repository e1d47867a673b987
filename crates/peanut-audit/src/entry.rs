//! Audit entry types and the fingerprint chain.

use peanut_core::Timestamp;
use peanut_crypto::{random_id, sha256_hex};
use peanut_storage::surrealdb::types::SurrealValue;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The `previous_fingerprint` sentinel of the first chain entry.
pub const GENESIS: &str = "GENESIS";

/// Actions that are audited.
///
/// The wire names are dotted (`auth.login`); they are what the store
/// holds and what query filters match against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    /// Successful authentication (password-only or TOTP-completed).
    #[serde(rename = "auth.login")]
    AuthLogin,
    /// Explicit logout.
    #[serde(rename = "auth.logout")]
    AuthLogout,
    /// Rejected authentication attempt.
    #[serde(rename = "auth.login_failed")]
    AuthLoginFailed,
    /// TOTP enabled for an account.
    #[serde(rename = "auth.totp_enabled")]
    AuthTotpEnabled,
    /// Password changed.
    #[serde(rename = "auth.password_changed")]
    AuthPasswordChanged,
    /// Agent registered.
    #[serde(rename = "agent.created")]
    AgentCreated,
    /// Agent configuration updated.
    #[serde(rename = "agent.updated")]
    AgentUpdated,
    /// Agent removed.
    #[serde(rename = "agent.deleted")]
    AgentDeleted,
    /// Chat request dispatched to an agent backend.
    #[serde(rename = "agent.request")]
    AgentRequest,
    /// Gateway settings changed (vault configuration included).
    #[serde(rename = "settings.updated")]
    SettingsUpdated,
    /// User account created.
    #[serde(rename = "user.created")]
    UserCreated,
    /// User account updated.
    #[serde(rename = "user.updated")]
    UserUpdated,
    /// User account deleted.
    #[serde(rename = "user.deleted")]
    UserDeleted,
}

impl AuditAction {
    /// The dotted wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthLogin => "auth.login",
            Self::AuthLogout => "auth.logout",
            Self::AuthLoginFailed => "auth.login_failed",
            Self::AuthTotpEnabled => "auth.totp_enabled",
            Self::AuthPasswordChanged => "auth.password_changed",
            Self::AgentCreated => "agent.created",
            Self::AgentUpdated => "agent.updated",
            Self::AgentDeleted => "agent.deleted",
            Self::AgentRequest => "agent.request",
            Self::SettingsUpdated => "settings.updated",
            Self::UserCreated => "user.created",
            Self::UserUpdated => "user.updated",
            Self::UserDeleted => "user.deleted",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auth.login" => Ok(Self::AuthLogin),
            "auth.logout" => Ok(Self::AuthLogout),
            "auth.login_failed" => Ok(Self::AuthLoginFailed),
            "auth.totp_enabled" => Ok(Self::AuthTotpEnabled),
            "auth.password_changed" => Ok(Self::AuthPasswordChanged),
            "agent.created" => Ok(Self::AgentCreated),
            "agent.updated" => Ok(Self::AgentUpdated),
            "agent.deleted" => Ok(Self::AgentDeleted),
            "agent.request" => Ok(Self::AgentRequest),
            "settings.updated" => Ok(Self::SettingsUpdated),
            "user.created" => Ok(Self::UserCreated),
            "user.updated" => Ok(Self::UserUpdated),
            "user.deleted" => Ok(Self::UserDeleted),
            other => Err(format!("unknown audit action: {other}")),
        }
    }
}

/// Who performed the audited operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Actor {
    /// Acting user's id, when authenticated.
    pub user_id: Option<String>,
    /// Acting user's email, when known (login failures record the
    /// attempted email).
    pub email: Option<String>,
    /// Client IP as seen by the boundary.
    pub ip: Option<String>,
    /// Client `User-Agent` header.
    pub user_agent: Option<String>,
}

impl Actor {
    /// The gateway itself (startup seeding, background sweeps).
    #[must_use]
    pub fn system() -> Self {
        Self::default()
    }

    /// An authenticated user.
    #[must_use]
    pub fn user(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            email: Some(email.into()),
            ip: None,
            user_agent: None,
        }
    }

    /// Attach boundary metadata (IP, user agent).
    #[must_use]
    pub fn with_client(mut self, ip: Option<String>, user_agent: Option<String>) -> Self {
        self.ip = ip;
        self.user_agent = user_agent;
        self
    }
}

/// What the audited operation acted on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Subject {
    /// Resource kind (`agent`, `user`, `vault`, …).
    pub resource_type: Option<String>,
    /// Resource id within the kind.
    pub resource_id: Option<String>,
}

impl Subject {
    /// No specific resource.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// A resource of the given kind and id.
    #[must_use]
    pub fn resource(resource_type: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self {
            resource_type: Some(resource_type.into()),
            resource_id: Some(resource_id.into()),
        }
    }

    /// An agent resource.
    #[must_use]
    pub fn agent(id: impl Into<String>) -> Self {
        Self::resource("agent", id)
    }

    /// A user resource.
    #[must_use]
    pub fn user(id: impl Into<String>) -> Self {
        Self::resource("user", id)
    }

    /// The vault configuration singleton.
    #[must_use]
    pub fn vault() -> Self {
        Self {
            resource_type: Some("vault".to_string()),
            resource_id: None,
        }
    }
}

/// A single chain-linked audit entry.
#[derive(Debug, Clone, Serialize, Deserialize, SurrealValue)]
#[surreal(crate = "peanut_storage::surrealdb::types")]
pub struct AuditEntry {
    /// Unique entry id (128-bit hex).
    pub id: String,
    /// The audited action.
    #[surreal(wrap)]
    pub action: AuditAction,
    /// Acting user's id, if any.
    pub actor_user_id: Option<String>,
    /// Acting user's email, if known.
    pub actor_email: Option<String>,
    /// Client IP.
    pub ip: Option<String>,
    /// Client user agent.
    pub user_agent: Option<String>,
    /// Resource kind.
    pub resource_type: Option<String>,
    /// Resource id.
    pub resource_id: Option<String>,
    /// Free-form structured context.
    pub details: Value,
    /// Fingerprint of the previous entry, or [`GENESIS`].
    pub previous_fingerprint: String,
    /// SHA-256 over this entry's canonical payload (64 hex chars).
    pub fingerprint: String,
    /// When the entry was appended.
    #[surreal(wrap)]
    pub timestamp: Timestamp,
}

impl AuditEntry {
    /// Build a new entry linked to `previous_fingerprint`.
    #[must_use]
    pub fn build(
        action: AuditAction,
        actor: Actor,
        subject: Subject,
        details: Value,
        previous_fingerprint: String,
    ) -> Self {
        let mut entry = Self {
            id: random_id(),
            action,
            actor_user_id: actor.user_id,
            actor_email: actor.email,
            ip: actor.ip,
            user_agent: actor.user_agent,
            resource_type: subject.resource_type,
            resource_id: subject.resource_id,
            details,
            previous_fingerprint,
            fingerprint: String::new(),
            timestamp: Timestamp::now(),
        };
        entry.fingerprint = entry.compute_fingerprint();
        entry
    }

    /// Recompute the fingerprint from this entry's persisted fields.
    ///
    /// The pre-image is the canonical JSON object of the chained
    /// fields with keys in sorted order; `timestamp` uses the same
    /// fixed rendering the store holds, so an untouched row re-hashes
    /// to its stored fingerprint exactly.
    #[must_use]
    pub fn compute_fingerprint(&self) -> String {
        let mut payload = BTreeMap::new();
        payload.insert("action", Value::String(self.action.as_str().to_string()));
        payload.insert(
            "actor_user_id",
            self.actor_user_id
                .clone()
                .map_or(Value::Null, Value::String),
        );
        payload.insert("details", self.details.clone());
        payload.insert("id", Value::String(self.id.clone()));
        payload.insert(
            "previous_fingerprint",
            Value::String(self.previous_fingerprint.clone()),
        );
        payload.insert(
            "resource_id",
            self.resource_id.clone().map_or(Value::Null, Value::String),
        );
        payload.insert(
            "resource_type",
            self.resource_type
                .clone()
                .map_or(Value::Null, Value::String),
        );
        payload.insert("timestamp", Value::String(self.timestamp.to_rfc3339()));

        // BTreeMap serializes in key order; compact rendering keeps the
        // pre-image canonical.
        let canonical =
            serde_json::to_string(&payload).unwrap_or_else(|_| String::from("{}"));
        sha256_hex(canonical.as_bytes())
    }

    /// Whether the stored fingerprint matches the recomputed one.
    #[must_use]
    pub fn verify(&self) -> bool {
        self.fingerprint == self.compute_fingerprint()
    }

    /// Whether this entry chains onto `previous`.
    #[must_use]
    pub fn follows(&self, previous: &AuditEntry) -> bool {
        self.previous_fingerprint == previous.fingerprint
    }
}
