//! Vault configuration row and the boundary-facing shapes.

use peanut_core::Timestamp;
use serde::{Deserialize, Serialize};

/// Default upstream base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
/// Default model requested from the upstream.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
/// Default per-request token ceiling.
pub const DEFAULT_MAX_TOKENS: u32 = 8192;

/// The single persisted vault row.
///
/// `api_key_ciphertext` is the sealed credential
/// (`iv_hex:tag_hex:ciphertext_hex`); everything else is plain
/// configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct VaultRow {
    pub(crate) api_key_ciphertext: Option<String>,
    pub(crate) base_url: String,
    pub(crate) model: String,
    pub(crate) max_tokens_per_request: u32,
    pub(crate) updated_at: Timestamp,
}

impl Default for VaultRow {
    fn default() -> Self {
        Self {
            api_key_ciphertext: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens_per_request: DEFAULT_MAX_TOKENS,
            updated_at: Timestamp::now(),
        }
    }
}

/// What the config read endpoint returns; never the credential.
#[derive(Debug, Clone, Serialize)]
pub struct VaultConfigView {
    /// Whether a credential is currently sealed in the vault.
    pub has_api_key: bool,
    /// Upstream base URL.
    pub base_url: String,
    /// Model requested from the upstream.
    pub model: String,
    /// Per-request token ceiling.
    pub max_tokens_per_request: u32,
}

/// What the config write endpoint accepts.
///
/// An absent `api_key` retains the sealed credential; absent
/// non-credential fields fall back to the documented defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VaultConfigUpdate {
    /// New credential to seal, if rotating.
    pub api_key: Option<String>,
    /// Upstream base URL.
    pub base_url: Option<String>,
    /// Model name.
    pub model: Option<String>,
    /// Per-request token ceiling.
    pub max_tokens_per_request: Option<u32>,
}

/// One message of a normalized completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultMessage {
    /// `user` or `assistant`.
    pub role: String,
    /// Message text.
    pub content: String,
}

/// A normalized chat-completion request.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionRequest {
    /// Conversation turns.
    pub messages: Vec<VaultMessage>,
    /// Model override; defaults to the configured model.
    pub model: Option<String>,
    /// Requested token budget; clamped to the configured ceiling.
    pub max_tokens: Option<u32>,
    /// Optional system prompt.
    pub system: Option<String>,
    /// Optional sampling temperature.
    pub temperature: Option<f32>,
}

/// Token accounting of a completion.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionUsage {
    /// Prompt tokens.
    pub prompt: u64,
    /// Completion tokens.
    pub completion: u64,
    /// Their sum.
    pub total: u64,
}

/// The internal completion shape returned to the boundary.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionResponse {
    /// Upstream message id.
    pub id: String,
    /// Model that answered.
    pub model: String,
    /// Concatenated text content.
    pub content: String,
    /// Token accounting.
    pub usage: CompletionUsage,
    /// Why generation stopped.
    pub finish_reason: Option<String>,
}

/// A point-in-time usage reading from the upstream.
#[derive(Debug, Clone, Serialize)]
pub struct UsageSnapshot {
    /// Units consumed in the current period.
    pub used: u64,
    /// Period allowance (0 when the upstream reports none).
    pub limit: u64,
    /// When the period resets, as reported upstream.
    pub reset_at: Option<String>,
    /// `round(used / limit × 100)`, 0 when `limit` is 0.
    pub percentage: u32,
}

/// Connection status as the boundary reports it.
#[derive(Debug, Clone, Serialize)]
pub struct VaultStatus {
    /// Whether the upstream answered with the sealed credential.
    pub connected: bool,
    /// The usage snapshot backing a positive answer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageSnapshot>,
}

impl UsageSnapshot {
    /// Compute the percentage field from raw counters.
    #[must_use]
    pub fn from_raw(used: u64, limit: u64, reset_at: Option<String>) -> Self {
        let percentage = if limit == 0 {
            0
        } else {
            #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            {
                ((used as f64 / limit as f64) * 100.0).round() as u32
            }
        };
        Self {
            used,
            limit,
            reset_at,
            percentage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let row = VaultRow::default();
        assert!(row.api_key_ciphertext.is_none());
        assert_eq!(row.base_url, "https://api.anthropic.com");
        assert_eq!(row.max_tokens_per_request, 8192);
    }

    #[test]
    fn test_percentage() {
        assert_eq!(UsageSnapshot::from_raw(25, 100, None).percentage, 25);
        assert_eq!(UsageSnapshot::from_raw(1, 3, None).percentage, 33);
        assert_eq!(UsageSnapshot::from_raw(2, 3, None).percentage, 67);
        assert_eq!(UsageSnapshot::from_raw(50, 0, None).percentage, 0);
    }
}
