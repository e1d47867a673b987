//! The vault service: sealed credential, config upsert, proxying.

use peanut_audit::{Actor, AuditAction, AuditLog, Subject};
use peanut_core::{Error, Result, Timestamp};
use peanut_storage::{content, tables, Database, StorageError};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::config::{
    CompletionRequest, CompletionResponse, CompletionUsage, UsageSnapshot, VaultConfigUpdate,
    VaultConfigView, VaultRow, VaultStatus, DEFAULT_BASE_URL, DEFAULT_MAX_TOKENS, DEFAULT_MODEL,
};

const COMPLETION_TIMEOUT: Duration = Duration::from_secs(60);
const USAGE_TIMEOUT: Duration = Duration::from_secs(10);
const ANTHROPIC_VERSION: &str = "2023-06-01";
const CONFIG_RECORD: &str = "config";

/// Upstream `/v1/messages` response shape.
#[derive(Debug, Deserialize)]
struct UpstreamCompletion {
    id: String,
    model: String,
    content: Vec<UpstreamContent>,
    stop_reason: Option<String>,
    usage: UpstreamUsage,
}

#[derive(Debug, Deserialize)]
struct UpstreamContent {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct UpstreamUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

/// Upstream `/v1/usage` response shape.
#[derive(Debug, Deserialize)]
struct UpstreamUsageReport {
    #[serde(default)]
    used: u64,
    #[serde(default)]
    limit: u64,
    #[serde(default)]
    reset_at: Option<String>,
}

/// The credential vault.
#[derive(Clone)]
pub struct VaultService {
    db: Database,
    key: [u8; 32],
    audit: AuditLog,
    client: reqwest::Client,
}

impl std::fmt::Debug for VaultService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultService").finish_non_exhaustive()
    }
}

impl VaultService {
    /// Wire the vault over the shared database and audit log.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the key hex is malformed or
    /// [`Error::Internal`] if the HTTP client fails to build.
    pub fn new(db: Database, key_hex: &str, audit: AuditLog) -> Result<Self> {
        let key = peanut_crypto::key_from_hex(key_hex)
            .map_err(|e| Error::Validation(format!("vault key: {e}")))?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(Error::internal)?;
        Ok(Self {
            db,
            key,
            audit,
            client,
        })
    }

    /// The boundary-safe configuration view.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the read fails.
    pub async fn config(&self) -> Result<VaultConfigView> {
        let row = self.load_row().await?;
        Ok(VaultConfigView {
            has_api_key: row.api_key_ciphertext.is_some(),
            base_url: row.base_url,
            model: row.model,
            max_tokens_per_request: row.max_tokens_per_request,
        })
    }

    /// Upsert the configuration.
    ///
    /// A supplied `api_key` is sealed and replaces the ciphertext; an
    /// absent one retains it. Non-credential fields take the supplied
    /// values or the documented defaults.
    ///
    /// # Errors
    ///
    /// Returns storage or sealing errors.
    pub async fn update_config(
        &self,
        update: VaultConfigUpdate,
        actor: Actor,
    ) -> Result<VaultConfigView> {
        let existing = self.load_row().await?;

        let api_key_ciphertext = match update.api_key.as_deref() {
            Some(api_key) if !api_key.is_empty() => Some(
                peanut_crypto::seal(&self.key, api_key.as_bytes())
                    .map_err(|e| Error::external("vault", e.to_string()))?,
            ),
            _ => existing.api_key_ciphertext,
        };
        let rotated = update.api_key.is_some();

        let row = VaultRow {
            api_key_ciphertext,
            base_url: update
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: update.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens_per_request: update
                .max_tokens_per_request
                .unwrap_or(DEFAULT_MAX_TOKENS),
            updated_at: Timestamp::now(),
        };

        self.db
            .client()
            .query("UPSERT type::thing($tb, $id) CONTENT $data")
            .bind(("tb", tables::VAULT_CONFIG))
            .bind(("id", CONFIG_RECORD))
            .bind(("data", content(&row).map_err(StorageError::from)?))
            .await
            .map_err(StorageError::from)?
            .check()
            .map_err(StorageError::from)?;

        self.audit
            .append(
                AuditAction::SettingsUpdated,
                actor,
                Subject::vault(),
                serde_json::json!({
                    "base_url": row.base_url,
                    "model": row.model,
                    "max_tokens_per_request": row.max_tokens_per_request,
                    "api_key_rotated": rotated,
                }),
            )
            .await?;

        Ok(VaultConfigView {
            has_api_key: row.api_key_ciphertext.is_some(),
            base_url: row.base_url,
            model: row.model,
            max_tokens_per_request: row.max_tokens_per_request,
        })
    }

    /// Proxy a normalized completion to the upstream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] without a sealed credential and
    /// [`Error::ExternalService`] for unsealing, transport, or
    /// upstream failures.
    pub async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let row = self.load_row().await?;
        let api_key = self.unseal(&row)?;

        let max_tokens = request
            .max_tokens
            .unwrap_or(row.max_tokens_per_request)
            .min(row.max_tokens_per_request);
        let model = request.model.unwrap_or_else(|| row.model.clone());

        let mut body = serde_json::json!({
            "model": model,
            "max_tokens": max_tokens,
            "messages": request.messages,
        });
        if let Some(system) = request.system.filter(|s| !s.is_empty()) {
            body["system"] = serde_json::Value::String(system);
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }

        debug!(%model, max_tokens, "proxying vault completion");

        let url = format!("{}/v1/messages", row.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .header("x-api-key", Self::sensitive_header(&api_key)?)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .timeout(COMPLETION_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::external("vault", e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!(%status, "vault upstream rejected completion");
            return Err(Error::external("vault", format!("status {status}: {detail}")));
        }

        let upstream: UpstreamCompletion = response
            .json()
            .await
            .map_err(|e| Error::external("vault", format!("invalid response: {e}")))?;

        let text: String = upstream
            .content
            .iter()
            .map(|block| block.text.as_str())
            .collect();

        Ok(CompletionResponse {
            id: upstream.id,
            model: upstream.model,
            content: text,
            usage: CompletionUsage {
                prompt: upstream.usage.input_tokens,
                completion: upstream.usage.output_tokens,
                total: upstream
                    .usage
                    .input_tokens
                    .saturating_add(upstream.usage.output_tokens),
            },
            finish_reason: upstream.stop_reason,
        })
    }

    /// Read the upstream usage counters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] without a sealed credential and
    /// [`Error::ExternalService`] for transport failures.
    pub async fn usage(&self) -> Result<UsageSnapshot> {
        let row = self.load_row().await?;
        let api_key = self.unseal(&row)?;

        let url = format!("{}/v1/usage", row.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .header("x-api-key", Self::sensitive_header(&api_key)?)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .timeout(USAGE_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::external("vault", e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::external(
                "vault",
                format!("usage status {}", response.status()),
            ));
        }

        let report: UpstreamUsageReport = response
            .json()
            .await
            .map_err(|e| Error::external("vault", format!("invalid usage response: {e}")))?;
        Ok(UsageSnapshot::from_raw(
            report.used,
            report.limit,
            report.reset_at,
        ))
    }

    /// Connection status; never leaks why a probe failed.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the config read fails; upstream and
    /// unsealing failures map to `connected: false`.
    pub async fn status(&self) -> Result<VaultStatus> {
        let row = self.load_row().await?;
        if row.api_key_ciphertext.is_none() {
            return Ok(VaultStatus {
                connected: false,
                usage: None,
            });
        }

        match self.usage().await {
            Ok(usage) => Ok(VaultStatus {
                connected: true,
                usage: Some(usage),
            }),
            Err(err) => {
                debug!(error = %err, "vault status probe failed");
                Ok(VaultStatus {
                    connected: false,
                    usage: None,
                })
            },
        }
    }

    async fn load_row(&self) -> Result<VaultRow> {
        let mut response = self
            .db
            .client()
            .query("SELECT * OMIT id FROM type::thing($tb, $id)")
            .bind(("tb", tables::VAULT_CONFIG))
            .bind(("id", CONFIG_RECORD))
            .await
            .map_err(StorageError::from)?;
        let row: Option<VaultRow> = response.take(0).map_err(StorageError::from)?;
        Ok(row.unwrap_or_default())
    }

    fn unseal(&self, row: &VaultRow) -> Result<Zeroizing<String>> {
        let ciphertext = row
            .api_key_ciphertext
            .as_deref()
            .ok_or_else(|| Error::Validation("no upstream API key configured".to_string()))?;
        let plaintext = peanut_crypto::open(&self.key, ciphertext)
            .map_err(|_| Error::external("vault", "credential unsealing failed".to_string()))?;
        String::from_utf8(plaintext)
            .map(Zeroizing::new)
            .map_err(|_| Error::external("vault", "credential unsealing failed".to_string()))
    }

    fn sensitive_header(api_key: &str) -> Result<reqwest::header::HeaderValue> {
        let mut value = reqwest::header::HeaderValue::try_from(api_key)
            .map_err(|_| Error::external("vault", "credential has invalid characters".to_string()))?;
        value.set_sensitive(true);
        Ok(value)
    }
}
