//! Shared application state.

use peanut_agents::{AgentBackend, Orchestrator};
use peanut_audit::AuditLog;
use peanut_auth::{AuthService, TokenSigner};
use peanut_core::Result;
use peanut_ratelimit::RateLimiter;
use peanut_storage::Database;
use peanut_vault::VaultService;
use std::sync::Arc;
use std::time::Instant;

/// Everything the handlers share.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Authentication core.
    pub auth: AuthService,
    /// Agent orchestrator.
    pub orchestrator: Orchestrator,
    /// Credential vault.
    pub vault: VaultService,
    /// Audit chain.
    pub audit: AuditLog,
    /// Rate limiter.
    pub limiter: RateLimiter,
    /// Whether session cookies carry the `Secure` attribute.
    pub secure_cookies: bool,
    /// Process start, for the liveness endpoint.
    pub started_at: Instant,
}

impl AppState {
    /// Wire all services over one database handle.
    ///
    /// # Errors
    ///
    /// Returns configuration errors from the vault key or the HTTP
    /// client construction.
    pub fn new(
        db: &Database,
        session_secret: &str,
        vault_key_hex: &str,
        secure_cookies: bool,
        backend: Arc<dyn AgentBackend>,
    ) -> Result<Self> {
        let audit = AuditLog::new(db.clone());
        let signer = TokenSigner::new(session_secret);
        Ok(Self {
            auth: AuthService::new(db.clone(), signer, audit.clone()),
            orchestrator: Orchestrator::new(db.clone(), audit.clone(), backend),
            vault: VaultService::new(db.clone(), vault_key_hex, audit.clone())?,
            audit,
            limiter: RateLimiter::new(db.clone()),
            secure_cookies,
            started_at: Instant::now(),
        })
    }
}
