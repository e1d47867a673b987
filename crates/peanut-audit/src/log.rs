//! The audit log service: serialized appends, verified reads.

use peanut_core::Timestamp;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

use crate::entry::{Actor, AuditAction, AuditEntry, Subject, GENESIS};
use crate::error::AuditResult;
use crate::store::AuditStore;
use peanut_storage::Database;

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 500;

/// Query filters for [`AuditLog::query`].
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    /// Match entries by acting user id.
    pub actor_id: Option<String>,
    /// Match entries by action.
    pub action: Option<AuditAction>,
    /// Match entries by resource kind.
    pub resource_type: Option<String>,
    /// Entries at or after this time.
    pub from: Option<Timestamp>,
    /// Entries at or before this time.
    pub to: Option<Timestamp>,
}

/// One page of audit entries plus the integrity verdict.
#[derive(Debug, Clone, Serialize)]
pub struct AuditPage {
    /// The page's entries, newest first.
    pub entries: Vec<AuditEntry>,
    /// Total entries matching the filter.
    pub total: usize,
    /// Page number requested (1-based).
    pub page: usize,
    /// Total pages at the effective limit.
    pub pages: usize,
    /// False if any returned entry fails re-verification.
    pub integrity_ok: bool,
}

/// The append-only, chain-linked audit log.
///
/// Appends serialize on a process-local mutex held across the
/// head-read and the insert; without it, concurrent appends could
/// observe the same head and fork the chain.
#[derive(Debug, Clone)]
pub struct AuditLog {
    store: AuditStore,
    append_lock: Arc<Mutex<()>>,
}

impl AuditLog {
    /// Create the log over the shared database handle.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self {
            store: AuditStore::new(db),
            append_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Append an entry linked to the current chain head.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the insert fails; callers treat that
    /// as failure of the whole audited operation.
    pub async fn append(
        &self,
        action: AuditAction,
        actor: Actor,
        subject: Subject,
        details: Value,
    ) -> AuditResult<AuditEntry> {
        let _guard = self.append_lock.lock().await;

        let previous = self
            .store
            .latest_fingerprint()
            .await?
            .unwrap_or_else(|| GENESIS.to_string());
        let entry = AuditEntry::build(action, actor, subject, details, previous);
        self.store.insert(&entry).await?;
        Ok(entry)
    }

    /// Query entries newest-first with pagination and integrity check.
    ///
    /// Every returned entry is re-hashed; a mismatch anywhere on the
    /// page sets `integrity_ok = false` but the rows are still
    /// returned, so operators can inspect the damage.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the select fails.
    pub async fn query(
        &self,
        filter: AuditFilter,
        page: usize,
        limit: usize,
    ) -> AuditResult<AuditPage> {
        let limit = limit.clamp(1, MAX_LIMIT);
        let page = page.max(1);
        let start = page
            .saturating_sub(1)
            .saturating_mul(limit);

        let entries = self.store.select(&filter, limit, start).await?;
        let total = self.store.count(&filter).await?;
        let pages = total.div_ceil(limit);

        let integrity_ok = entries.iter().all(|entry| {
            let ok = entry.verify();
            if !ok {
                warn!(entry_id = %entry.id, "audit entry failed fingerprint re-verification");
            }
            ok
        });

        Ok(AuditPage {
            entries,
            total,
            page,
            pages,
            integrity_ok,
        })
    }
}
