//! Audit repository over the persistence port.

use peanut_storage::surrealdb::types::SurrealValue;
use peanut_storage::{content, tables, Database};
use serde::Deserialize;

use crate::entry::AuditEntry;
use crate::error::AuditResult;
use crate::log::AuditFilter;

/// Repository for the `audit_log` table and its chain-head pointer.
#[derive(Debug, Clone)]
pub(crate) struct AuditStore {
    db: Database,
}

#[derive(Debug, Deserialize, SurrealValue)]
#[surreal(crate = "peanut_storage::surrealdb::types")]
struct CountRow {
    total: i64,
}

impl AuditStore {
    /// Create a store over the shared database handle.
    pub(crate) fn new(db: Database) -> Self {
        Self { db }
    }

    /// The chain head's fingerprint, if any entry exists.
    pub(crate) async fn latest_fingerprint(&self) -> AuditResult<Option<String>> {
        let mut response = self
            .db
            .client()
            .query("SELECT VALUE fingerprint FROM type::thing($tb, 'head')")
            .bind(("tb", tables::AUDIT_CHAIN_HEAD))
            .await
            .map_err(peanut_storage::StorageError::from)?;
        let fingerprint: Option<String> = response
            .take(0)
            .map_err(peanut_storage::StorageError::from)?;
        Ok(fingerprint)
    }

    /// Insert an entry and advance the chain head, atomically.
    ///
    /// Both statements travel in one request, which the embedded
    /// engine executes as a single transaction.
    pub(crate) async fn insert(&self, entry: &AuditEntry) -> AuditResult<()> {
        self.db
            .client()
            .query("CREATE type::thing($tb, $id) CONTENT $data")
            .query("UPSERT type::thing($head_tb, 'head') SET fingerprint = $fp")
            .bind(("tb", tables::AUDIT_LOG))
            .bind(("id", entry.id.clone()))
            .bind(("data", content(entry)?))
            .bind(("head_tb", tables::AUDIT_CHAIN_HEAD))
            .bind(("fp", entry.fingerprint.clone()))
            .await
            .map_err(peanut_storage::StorageError::from)?
            .check()
            .map_err(peanut_storage::StorageError::from)?;
        Ok(())
    }

    /// Entries matching the filter, newest first, paginated.
    pub(crate) async fn select(
        &self,
        filter: &AuditFilter,
        limit: usize,
        start: usize,
    ) -> AuditResult<Vec<AuditEntry>> {
        let sql = format!(
            "SELECT *, record::id(id) AS id FROM {} WHERE {} \
             ORDER BY timestamp DESC LIMIT $limit START $start",
            tables::AUDIT_LOG,
            Self::where_clause(filter),
        );

        let mut response = self
            .db
            .client()
            .query(sql)
            .bind(Self::bindings(filter))
            .bind(("limit", limit))
            .bind(("start", start))
            .await
            .map_err(peanut_storage::StorageError::from)?;
        let entries: Vec<AuditEntry> = response
            .take(0)
            .map_err(peanut_storage::StorageError::from)?;
        Ok(entries)
    }

    /// Total number of entries matching the filter.
    pub(crate) async fn count(&self, filter: &AuditFilter) -> AuditResult<usize> {
        let sql = format!(
            "SELECT count() AS total FROM {} WHERE {} GROUP ALL",
            tables::AUDIT_LOG,
            Self::where_clause(filter),
        );

        let mut response = self
            .db
            .client()
            .query(sql)
            .bind(Self::bindings(filter))
            .await
            .map_err(peanut_storage::StorageError::from)?;
        let row: Option<CountRow> = response
            .take(0)
            .map_err(peanut_storage::StorageError::from)?;
        Ok(row.map_or(0, |r| usize::try_from(r.total).unwrap_or(0)))
    }

    fn where_clause(filter: &AuditFilter) -> String {
        let mut clauses = vec!["true".to_string()];
        if filter.actor_id.is_some() {
            clauses.push("actor_user_id = $actor_id".to_string());
        }
        if filter.action.is_some() {
            clauses.push("action = $action".to_string());
        }
        if filter.resource_type.is_some() {
            clauses.push("resource_type = $resource_type".to_string());
        }
        if filter.from.is_some() {
            clauses.push("timestamp >= $from".to_string());
        }
        if filter.to.is_some() {
            clauses.push("timestamp <= $to".to_string());
        }
        clauses.join(" AND ")
    }

    /// Parameter map matching [`Self::where_clause`]; absent filters
    /// simply leave their parameter unbound and unreferenced.
    fn bindings(filter: &AuditFilter) -> std::collections::BTreeMap<String, String> {
        let mut bindings = std::collections::BTreeMap::new();
        if let Some(actor_id) = &filter.actor_id {
            bindings.insert("actor_id".to_string(), actor_id.clone());
        }
        if let Some(action) = &filter.action {
            bindings.insert("action".to_string(), action.as_str().to_string());
        }
        if let Some(resource_type) = &filter.resource_type {
            bindings.insert("resource_type".to_string(), resource_type.clone());
        }
        if let Some(from) = &filter.from {
            bindings.insert("from".to_string(), from.to_rfc3339());
        }
        if let Some(to) = &filter.to {
            bindings.insert("to".to_string(), to.to_rfc3339());
        }
        bindings
    }
}
