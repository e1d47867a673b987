//! `SurrealDB` connection wrapper.
//!
//! | Mode | Connection | Backend |
//! |------|-----------|---------|
//! | Daemon | `surrealkv://DATA_DIR/gateway` | `SurrealKV` |
//! | Tests | `mem://` | In-memory |

use serde::Serialize;

use crate::error::{StorageError, StorageResult};

/// `SurrealDB` connection handle shared by the repositories.
///
/// Cloning is cheap; all clones share the one embedded engine. Writes
/// inherit the engine's per-statement transactional serialization.
#[derive(Clone)]
pub struct Database {
    inner: surrealdb::Surreal<surrealdb::engine::any::Any>,
}

impl Database {
    /// Connect to an embedded `SurrealKV` store at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Connection`] if the engine fails to
    /// open the path or select the namespace.
    pub async fn connect_embedded(path: &str) -> StorageResult<Self> {
        Self::connect(&format!("surrealkv://{path}")).await
    }

    /// Connect to an in-memory store (for tests).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Connection`] if the engine fails to
    /// initialize.
    pub async fn connect_memory() -> StorageResult<Self> {
        Self::connect("mem://").await
    }

    async fn connect(endpoint: &str) -> StorageResult<Self> {
        let db: surrealdb::Surreal<surrealdb::engine::any::Any> = surrealdb::Surreal::init();
        db.connect(endpoint)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        db.use_ns("peanut")
            .use_db("gateway")
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(Self { inner: db })
    }

    /// The underlying `SurrealDB` client, for `SurrealQL` queries.
    #[must_use]
    pub fn client(&self) -> &surrealdb::Surreal<surrealdb::engine::any::Any> {
        &self.inner
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

/// Serialize an entity into row content, stripping the `id` field.
///
/// The record key (`type::thing(table, $id)`) carries the identity;
/// keeping a shadow `id` field inside the row would fight the engine's
/// own record id on reads.
///
/// # Errors
///
/// Returns [`StorageError::Serialization`] if the entity does not
/// serialize to a JSON object.
pub fn content<T: Serialize>(entity: &T) -> StorageResult<serde_json::Value> {
    let mut value = serde_json::to_value(entity)?;
    match value.as_object_mut() {
        Some(map) => {
            map.remove("id");
        },
        None => {
            return Err(StorageError::Serialization(
                "entity did not serialize to an object".to_string(),
            ));
        },
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Row {
        id: String,
        name: String,
        weight: u32,
    }

    #[tokio::test]
    async fn test_connect_memory() {
        let db = Database::connect_memory().await.unwrap();
        let mut response = db.client().query("RETURN 1 + 1").await.unwrap();
        let value: Option<i64> = response.take(0).unwrap();
        assert_eq!(value, Some(2));
    }

    #[tokio::test]
    async fn test_explicit_record_key_round_trip() {
        let db = Database::connect_memory().await.unwrap();
        let row = Row {
            id: "a1b2c3".to_string(),
            name: "probe".to_string(),
            weight: 5,
        };

        db.client()
            .query("CREATE type::thing($tb, $id) CONTENT $data")
            .bind(("tb", crate::tables::AGENTS))
            .bind(("id", row.id.clone()))
            .bind(("data", content(&row).unwrap()))
            .await
            .unwrap()
            .check()
            .unwrap();

        let mut response = db
            .client()
            .query("SELECT *, record::id(id) AS id FROM type::thing($tb, $id)")
            .bind(("tb", crate::tables::AGENTS))
            .bind(("id", row.id.clone()))
            .await
            .unwrap();
        let found: Option<Row> = response.take(0).unwrap();
        assert_eq!(found, Some(row));
    }

    #[test]
    fn test_content_strips_id() {
        let row = Row {
            id: "deadbeef".to_string(),
            name: "x".to_string(),
            weight: 1,
        };
        let value = content(&row).unwrap();
        assert!(value.get("id").is_none());
        assert_eq!(value.get("name").unwrap(), "x");
    }
}
