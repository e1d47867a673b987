//! Agent and health repositories.

use peanut_core::{Error, Result};
use peanut_storage::{content, tables, Database, StorageError};

use crate::agent::Agent;
use crate::health::AgentHealth;

/// Repository for the `agents` table.
#[derive(Debug, Clone)]
pub struct AgentStore {
    db: Database,
}

impl AgentStore {
    /// Create a store over the shared database handle.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a new agent together with its initial health row.
    ///
    /// # Errors
    ///
    /// Returns a storage error if either insert fails.
    pub async fn create(&self, agent: &Agent, health: &AgentHealth) -> Result<()> {
        self.db
            .client()
            .query("CREATE type::thing($tb, $id) CONTENT $data")
            .query("CREATE type::thing($health_tb, $id) CONTENT $health")
            .bind(("tb", tables::AGENTS))
            .bind(("id", agent.id.clone()))
            .bind(("data", content(agent)?))
            .bind(("health_tb", tables::AGENT_HEALTH))
            .bind(("health", content(health)?))
            .await
            .map_err(StorageError::from)?
            .check()
            .map_err(StorageError::from)?;
        Ok(())
    }

    /// Replace an agent's row with a new snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the agent no longer exists.
    pub async fn update(&self, agent: &Agent) -> Result<()> {
        let mut response = self
            .db
            .client()
            .query("UPDATE type::thing($tb, $id) CONTENT $data RETURN AFTER")
            .bind(("tb", tables::AGENTS))
            .bind(("id", agent.id.clone()))
            .bind(("data", content(agent)?))
            .await
            .map_err(StorageError::from)?;
        let updated: Option<serde_json::Value> =
            response.take(0).map_err(StorageError::from)?;
        if updated.is_none() {
            return Err(Error::NotFound(format!("agent {}", agent.id)));
        }
        Ok(())
    }

    /// Remove an agent and cascade its health row.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the delete fails.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.db
            .client()
            .query("DELETE type::thing($tb, $id)")
            .query("DELETE type::thing($health_tb, $id)")
            .bind(("tb", tables::AGENTS))
            .bind(("health_tb", tables::AGENT_HEALTH))
            .bind(("id", id.to_string()))
            .await
            .map_err(StorageError::from)?
            .check()
            .map_err(StorageError::from)?;
        Ok(())
    }

    /// Look an agent up by id.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the select fails.
    pub async fn find(&self, id: &str) -> Result<Option<Agent>> {
        let mut response = self
            .db
            .client()
            .query("SELECT *, record::id(id) AS id FROM type::thing($tb, $id)")
            .bind(("tb", tables::AGENTS))
            .bind(("id", id.to_string()))
            .await
            .map_err(StorageError::from)?;
        Ok(response.take(0).map_err(StorageError::from)?)
    }

    /// All agents, in creation order.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the select fails.
    pub async fn list(&self) -> Result<Vec<Agent>> {
        let mut response = self
            .db
            .client()
            .query(
                "SELECT *, record::id(id) AS id FROM type::table($tb) ORDER BY created_at ASC",
            )
            .bind(("tb", tables::AGENTS))
            .await
            .map_err(StorageError::from)?;
        Ok(response.take(0).map_err(StorageError::from)?)
    }
}

/// Repository for the `agent_health` table.
#[derive(Debug, Clone)]
pub struct HealthStore {
    db: Database,
}

impl HealthStore {
    /// Create a store over the shared database handle.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Write a health snapshot (the row is keyed by agent id).
    ///
    /// # Errors
    ///
    /// Returns a storage error if the upsert fails.
    pub async fn upsert(&self, health: &AgentHealth) -> Result<()> {
        self.db
            .client()
            .query("UPSERT type::thing($tb, $id) CONTENT $data")
            .bind(("tb", tables::AGENT_HEALTH))
            .bind(("id", health.id.clone()))
            .bind(("data", content(health)?))
            .await
            .map_err(StorageError::from)?
            .check()
            .map_err(StorageError::from)?;
        Ok(())
    }

    /// All health rows.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the select fails.
    pub async fn list(&self) -> Result<Vec<AgentHealth>> {
        let mut response = self
            .db
            .client()
            .query("SELECT *, record::id(id) AS id FROM type::table($tb)")
            .bind(("tb", tables::AGENT_HEALTH))
            .await
            .map_err(StorageError::from)?;
        Ok(response.take(0).map_err(StorageError::from)?)
    }

    /// The health row for an agent.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the select fails.
    pub async fn find(&self, agent_id: &str) -> Result<Option<AgentHealth>> {
        let mut response = self
            .db
            .client()
            .query("SELECT *, record::id(id) AS id FROM type::thing($tb, $id)")
            .bind(("tb", tables::AGENT_HEALTH))
            .bind(("id", agent_id.to_string()))
            .await
            .map_err(StorageError::from)?;
        Ok(response.take(0).map_err(StorageError::from)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentDraft, AgentType};

    async fn stores() -> (AgentStore, HealthStore) {
        let db = Database::connect_memory().await.unwrap();
        (AgentStore::new(db.clone()), HealthStore::new(db))
    }

    fn agent(name: &str) -> Agent {
        Agent::from_draft(AgentDraft {
            name: name.to_string(),
            agent_type: AgentType::LocalInference,
            endpoint: "http://127.0.0.1:11434".to_string(),
            model: "llama3".to_string(),
            max_tokens: None,
            temperature: None,
            priority: None,
            weight: Some(3),
            tags: None,
            metadata: None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_finds_agent_and_health() {
        let (agents, health) = stores().await;
        let a = agent("alpha");
        agents.create(&a, &AgentHealth::initial(&a.id)).await.unwrap();

        let found = agents.find(&a.id).await.unwrap().unwrap();
        assert_eq!(found.name, "alpha");

        let row = health.find(&a.id).await.unwrap().unwrap();
        assert_eq!(row.id, a.id);
    }

    #[tokio::test]
    async fn test_delete_cascades_health() {
        let (agents, health) = stores().await;
        let a = agent("alpha");
        agents.create(&a, &AgentHealth::initial(&a.id)).await.unwrap();

        agents.delete(&a.id).await.unwrap();
        assert!(agents.find(&a.id).await.unwrap().is_none());
        assert!(health.find(&a.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_in_creation_order() {
        let (agents, _) = stores().await;
        for name in ["first", "second", "third"] {
            let a = agent(name);
            agents.create(&a, &AgentHealth::initial(&a.id)).await.unwrap();
        }
        let all = agents.list().await.unwrap();
        let names: Vec<&str> = all.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_health_upsert_replaces() {
        let (agents, health) = stores().await;
        let a = agent("alpha");
        agents.create(&a, &AgentHealth::initial(&a.id)).await.unwrap();

        let updated = AgentHealth::initial(&a.id).observe_call(true, 17);
        health.upsert(&updated).await.unwrap();

        let row = health.find(&a.id).await.unwrap().unwrap();
        assert_eq!(row.request_count, 1);
        assert_eq!(row.latency_ms, 17);
    }
}
