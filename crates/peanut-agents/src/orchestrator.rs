//! The orchestrator: registry CRUD, health refresh, weighted dispatch.

use peanut_audit::{Actor, AuditAction, AuditLog, Subject};
use peanut_core::{Error, Result, Timestamp};
use peanut_crypto::random_id;
use peanut_storage::Database;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::agent::{Agent, AgentDraft, AgentPatch};
use crate::client::{AgentBackend, ChatMessage};
use crate::health::{AgentHealth, HealthStatus};
use crate::selector::WeightedSelector;
use crate::store::{AgentStore, HealthStore};

/// How long the in-process selection cache stays fresh.
const SELECTOR_TTL: Duration = Duration::from_secs(30);

/// An agent paired with its health row, as the list endpoint returns.
#[derive(Debug, Clone, Serialize)]
pub struct AgentWithHealth {
    /// The agent's configuration.
    pub agent: Agent,
    /// Its current health, if the row exists.
    pub health: Option<AgentHealth>,
}

/// A dispatch request from the boundary.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    /// Explicit target; bypasses weighted selection and health.
    pub agent_id: Option<String>,
    /// Conversation id; generated when absent.
    pub session_id: Option<String>,
    /// The user's message.
    pub message: String,
    /// Prior conversation turns.
    pub context: Vec<ChatMessage>,
}

/// A completed dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchResult {
    /// Unique id of this request.
    pub request_id: String,
    /// The agent that served it.
    pub agent_id: String,
    /// Conversation id.
    pub session_id: String,
    /// The assistant's reply.
    pub message: String,
    /// Model that produced the reply.
    pub model: String,
    /// Tokens consumed, as reported by the backend.
    pub tokens_used: u64,
    /// Observed call latency.
    pub latency_ms: u64,
    /// Completion time.
    pub timestamp: Timestamp,
}

#[derive(Debug, Default)]
struct SelectorCache {
    selector: WeightedSelector,
    loaded_at: Option<Instant>,
}

/// The agent orchestrator.
#[derive(Clone)]
pub struct Orchestrator {
    agents: AgentStore,
    health: HealthStore,
    audit: AuditLog,
    backend: Arc<dyn AgentBackend>,
    cache: Arc<Mutex<SelectorCache>>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator").finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Wire the orchestrator over the shared database and audit log.
    #[must_use]
    pub fn new(db: Database, audit: AuditLog, backend: Arc<dyn AgentBackend>) -> Self {
        Self {
            agents: AgentStore::new(db.clone()),
            health: HealthStore::new(db),
            audit,
            backend,
            cache: Arc::new(Mutex::new(SelectorCache::default())),
        }
    }

    /// Register a new agent (health row created alongside).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for out-of-range fields.
    pub async fn create(&self, draft: AgentDraft, actor: Actor) -> Result<Agent> {
        let agent = Agent::from_draft(draft)?;
        self.agents
            .create(&agent, &AgentHealth::initial(&agent.id))
            .await?;
        self.invalidate_cache().await;
        self.audit
            .append(
                AuditAction::AgentCreated,
                actor,
                Subject::agent(&agent.id),
                serde_json::json!({ "name": agent.name, "type": agent.agent_type, "endpoint": agent.endpoint }),
            )
            .await?;
        info!(agent = %agent.name, id = %agent.id, "agent registered");
        Ok(agent)
    }

    /// Apply a partial update (the type can never change).
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id.
    pub async fn update(&self, id: &str, patch: AgentPatch, actor: Actor) -> Result<Agent> {
        let agent = self
            .agents
            .find(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("agent {id}")))?;
        let updated = agent.apply(patch)?;
        self.agents.update(&updated).await?;
        self.invalidate_cache().await;
        self.audit
            .append(
                AuditAction::AgentUpdated,
                actor,
                Subject::agent(id),
                serde_json::json!({ "name": updated.name }),
            )
            .await?;
        Ok(updated)
    }

    /// Remove an agent and its health row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id.
    pub async fn delete(&self, id: &str, actor: Actor) -> Result<()> {
        let agent = self
            .agents
            .find(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("agent {id}")))?;
        self.agents.delete(id).await?;
        self.invalidate_cache().await;
        self.audit
            .append(
                AuditAction::AgentDeleted,
                actor,
                Subject::agent(id),
                serde_json::json!({ "name": agent.name }),
            )
            .await?;
        Ok(())
    }

    /// All agents with their health rows.
    ///
    /// # Errors
    ///
    /// Returns a storage error if a select fails.
    pub async fn list(&self) -> Result<Vec<AgentWithHealth>> {
        let agents = self.agents.list().await?;
        let mut health: HashMap<String, AgentHealth> = self
            .health
            .list()
            .await?
            .into_iter()
            .map(|h| (h.id.clone(), h))
            .collect();
        Ok(agents
            .into_iter()
            .map(|agent| {
                let health = health.remove(&agent.id);
                AgentWithHealth { agent, health }
            })
            .collect())
    }

    /// Probe one agent now and persist what was observed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id.
    pub async fn probe_agent(&self, id: &str) -> Result<AgentHealth> {
        let agent = self
            .agents
            .find(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("agent {id}")))?;

        let outcome = self.backend.probe(&agent).await;
        let row = self
            .health
            .find(id)
            .await?
            .unwrap_or_else(|| AgentHealth::initial(id));
        let updated = row.observe_probe(outcome.status, outcome.latency_ms, outcome.details);
        self.health.upsert(&updated).await?;
        Ok(updated)
    }

    /// Probe every registered agent (the 30-second sweep body).
    ///
    /// Individual probe failures are logged, not propagated; one dead
    /// agent must not starve the rest of the sweep.
    pub async fn probe_all(&self) {
        let agents = match self.agents.list().await {
            Ok(agents) => agents,
            Err(err) => {
                warn!(error = %err, "health sweep could not list agents");
                return;
            },
        };
        for agent in agents {
            if let Err(err) = self.probe_agent(&agent.id).await {
                warn!(agent = %agent.name, error = %err, "health probe failed");
            }
        }
    }

    /// Dispatch a chat request.
    ///
    /// Metric update happens before the audit append, which happens
    /// before the response; an append failure fails the dispatch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown explicit target,
    /// [`Error::ExternalService`] when no agent is online or the
    /// backend call fails.
    pub async fn dispatch(&self, request: DispatchRequest, actor: Actor) -> Result<DispatchResult> {
        if request.message.trim().is_empty() {
            return Err(Error::Validation("message must not be empty".to_string()));
        }

        // Explicit targeting skips selection and health: the caller chose.
        let agent = match &request.agent_id {
            Some(id) => self
                .agents
                .find(id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("agent {id}")))?,
            None => self.select_online().await?,
        };

        let mut messages = request.context;
        messages.push(ChatMessage::user(&request.message));

        let started = Instant::now();
        let outcome = self.backend.chat(&agent, messages).await;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        // Metric reconciliation runs for success and failure alike.
        let row = self
            .health
            .find(&agent.id)
            .await?
            .unwrap_or_else(|| AgentHealth::initial(&agent.id));
        self.health
            .upsert(&row.observe_call(outcome.is_ok(), latency_ms))
            .await?;

        let session_id = request.session_id.unwrap_or_else(random_id);
        let request_id = random_id();
        self.audit
            .append(
                AuditAction::AgentRequest,
                actor,
                Subject::agent(&agent.id),
                serde_json::json!({
                    "request_id": request_id,
                    "session_id": session_id,
                    "model": agent.model,
                    "latency_ms": latency_ms,
                    "success": outcome.is_ok(),
                    "tokens_used": outcome.as_ref().map(|o| o.tokens_used).unwrap_or_default(),
                }),
            )
            .await?;

        let output = outcome?;
        Ok(DispatchResult {
            request_id,
            agent_id: agent.id,
            session_id,
            message: output.content,
            model: agent.model,
            tokens_used: output.tokens_used,
            latency_ms,
            timestamp: Timestamp::now(),
        })
    }

    /// Pick the next online agent under smooth weighted round-robin.
    async fn select_online(&self) -> Result<Agent> {
        let mut cache = self.cache.lock().await;

        let stale = cache
            .loaded_at
            .is_none_or(|at| at.elapsed() > SELECTOR_TTL);
        if stale {
            let agents = self.agents.list().await?;
            let online: HashMap<String, AgentHealth> = self
                .health
                .list()
                .await?
                .into_iter()
                .filter(|h| h.status == HealthStatus::Online)
                .map(|h| (h.id.clone(), h))
                .collect();
            cache.selector = WeightedSelector::new(
                agents
                    .iter()
                    .filter(|a| online.contains_key(&a.id))
                    .map(|a| (a.id.clone(), a.weight)),
            );
            cache.loaded_at = Some(Instant::now());
        }

        if cache.selector.is_empty() {
            return Err(Error::external("agents", "no online agents available"));
        }

        let selected = cache
            .selector
            .select()
            .map(str::to_string)
            .ok_or_else(|| Error::external("agents", "no online agents available"))?;
        drop(cache);

        self.agents
            .find(&selected)
            .await?
            .ok_or_else(|| Error::NotFound(format!("agent {selected}")))
    }

    async fn invalidate_cache(&self) {
        self.cache.lock().await.loaded_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentType;
    use crate::client::{ChatOutput, ProbeOutcome};
    use async_trait::async_trait;
    use peanut_audit::AuditFilter;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct MockBackend {
        fail_chat: AtomicBool,
        probe_status: HealthStatus,
    }

    impl MockBackend {
        fn healthy() -> Arc<Self> {
            Arc::new(Self {
                fail_chat: AtomicBool::new(false),
                probe_status: HealthStatus::Online,
            })
        }
    }

    #[async_trait]
    impl AgentBackend for MockBackend {
        async fn probe(&self, _agent: &Agent) -> ProbeOutcome {
            ProbeOutcome {
                status: self.probe_status,
                latency_ms: 3,
                details: "mock".to_string(),
            }
        }

        async fn chat(&self, agent: &Agent, _messages: Vec<ChatMessage>) -> Result<ChatOutput> {
            if self.fail_chat.load(Ordering::SeqCst) {
                return Err(Error::external(&agent.name, "mock backend down"));
            }
            Ok(ChatOutput {
                content: format!("pong from {}", agent.name),
                tokens_used: 42,
            })
        }
    }

    async fn orchestrator(backend: Arc<MockBackend>) -> (Orchestrator, AuditLog) {
        let db = Database::connect_memory().await.unwrap();
        let audit = AuditLog::new(db.clone());
        (Orchestrator::new(db, audit.clone(), backend), audit)
    }

    fn draft(name: &str, weight: u32) -> AgentDraft {
        AgentDraft {
            name: name.to_string(),
            agent_type: AgentType::LocalInference,
            endpoint: "http://127.0.0.1:11434".to_string(),
            model: "llama3".to_string(),
            max_tokens: None,
            temperature: None,
            priority: None,
            weight: Some(weight),
            tags: None,
            metadata: None,
        }
    }

    fn request(message: &str) -> DispatchRequest {
        DispatchRequest {
            agent_id: None,
            session_id: None,
            message: message.to_string(),
            context: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_crud_is_audited() {
        let (orch, audit) = orchestrator(MockBackend::healthy()).await;

        let agent = orch.create(draft("alpha", 5), Actor::system()).await.unwrap();
        orch.update(
            &agent.id,
            AgentPatch {
                weight: Some(7),
                ..AgentPatch::default()
            },
            Actor::system(),
        )
        .await
        .unwrap();
        orch.delete(&agent.id, Actor::system()).await.unwrap();

        for action in [
            AuditAction::AgentCreated,
            AuditAction::AgentUpdated,
            AuditAction::AgentDeleted,
        ] {
            let page = audit
                .query(
                    AuditFilter {
                        action: Some(action),
                        ..AuditFilter::default()
                    },
                    1,
                    10,
                )
                .await
                .unwrap();
            assert_eq!(page.total, 1, "{action}");
            assert_eq!(page.entries[0].resource_id.as_deref(), Some(agent.id.as_str()));
        }
    }

    #[tokio::test]
    async fn test_weighted_shares_over_1000_dispatches() {
        let (orch, _) = orchestrator(MockBackend::healthy()).await;

        let mut ids = HashMap::new();
        for (name, weight) in [("a", 5u32), ("b", 3), ("c", 2)] {
            let agent = orch.create(draft(name, weight), Actor::system()).await.unwrap();
            ids.insert(agent.id.clone(), name);
        }
        orch.probe_all().await;

        let mut counts: HashMap<&str, u32> = HashMap::new();
        for _ in 0..1000 {
            let result = orch.dispatch(request("ping"), Actor::system()).await.unwrap();
            *counts.entry(ids[&result.agent_id]).or_default() += 1;
        }

        // 2% tolerance per the weighted-fairness contract.
        assert!((i64::from(counts["a"]) - 500).abs() <= 20, "{counts:?}");
        assert!((i64::from(counts["b"]) - 300).abs() <= 20, "{counts:?}");
        assert!((i64::from(counts["c"]) - 200).abs() <= 20, "{counts:?}");
    }

    #[tokio::test]
    async fn test_dispatch_records_metrics_and_audit() {
        let (orch, audit) = orchestrator(MockBackend::healthy()).await;
        let agent = orch.create(draft("alpha", 5), Actor::system()).await.unwrap();
        orch.probe_all().await;

        let result = orch
            .dispatch(request("hello"), Actor::user("u1", "op@peanut.local"))
            .await
            .unwrap();
        assert_eq!(result.agent_id, agent.id);
        assert_eq!(result.tokens_used, 42);
        assert_eq!(result.model, "llama3");

        let health = orch.probe_agent(&agent.id).await.unwrap();
        assert_eq!(health.request_count, 1);
        assert_eq!(health.error_count, 0);

        let page = audit
            .query(
                AuditFilter {
                    action: Some(AuditAction::AgentRequest),
                    ..AuditFilter::default()
                },
                1,
                10,
            )
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.entries[0].resource_id.as_deref(), Some(agent.id.as_str()));
    }

    #[tokio::test]
    async fn test_failed_call_degrades_health_and_surfaces() {
        let backend = MockBackend::healthy();
        let (orch, audit) = orchestrator(Arc::clone(&backend)).await;
        let agent = orch.create(draft("alpha", 5), Actor::system()).await.unwrap();
        orch.probe_all().await;

        backend.fail_chat.store(true, Ordering::SeqCst);
        let err = orch.dispatch(request("hello"), Actor::system()).await.unwrap_err();
        assert!(matches!(err, Error::ExternalService { .. }));

        let health = orch
            .list()
            .await
            .unwrap()
            .into_iter()
            .find(|a| a.agent.id == agent.id)
            .unwrap()
            .health
            .unwrap();
        assert_eq!(health.status, HealthStatus::Degraded);
        assert_eq!(health.request_count, 1);
        assert_eq!(health.error_count, 1);

        // The failure is still on the audit trail.
        let page = audit
            .query(
                AuditFilter {
                    action: Some(AuditAction::AgentRequest),
                    ..AuditFilter::default()
                },
                1,
                10,
            )
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.entries[0].details["success"], false);
    }

    #[tokio::test]
    async fn test_explicit_target_bypasses_health() {
        let (orch, _) = orchestrator(MockBackend::healthy()).await;
        let agent = orch.create(draft("alpha", 5), Actor::system()).await.unwrap();
        // Never probed: the agent's health row still says offline.

        let result = orch
            .dispatch(
                DispatchRequest {
                    agent_id: Some(agent.id.clone()),
                    ..request("direct")
                },
                Actor::system(),
            )
            .await
            .unwrap();
        assert_eq!(result.agent_id, agent.id);
    }

    #[tokio::test]
    async fn test_explicit_unknown_target_is_not_found() {
        let (orch, _) = orchestrator(MockBackend::healthy()).await;
        let err = orch
            .dispatch(
                DispatchRequest {
                    agent_id: Some("missing".to_string()),
                    ..request("direct")
                },
                Actor::system(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_no_online_agents() {
        let (orch, _) = orchestrator(MockBackend::healthy()).await;
        orch.create(draft("alpha", 5), Actor::system()).await.unwrap();
        // Not probed: offline, so weighted selection has nothing.

        let err = orch.dispatch(request("hello"), Actor::system()).await.unwrap_err();
        assert!(matches!(err, Error::ExternalService { .. }));
    }

    #[tokio::test]
    async fn test_registry_mutation_invalidates_selection() {
        let (orch, _) = orchestrator(MockBackend::healthy()).await;
        let a = orch.create(draft("alpha", 1), Actor::system()).await.unwrap();
        let b = orch.create(draft("beta", 1), Actor::system()).await.unwrap();
        orch.probe_all().await;

        let mut seen = std::collections::HashSet::new();
        for _ in 0..4 {
            let result = orch.dispatch(request("ping"), Actor::system()).await.unwrap();
            seen.insert(result.agent_id);
        }
        assert!(seen.contains(&a.id) && seen.contains(&b.id));

        orch.delete(&b.id, Actor::system()).await.unwrap();
        for _ in 0..4 {
            let result = orch.dispatch(request("ping"), Actor::system()).await.unwrap();
            assert_eq!(result.agent_id, a.id);
        }
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let (orch, _) = orchestrator(MockBackend::healthy()).await;
        let err = orch.dispatch(request("   "), Actor::system()).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
