//! The backend protocol: health probes and chat calls.

use async_trait::async_trait;
use peanut_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::agent::Agent;
use crate::health::HealthStatus;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const CHAT_TIMEOUT: Duration = Duration::from_secs(30);

/// One turn of chat context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `system`, `user`, or `assistant`.
    pub role: String,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// A user-authored message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// What a successful backend call yields.
#[derive(Debug, Clone)]
pub struct ChatOutput {
    /// The assistant's reply text.
    pub content: String,
    /// Prompt plus completion tokens, as reported by the backend.
    pub tokens_used: u64,
}

/// What a probe observed.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    /// Mapped health classification.
    pub status: HealthStatus,
    /// Observed round-trip latency.
    pub latency_ms: u64,
    /// Human-readable detail (`HTTP 200 OK`, the transport error, …).
    pub details: String,
}

/// The seam between the orchestrator and real backends.
#[async_trait]
pub trait AgentBackend: Send + Sync {
    /// Probe the agent's endpoint root. Never fails: transport errors
    /// map to [`HealthStatus::Offline`].
    async fn probe(&self, agent: &Agent) -> ProbeOutcome;

    /// Issue a chat call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExternalService`] on transport failure,
    /// timeout, non-2xx status, or an unparseable body.
    async fn chat(&self, agent: &Agent, messages: Vec<ChatMessage>) -> Result<ChatOutput>;
}

#[derive(Debug, Serialize)]
struct ChatRequestBody {
    model: String,
    messages: Vec<ChatMessage>,
    options: ChatOptions,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponseBody {
    message: ChatResponseMessage,
    #[serde(default)]
    prompt_eval_count: u64,
    #[serde(default)]
    eval_count: u64,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// The production backend speaking the Ollama-style `/api/chat`
/// protocol over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
}

impl HttpBackend {
    /// Create the backend with a shared connection pool.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the TLS backend fails to
    /// initialize.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(Error::internal)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl AgentBackend for HttpBackend {
    async fn probe(&self, agent: &Agent) -> ProbeOutcome {
        let started = Instant::now();
        let result = self
            .client
            .get(&agent.endpoint)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(response) => {
                let status = response.status();
                debug!(agent = %agent.name, %status, latency_ms, "probe completed");
                ProbeOutcome {
                    status: if status.is_success() {
                        HealthStatus::Online
                    } else {
                        HealthStatus::Degraded
                    },
                    latency_ms,
                    details: format!("HTTP {status}"),
                }
            },
            Err(err) => ProbeOutcome {
                status: HealthStatus::Offline,
                latency_ms,
                details: err.to_string(),
            },
        }
    }

    async fn chat(&self, agent: &Agent, messages: Vec<ChatMessage>) -> Result<ChatOutput> {
        let url = format!("{}/api/chat", agent.endpoint.trim_end_matches('/'));
        let body = ChatRequestBody {
            model: agent.model.clone(),
            messages,
            options: ChatOptions {
                temperature: agent.temperature,
            },
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .timeout(CHAT_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::external(&agent.name, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::external(
                &agent.name,
                format!("status {status}: {detail}"),
            ));
        }

        let parsed: ChatResponseBody = response
            .json()
            .await
            .map_err(|e| Error::external(&agent.name, format!("invalid response: {e}")))?;

        Ok(ChatOutput {
            content: parsed.message.content,
            tokens_used: parsed.prompt_eval_count.saturating_add(parsed.eval_count),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_body_shape() {
        let body = ChatRequestBody {
            model: "llama3".to_string(),
            messages: vec![ChatMessage::user("hi")],
            options: ChatOptions { temperature: 0.7 },
            stream: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "llama3");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["options"]["temperature"], 0.7);
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn test_chat_response_token_sum() {
        let body: ChatResponseBody = serde_json::from_str(
            r#"{"message":{"role":"assistant","content":"hello"},"prompt_eval_count":11,"eval_count":31}"#,
        )
        .unwrap();
        assert_eq!(body.message.content, "hello");
        assert_eq!(body.prompt_eval_count + body.eval_count, 42);
    }

    #[test]
    fn test_chat_response_counts_optional() {
        let body: ChatResponseBody =
            serde_json::from_str(r#"{"message":{"content":"hi"}}"#).unwrap();
        assert_eq!(body.prompt_eval_count, 0);
        assert_eq!(body.eval_count, 0);
    }
}
