//! The dispatch endpoint.

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use peanut_agents::{ChatMessage, DispatchRequest};
use peanut_audit::Actor;
use peanut_ratelimit::{key, RatePolicy};
use serde::Deserialize;

use crate::error::ApiError;
use crate::extract::{AuthSession, ClientMeta};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub(crate) struct DispatchBody {
    agent_id: Option<String>,
    session_id: Option<String>,
    message: String,
    #[serde(default)]
    context: Vec<ChatMessage>,
}

pub(crate) async fn dispatch(
    State(state): State<AppState>,
    session: AuthSession,
    meta: ClientMeta,
    Json(body): Json<DispatchBody>,
) -> Result<Response, ApiError> {
    state
        .limiter
        .check(
            &key("dispatch", &session.claims.sub),
            &RatePolicy::dispatch(),
        )
        .await?;

    let actor = Actor::user(&session.claims.sub, &session.claims.email)
        .with_client(meta.0.ip.clone(), meta.0.user_agent.clone());
    let result = state
        .orchestrator
        .dispatch(
            DispatchRequest {
                agent_id: body.agent_id,
                session_id: body.session_id,
                message: body.message,
                context: body.context,
            },
            actor,
        )
        .await?;
    Ok(Json(result).into_response())
}
