//! Agent registry endpoints.

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use peanut_agents::{AgentDraft, AgentPatch};
use peanut_audit::Actor;
use serde_json::json;

use crate::error::ApiError;
use crate::extract::{AuthSession, ClientMeta};
use crate::state::AppState;

fn actor(session: &AuthSession, meta: &ClientMeta) -> Actor {
    Actor::user(&session.claims.sub, &session.claims.email)
        .with_client(meta.0.ip.clone(), meta.0.user_agent.clone())
}

pub(crate) async fn list(
    State(state): State<AppState>,
    _session: AuthSession,
) -> Result<Response, ApiError> {
    let agents = state.orchestrator.list().await?;
    Ok(Json(json!({ "agents": agents })).into_response())
}

pub(crate) async fn create(
    State(state): State<AppState>,
    session: AuthSession,
    meta: ClientMeta,
    Json(draft): Json<AgentDraft>,
) -> Result<Response, ApiError> {
    session.require(|role| role.can_manage_agents())?;
    let agent = state
        .orchestrator
        .create(draft, actor(&session, &meta))
        .await?;
    Ok(Json(agent).into_response())
}

pub(crate) async fn update(
    State(state): State<AppState>,
    session: AuthSession,
    meta: ClientMeta,
    Path(id): Path<String>,
    Json(patch): Json<AgentPatch>,
) -> Result<Response, ApiError> {
    session.require(|role| role.can_manage_agents())?;
    let agent = state
        .orchestrator
        .update(&id, patch, actor(&session, &meta))
        .await?;
    Ok(Json(agent).into_response())
}

pub(crate) async fn delete(
    State(state): State<AppState>,
    session: AuthSession,
    meta: ClientMeta,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    session.require(|role| role.can_delete_agents())?;
    state
        .orchestrator
        .delete(&id, actor(&session, &meta))
        .await?;
    Ok(Json(json!({ "success": true })).into_response())
}

pub(crate) async fn probe(
    State(state): State<AppState>,
    _session: AuthSession,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let health = state.orchestrator.probe_agent(&id).await?;
    Ok(Json(health).into_response())
}
