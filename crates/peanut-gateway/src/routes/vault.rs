//! Vault endpoints.

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use peanut_audit::Actor;
use peanut_ratelimit::{key, RatePolicy};
use peanut_vault::{CompletionRequest, VaultConfigUpdate};

use crate::error::ApiError;
use crate::extract::{AuthSession, ClientMeta};
use crate::state::AppState;

pub(crate) async fn status(
    State(state): State<AppState>,
    _session: AuthSession,
) -> Result<Response, ApiError> {
    let status = state.vault.status().await?;
    Ok(Json(status).into_response())
}

pub(crate) async fn get_config(
    State(state): State<AppState>,
    session: AuthSession,
) -> Result<Response, ApiError> {
    session.require(|role| role.can_manage_vault())?;
    let view = state.vault.config().await?;
    Ok(Json(view).into_response())
}

pub(crate) async fn put_config(
    State(state): State<AppState>,
    session: AuthSession,
    meta: ClientMeta,
    Json(update): Json<VaultConfigUpdate>,
) -> Result<Response, ApiError> {
    session.require(|role| role.can_manage_vault())?;
    let actor = Actor::user(&session.claims.sub, &session.claims.email)
        .with_client(meta.0.ip.clone(), meta.0.user_agent.clone());
    let view = state.vault.update_config(update, actor).await?;
    Ok(Json(view).into_response())
}

pub(crate) async fn complete(
    State(state): State<AppState>,
    session: AuthSession,
    Json(request): Json<CompletionRequest>,
) -> Result<Response, ApiError> {
    state
        .limiter
        .check(
            &key("vault_complete", &session.claims.sub),
            &RatePolicy::vault_complete(),
        )
        .await?;
    let response = state.vault.complete(request).await?;
    Ok(Json(response).into_response())
}

pub(crate) async fn usage(
    State(state): State<AppState>,
    session: AuthSession,
) -> Result<Response, ApiError> {
    session.require(|role| role.can_read_audit())?;
    let snapshot = state.vault.usage().await?;
    Ok(Json(snapshot).into_response())
}
