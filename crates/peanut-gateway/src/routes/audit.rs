//! The audit query endpoint.

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use peanut_audit::{AuditAction, AuditFilter};
use peanut_core::{Error, Timestamp};
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::extract::AuthSession;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AuditQuery {
    actor_id: Option<String>,
    action: Option<String>,
    resource_type: Option<String>,
    from: Option<String>,
    to: Option<String>,
    page: Option<usize>,
    limit: Option<usize>,
}

pub(crate) async fn query(
    State(state): State<AppState>,
    session: AuthSession,
    Query(params): Query<AuditQuery>,
) -> Result<Response, ApiError> {
    session.require(|role| role.can_read_audit())?;

    let action = params
        .action
        .as_deref()
        .map(str::parse::<AuditAction>)
        .transpose()
        .map_err(Error::Validation)?;
    let parse_ts = |value: Option<&str>| -> Result<Option<Timestamp>, ApiError> {
        value
            .map(Timestamp::parse)
            .transpose()
            .map_err(|e| ApiError(Error::Validation(format!("timestamp: {e}"))))
    };

    let page = state
        .audit
        .query(
            AuditFilter {
                actor_id: params.actor_id,
                action,
                resource_type: params.resource_type,
                from: parse_ts(params.from.as_deref())?,
                to: parse_ts(params.to.as_deref())?,
            },
            params.page.unwrap_or(1),
            params.limit.unwrap_or(50),
        )
        .await
        .map_err(peanut_core::Error::from)?;

    Ok(Json(json!({
        "entries": page.entries,
        "total": page.total,
        "page": page.page,
        "pages": page.pages,
        "integrity_valid": page.integrity_ok,
    }))
    .into_response())
}
