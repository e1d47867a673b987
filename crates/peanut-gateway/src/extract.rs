//! Request extractors: client metadata and the session gate.

use axum::extract::connect_info::ConnectInfo;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::cookie::CookieJar;
use peanut_auth::{ClientInfo, SessionClaims};
use peanut_core::{Error, Role};
use std::net::SocketAddr;

use crate::error::ApiError;
use crate::state::AppState;

/// Name of the session cookie.
pub(crate) const AUTH_COOKIE: &str = "auth_token";

/// Client IP and user agent, as far as the boundary can tell.
#[derive(Debug, Clone)]
pub(crate) struct ClientMeta(pub(crate) ClientInfo);

impl<S: Send + Sync> FromRequestParts<S> for ClientMeta {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        // First hop of X-Forwarded-For wins; the socket peer is the
        // fallback when no proxy is in front.
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string());
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip().to_string());

        let user_agent = parts
            .headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(Self(ClientInfo {
            ip: forwarded.or(peer),
            user_agent,
        }))
    }
}

impl ClientMeta {
    /// The principal used for IP-keyed rate limits.
    pub(crate) fn ip_key(&self) -> String {
        self.0.ip.clone().unwrap_or_else(|| "unknown".to_string())
    }
}

/// A verified, unrevoked session.
#[derive(Debug, Clone)]
pub(crate) struct AuthSession {
    /// The session's claims.
    pub(crate) claims: SessionClaims,
}

impl AuthSession {
    /// The caller's role.
    pub(crate) fn role(&self) -> Role {
        self.claims.role
    }

    /// Enforce a role predicate, or fail `FORBIDDEN`.
    pub(crate) fn require(&self, allowed: impl Fn(Role) -> bool) -> Result<(), ApiError> {
        if allowed(self.role()) {
            Ok(())
        } else {
            Err(ApiError(Error::Forbidden(format!(
                "role {} may not perform this operation",
                self.role()
            ))))
        }
    }
}

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(AUTH_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .ok_or_else(|| ApiError(Error::Unauthorized("missing session".to_string())))?;

        let claims = state.auth.signer().verify_session(&token)?;
        if !state.auth.session_active(&claims.sid).await? {
            return Err(ApiError(Error::Unauthorized(
                "session revoked or expired".to_string(),
            )));
        }

        Ok(Self { claims })
    }
}
