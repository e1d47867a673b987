//! Authentication endpoints.

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use peanut_auth::LoginOutcome;
use peanut_core::Error;
use peanut_ratelimit::{key, RatePolicy};
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::extract::{AuthSession, ClientMeta, AUTH_COOKIE};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub(crate) struct LoginBody {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TotpVerifyBody {
    temp_token: String,
    totp_code: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChangePasswordBody {
    current_password: String,
    new_password: String,
}

fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::new(AUTH_COOKIE, token);
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Strict);
    cookie.set_path("/");
    cookie.set_secure(secure);
    cookie
}

pub(crate) async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    meta: ClientMeta,
    Json(body): Json<LoginBody>,
) -> Result<Response, ApiError> {
    state
        .limiter
        .check(&key("login", &meta.ip_key()), &RatePolicy::login())
        .await?;

    match state.auth.login(&body.email, &body.password, &meta.0).await? {
        LoginOutcome::RequireTotp { temp_token } => Ok(Json(json!({
            "require_totp": true,
            "temp_token": temp_token,
        }))
        .into_response()),
        LoginOutcome::Authenticated { token, user, .. } => {
            let jar = jar.add(session_cookie(token, state.secure_cookies));
            Ok((jar, Json(json!({ "require_totp": false, "user": user }))).into_response())
        },
    }
}

pub(crate) async fn totp_verify(
    State(state): State<AppState>,
    jar: CookieJar,
    meta: ClientMeta,
    Json(body): Json<TotpVerifyBody>,
) -> Result<Response, ApiError> {
    state
        .limiter
        .check(&key("totp", &meta.ip_key()), &RatePolicy::totp())
        .await?;

    match state
        .auth
        .verify_totp(&body.temp_token, &body.totp_code, &meta.0)
        .await?
    {
        LoginOutcome::Authenticated { token, user, .. } => {
            let jar = jar.add(session_cookie(token, state.secure_cookies));
            Ok((jar, Json(json!({ "user": user }))).into_response())
        },
        LoginOutcome::RequireTotp { .. } => Err(ApiError(Error::Unauthorized(
            "invalid token or code".to_string(),
        ))),
    }
}

pub(crate) async fn logout(
    State(state): State<AppState>,
    session: AuthSession,
    jar: CookieJar,
    meta: ClientMeta,
) -> Result<Response, ApiError> {
    state.auth.logout(&session.claims, &meta.0).await?;
    let mut removal = Cookie::from(AUTH_COOKIE);
    removal.set_path("/");
    let jar = jar.remove(removal);
    Ok((jar, Json(json!({ "success": true }))).into_response())
}

pub(crate) async fn me(
    State(state): State<AppState>,
    session: AuthSession,
) -> Result<Response, ApiError> {
    let profile = state.auth.profile(&session.claims.sub).await?;
    Ok(Json(profile).into_response())
}

pub(crate) async fn totp_setup(
    State(state): State<AppState>,
    session: AuthSession,
    meta: ClientMeta,
) -> Result<Response, ApiError> {
    let setup = state.auth.setup_totp(&session.claims.sub, &meta.0).await?;
    Ok(Json(setup).into_response())
}

pub(crate) async fn change_password(
    State(state): State<AppState>,
    session: AuthSession,
    meta: ClientMeta,
    Json(body): Json<ChangePasswordBody>,
) -> Result<Response, ApiError> {
    state
        .auth
        .change_password(
            &session.claims.sub,
            &body.current_password,
            &body.new_password,
            &meta.0,
        )
        .await?;
    Ok(Json(json!({ "success": true })).into_response())
}
