//! End-to-end tests over the HTTP surface.
//!
//! Each test builds a fresh in-memory gateway with a mock backend and
//! drives the router directly; no sockets, no real upstreams.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use peanut_agents::{
    Agent, AgentBackend, ChatMessage, ChatOutput, HealthStatus, ProbeOutcome,
};
use peanut_auth::UserStore;
use peanut_core::Role;
use peanut_crypto::hash_password;
use peanut_gateway::{router, AppState};
use peanut_storage::{tables, Database};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const SESSION_SECRET: &str = "integration-test-session-secret!!";
const VAULT_KEY_HEX: &str = "00112233445566778899aabbccddeeff00112233445566778899aabbccddeeff";
const ADMIN_EMAIL: &str = "admin@peanut.local";
const ADMIN_PASSWORD: &str = "seed-password-for-tests";

struct MockBackend;

#[async_trait]
impl AgentBackend for MockBackend {
    async fn probe(&self, _agent: &Agent) -> ProbeOutcome {
        ProbeOutcome {
            status: HealthStatus::Online,
            latency_ms: 2,
            details: "HTTP 200 OK".to_string(),
        }
    }

    async fn chat(
        &self,
        agent: &Agent,
        _messages: Vec<ChatMessage>,
    ) -> peanut_core::Result<ChatOutput> {
        Ok(ChatOutput {
            content: format!("echo from {}", agent.name),
            tokens_used: 7,
        })
    }
}

async fn gateway() -> (Router, AppState, Database) {
    let db = Database::connect_memory().await.unwrap();
    let state = AppState::new(
        &db,
        SESSION_SECRET,
        VAULT_KEY_HEX,
        false,
        Arc::new(MockBackend),
    )
    .unwrap();
    state.auth.seed_admin(Some(ADMIN_PASSWORD)).await.unwrap();
    (router(state.clone()), state, db)
}

async fn send(
    app: &Router,
    method: Method,
    path: &str,
    cookie: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Option<String>, Value) {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let request = match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string);
    let retry_after = response
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let mut body: Value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    // Surface the Retry-After header for the rate-limit assertions.
    if let (Some(retry), Some(map)) = (retry_after, body.as_object_mut()) {
        map.insert("_retry_after".to_string(), Value::String(retry));
    }

    (status, set_cookie, body)
}

async fn login(app: &Router, email: &str, password: &str) -> String {
    let (status, cookie, body) = send(
        app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": email, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["require_totp"], false);
    cookie.expect("session cookie")
}

#[tokio::test]
async fn seeded_login_and_profile() {
    let (app, _state, _db) = gateway().await;

    let cookie = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    assert!(cookie.starts_with("auth_token="));

    let (status, _, body) = send(&app, Method::GET, "/api/v1/auth/me", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], ADMIN_EMAIL);
    assert_eq!(body["role"], "admin");
}

#[tokio::test]
async fn invalid_credentials_are_audited() {
    let (app, _state, _db) = gateway().await;

    let (status, cookie, body) = send(
        &app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": ADMIN_EMAIL, "password": "wrong-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(cookie.is_none());
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let admin = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let (status, _, body) = send(
        &app,
        Method::GET,
        "/api/v1/audit?action=auth.login_failed",
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["integrity_valid"], true);
}

#[tokio::test]
async fn totp_enrolment_and_backup_code_login() {
    let (app, _state, _db) = gateway().await;
    let cookie = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    // Enrol.
    let (status, _, setup) = send(
        &app,
        Method::POST,
        "/api/v1/auth/totp/setup",
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(setup["secret"].as_str().is_some());
    assert!(setup["qr_code_data_url"]
        .as_str()
        .unwrap()
        .starts_with("data:image/svg+xml;base64,"));
    let backup_codes: Vec<String> = setup["backup_codes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    assert_eq!(backup_codes.len(), 10);

    // Log out; password alone now yields a TOTP challenge.
    send(&app, Method::POST, "/api/v1/auth/logout", Some(&cookie), None).await;
    let (status, cookie, body) = send(
        &app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(cookie.is_none(), "no session before second factor");
    assert_eq!(body["require_totp"], true);
    let temp_token = body["temp_token"].as_str().unwrap().to_string();

    // A backup code completes the login.
    let (status, cookie, _) = send(
        &app,
        Method::POST,
        "/api/v1/auth/totp/verify",
        None,
        Some(json!({ "temp_token": temp_token, "totp_code": backup_codes[0] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(cookie.is_some());

    // The same code fails the second time.
    let (_, _, body) = send(
        &app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD })),
    )
    .await;
    let temp_token = body["temp_token"].as_str().unwrap().to_string();
    let (status, cookie, _) = send(
        &app,
        Method::POST,
        "/api/v1/auth/totp/verify",
        None,
        Some(json!({ "temp_token": temp_token, "totp_code": backup_codes[0] })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(cookie.is_none());
}

#[tokio::test]
async fn dispatch_round_trip_with_audit() {
    let (app, _state, _db) = gateway().await;
    let cookie = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let (status, _, agent) = send(
        &app,
        Method::POST,
        "/api/v1/agents",
        Some(&cookie),
        Some(json!({
            "name": "local-llama",
            "type": "local_inference",
            "endpoint": "http://127.0.0.1:11434",
            "model": "llama3",
            "weight": 5
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{agent}");
    let agent_id = agent["id"].as_str().unwrap().to_string();

    // Force a probe so weighted selection sees the agent online.
    let (status, _, health) = send(
        &app,
        Method::GET,
        &format!("/api/v1/agents/{agent_id}/health"),
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "online");

    let (status, _, result) = send(
        &app,
        Method::POST,
        "/api/v1/openclaw/dispatch",
        Some(&cookie),
        Some(json!({ "message": "ping" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{result}");
    assert_eq!(result["agent_id"], agent_id.as_str());
    assert_eq!(result["message"], "echo from local-llama");
    assert_eq!(result["tokens_used"], 7);
    assert!(result["latency_ms"].as_u64().is_some());

    let (_, _, audit) = send(
        &app,
        Method::GET,
        "/api/v1/audit?action=agent.request",
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(audit["total"], 1);
    assert_eq!(audit["entries"][0]["resource_id"], agent_id.as_str());
}

#[tokio::test]
async fn audit_tamper_detection_over_http() {
    let (app, _state, db) = gateway().await;
    let cookie = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    // Generate a few entries.
    for _ in 0..4 {
        send(
            &app,
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": ADMIN_EMAIL, "password": "nope-wrong-pass" })),
        )
        .await;
    }

    let (_, _, before) = send(&app, Method::GET, "/api/v1/audit?limit=50", Some(&cookie), None).await;
    assert_eq!(before["integrity_valid"], true);
    let victim = before["entries"][2]["id"].as_str().unwrap().to_string();

    // Edit a historical row out-of-band.
    db.client()
        .query("UPDATE type::thing($tb, $id) MERGE { details: { reason: \"edited\" } }")
        .bind(("tb", tables::AUDIT_LOG))
        .bind(("id", victim))
        .await
        .unwrap()
        .check()
        .unwrap();

    let (status, _, after) = send(&app, Method::GET, "/api/v1/audit?limit=50", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(after["integrity_valid"], false);
}

#[tokio::test]
async fn login_rate_limit_returns_retry_after() {
    let (app, _state, _db) = gateway().await;

    // 10 per minute from one source; the 11th trips the limiter.
    for n in 0..10 {
        let (status, _, _) = send(
            &app,
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": ADMIN_EMAIL, "password": "wrong-password" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "attempt {n}");
    }

    let (status, _, body) = send(
        &app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": ADMIN_EMAIL, "password": "wrong-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "RATE_LIMIT_EXCEEDED");
    assert!(body["_retry_after"].as_str().is_some());
}

#[tokio::test]
async fn role_gates_enforced() {
    let (app, _state, db) = gateway().await;

    // Create a viewer directly in the store (user management is
    // administrative, not part of the HTTP surface).
    let users = UserStore::new(db.clone());
    let viewer = peanut_auth::User::new(
        "viewer@peanut.local",
        "Viewer",
        hash_password("viewer-password-123").unwrap(),
        Role::Viewer,
    )
    .unwrap();
    users.create(&viewer).await.unwrap();

    let viewer_cookie = login(&app, "viewer@peanut.local", "viewer-password-123").await;

    // Viewers may list but not create.
    let (status, _, _) = send(&app, Method::GET, "/api/v1/agents", Some(&viewer_cookie), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, body) = send(
        &app,
        Method::POST,
        "/api/v1/agents",
        Some(&viewer_cookie),
        Some(json!({
            "name": "forbidden",
            "type": "custom",
            "endpoint": "http://127.0.0.1:9999",
            "model": "m"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    // Audit reads are admin/operator only.
    let (status, _, _) = send(&app, Method::GET, "/api/v1/audit", Some(&viewer_cookie), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Vault config is admin only.
    let (status, _, _) = send(
        &app,
        Method::GET,
        "/api/v1/vault/config",
        Some(&viewer_cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn logout_revokes_the_cookie() {
    let (app, _state, _db) = gateway().await;
    let cookie = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let (status, _, _) = send(&app, Method::POST, "/api/v1/auth/logout", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);

    // The same cookie no longer authenticates.
    let (status, _, body) = send(&app, Method::GET, "/api/v1/auth/me", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn vault_config_lifecycle() {
    let (app, _state, _db) = gateway().await;
    let cookie = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let (status, _, vault_status) = send(
        &app,
        Method::GET,
        "/api/v1/vault/status",
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(vault_status["connected"], false);

    let (status, _, view) = send(
        &app,
        Method::PUT,
        "/api/v1/vault/config",
        Some(&cookie),
        Some(json!({ "api_key": "sk-ant-test-credential", "model": "claude-haiku-4" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{view}");
    assert_eq!(view["has_api_key"], true);
    assert_eq!(view["model"], "claude-haiku-4");

    let (_, _, view) = send(&app, Method::GET, "/api/v1/vault/config", Some(&cookie), None).await;
    assert_eq!(view["has_api_key"], true);
    // The credential itself never appears in any response.
    assert!(view.get("api_key").is_none());
    assert!(view.get("api_key_ciphertext").is_none());

    // Settings changes land on the audit trail.
    let (_, _, audit) = send(
        &app,
        Method::GET,
        "/api/v1/audit?action=settings.updated",
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(audit["total"], 1);
    assert_eq!(audit["entries"][0]["details"]["api_key_rotated"], true);
}

#[tokio::test]
async fn health_endpoint_is_public() {
    let (app, _state, _db) = gateway().await;
    let (status, _, body) = send(&app, Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["uptime_secs"].as_u64().is_some());
}

#[tokio::test]
async fn unknown_agent_update_is_not_found() {
    let (app, _state, _db) = gateway().await;
    let cookie = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let (status, _, body) = send(
        &app,
        Method::PUT,
        "/api/v1/agents/deadbeefdeadbeefdeadbeefdeadbeef",
        Some(&cookie),
        Some(json!({ "weight": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn agent_validation_maps_to_422() {
    let (app, _state, _db) = gateway().await;
    let cookie = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let (status, _, body) = send(
        &app,
        Method::POST,
        "/api/v1/agents",
        Some(&cookie),
        Some(json!({
            "name": "x",
            "type": "custom",
            "endpoint": "http://127.0.0.1:9",
            "model": "m"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}
