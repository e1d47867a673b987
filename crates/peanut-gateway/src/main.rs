//! The Peanut gateway daemon.

use anyhow::Context;
use peanut_agents::HttpBackend;
use peanut_config::GatewayConfig;
use peanut_gateway::{cors_layer, router, spawn_health_sweep, AppState};
use peanut_storage::Database;
use peanut_telemetry::{setup_logging, LogConfig, LogFormat};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GatewayConfig::from_env().context("configuration")?;

    setup_logging(
        &LogConfig::new(config.log_level.clone()).with_format(LogFormat::Pretty),
    )
    .context("logging")?;

    let data_path = config.data_dir.join("gateway");
    let db = Database::connect_embedded(&data_path.to_string_lossy())
        .await
        .context("storage")?;

    let backend = Arc::new(HttpBackend::new()?);
    let state = AppState::new(
        &db,
        &config.session_secret,
        &config.vault_key_hex,
        config.environment.secure_cookies(),
        backend,
    )?;

    state
        .auth
        .seed_admin(config.default_admin_password.as_deref())
        .await?;

    let sweep = spawn_health_sweep(state.orchestrator.clone());

    let app = router(state)
        .layer(cors_layer(&config.cors_origins))
        .into_make_service_with_connect_info::<SocketAddr>();

    let addr = SocketAddr::from(([0, 0, 0, 0], config.listen_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "peanut gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server")?;

    sweep.abort();
    info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::error!("failed to install ctrl-c handler");
        std::future::pending::<()>().await;
    }
}
