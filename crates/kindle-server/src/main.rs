mod config;

use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use kindle_api::routes;
use kindle_api::state::{AppState, AppStateInner};

use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "kindle=debug,kindle_api=debug,kindle_db=debug,kindle_scoring=debug,\
                 tower_http=debug"
                    .into()
            }),
        )
        .init();

    let config = ServerConfig::from_env()?;

    // Init database
    let db = kindle_db::Database::open(&config.db_path)?;

    info!(
        "Scoring policy: duplicate window {}, min content {} chars, volume saturation {} messages",
        config.policy.duplicate_window,
        config.policy.min_content_chars,
        config.policy.volume_saturation,
    );

    let state: AppState = Arc::new(AppStateInner::new(db, config.jwt_secret, config.policy));

    let app = routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!("Kindle server listening on {}", config.addr);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
