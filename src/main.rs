mod analytics;
mod api;
mod config;
mod error;
mod location;
mod models;
mod observability;
mod session;
mod state;
mod tracking;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::session::storage::FileStorage;
use crate::session::SessionChange;

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    let config = config::Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let storage = Arc::new(FileStorage::new(&config.session_store_path)?);
    let app_state = Arc::new(state::AppState::new(
        config.event_buffer_size,
        config.session_ttl_secs,
        config.public_base_url.clone(),
        storage,
    ));

    app_state.session.restore().await?;

    tokio::spawn(watch_session_changes(app_state.clone()));

    let app = api::rest::router(app_state.clone());

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| error::AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| error::AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn watch_session_changes(state: Arc<state::AppState>) {
    let mut rx = state.session.subscribe();
    while rx.changed().await.is_ok() {
        let change = rx.borrow_and_update().clone();
        match change {
            SessionChange::Expired => {
                state.metrics.sessions_expired_total.inc();
                tracing::warn!("session expired, identity cleared");
            }
            SessionChange::SignedIn(user) => {
                tracing::info!(user_id = %user.id, "session established");
            }
            SessionChange::SignedOut => {
                tracing::info!("session cleared");
            }
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
