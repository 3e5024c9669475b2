mod bootstrap;
mod error;
mod health;
mod licenses;
mod negotiate;

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::Router;
use soundchain_core::config::{AppConfig, LoadOptions};
use tokio::sync::Notify;

use crate::bootstrap::AppState;

fn init_logging(config: &AppConfig) {
    use soundchain_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(health::router(state.clone()))
        .merge(negotiate::router(state))
        .merge(licenses::router())
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let state = bootstrap::bootstrap(config)?;
    let address = format!("{}:{}", state.config.server.bind_address, state.config.server.port);
    let grace = Duration::from_secs(state.config.server.graceful_shutdown_secs);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "soundchain-server started"
    );

    let shutdown = Arc::new(Notify::new());
    let server = axum::serve(listener, app(state)).with_graceful_shutdown({
        let shutdown = shutdown.clone();
        async move { shutdown.notified().await }
    });
    let mut serving = tokio::spawn(server.into_future());

    tokio::select! {
        joined = &mut serving => return Ok(joined??),
        signal = wait_for_shutdown() => signal?,
    }

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        grace_secs = grace.as_secs(),
        "soundchain-server stopping"
    );
    shutdown.notify_one();

    match tokio::time::timeout(grace, serving).await {
        Ok(joined) => joined??,
        Err(_) => tracing::warn!(
            event_name = "system.server.shutdown_timeout",
            correlation_id = "shutdown",
            "in-flight requests did not finish before the grace period"
        ),
    }

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use soundchain_core::config::AppConfig;
    use tower::ServiceExt;

    use crate::app;
    use crate::bootstrap::{AppState, Backends};

    #[tokio::test]
    async fn app_serves_health_alongside_api_routes() {
        let response = app(AppState::new(AppConfig::default(), Backends::default()))
            .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
            .await
            .expect("router should respond");

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body should read");
        let payload: Value = serde_json::from_slice(&bytes).expect("body should be json");
        assert_eq!(payload["status"], "healthy");
        assert!(payload["checkedAt"].is_string());
    }

    #[tokio::test]
    async fn unknown_routes_are_not_found() {
        let response = app(AppState::new(AppConfig::default(), Backends::default()))
            .oneshot(Request::builder().uri("/api/mint").body(Body::empty()).expect("request"))
            .await
            .expect("router should respond");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
