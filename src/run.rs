//! Server bootstrap: configuration, state, router and graceful shutdown.

use axum::Router;
use axum::http::{HeaderValue, Method};
use dotenvy::dotenv;
use std::net::SocketAddr;
use tower_http::cors;

use crate::config::Config;
use crate::handlers;
use crate::state::AppState;
use crate::util::{SigDown, Telemetry};

/// Starts the storefront server.
///
/// - Loads `.env` variables.
/// - Installs the `tracing` subscriber (and OTLP export with the `telemetry` feature).
/// - Builds the store, identity, provider and gateway clients from the config file.
/// - Serves the HTTP API until SIGTERM or SIGINT.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let telemetry = Telemetry::new()
        .with_name(env!("CARGO_PKG_NAME"))
        .with_version(env!("CARGO_PKG_VERSION"))
        .register();

    let config = Config::load()?;
    let state = AppState::from_config(&config)?;

    let http_endpoints = Router::new()
        .merge(handlers::routes().with_state(state))
        .layer(telemetry.http_tracing())
        .layer(cors_layer(config.cors_origins())?);

    let addr = SocketAddr::new(config.host(), config.port());
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .inspect_err(|e| tracing::error!("Failed to bind to {}: {}", addr, e))?;

    let sig_down = SigDown::try_new()?;
    let axum_cancellation_token = sig_down.cancellation_token();
    let axum_graceful_shutdown = async move { axum_cancellation_token.cancelled().await };
    axum::serve(listener, http_endpoints)
        .with_graceful_shutdown(axum_graceful_shutdown)
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Any origin when none are configured, otherwise exactly the listed ones.
fn cors_layer(origins: &[String]) -> Result<cors::CorsLayer, axum::http::header::InvalidHeaderValue> {
    let allow_origin = if origins.is_empty() {
        cors::AllowOrigin::from(cors::Any)
    } else {
        let origins = origins
            .iter()
            .map(|origin| HeaderValue::from_str(origin))
            .collect::<Result<Vec<_>, _>>()?;
        cors::AllowOrigin::list(origins)
    };
    Ok(cors::CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers(cors::Any))
}
