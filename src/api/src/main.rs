//! Arima Kinen 2013 Prediction Dashboard
//!
//! REST API and CLI for the win-probability leaderboard and race history.

mod cli;
mod config;
mod context;
mod error;
mod features;
mod model;
mod routes;
mod scoring;
mod storage;
#[cfg(test)]
mod test_support;
mod types;

use axum::{routing::get, Router};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};
use crate::config::AppConfig;
use crate::context::AppContext;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging (stderr, so CLI output on stdout stays clean)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "arima_dashboard=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Serve { host, port } => run_server(host, port).await,
        Commands::Predict {
            distance,
            grade,
            course,
            track,
            format,
            model,
            features,
        } => cli::run_predict(distance, grade, course, track, format, model, features),
        Commands::History { horse, db, format } => cli::run_history(horse, db, format),
        Commands::Ingest { source, db } => cli::run_ingest(source, db),
    }
}

/// Run the API server.
async fn run_server(host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    // Load configuration
    let mut config = AppConfig::load()?;

    // Override with CLI args
    if let Some(h) = host {
        config.server.host = h;
    }
    if let Some(p) = port {
        config.server.port = p;
    }

    tracing::info!("Configuration loaded");
    tracing::info!("Model path: {}", config.model.path);
    tracing::info!("Feature table: {}", config.data.features_path);
    tracing::info!("Race history database: {}", config.data.db_path);

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);

    // Validate and load everything before accepting requests
    let state = Arc::new(AppContext::init(config)?);

    // Build router
    let app = Router::new()
        .route("/health", get(routes::health))
        .route("/model/info", get(routes::model_info))
        .route("/leaderboard", get(routes::leaderboard))
        .route("/horses/{name}/history", get(routes::history))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    // Start server
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
