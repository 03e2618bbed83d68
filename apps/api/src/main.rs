mod config;
mod critique;
mod errors;
mod ingest;
mod llm_client;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::critique::critic::Critic;
use crate::critique::registry::SessionRegistry;
use crate::ingest::Extractor;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Critic API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize LLM client
    let llm = LlmClient::new(&config.gemini_api_key);
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    // Initialize document extraction
    let extractor = Extractor::new(llm.clone());
    if cfg!(feature = "mupdf") {
        info!("PDF backend: mupdf (scanned PDFs are rasterized for OCR)");
    } else {
        info!("PDF backend: text layer only (scanned PDFs cannot be OCR'd)");
    }

    let critic = Arc::new(Critic::new(llm, extractor, config.salary_currency.clone()));
    info!("Salary estimates in {}", config.salary_currency);

    // Build app state
    let state = AppState {
        critic,
        sessions: SessionRegistry::new(),
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the web client has a fixed host

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
