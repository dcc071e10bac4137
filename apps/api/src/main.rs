mod chat;
mod config;
mod cv;
mod email;
mod errors;
mod llm_client;
mod rate_limit;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::cv::extract::PdfTextExtractor;
use crate::cv::store::ResumeStore;
use crate::email::notifier::SmtpNotifier;
use crate::email::templates::EmailTemplates;
use crate::llm_client::LlmClient;
use crate::rate_limit::{spawn_sweeper, RateLimiters};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting resume chat v{}", env!("CARGO_PKG_VERSION"));

    let store = ResumeStore::new(config.cv_dir.clone());
    info!("Resume store at {}", store.root().display());

    let llm = LlmClient::new(&config.llm)?;
    if config.llm.api_key.is_none() {
        tracing::warn!("LLM_API_KEY is not set; chat requests will fail until it is");
    }
    info!("LLM client initialized (model: {})", llm.model());

    let notifier = SmtpNotifier::from_config(config.smtp.as_ref())?;
    if !notifier.is_enabled() {
        info!("SMTP not configured; email notifications disabled");
    }
    let templates = EmailTemplates::new()?;

    let limits = config.rate_limits;
    let limiters = RateLimiters::new(limits.chat(), limits.upload(), limits.list(), limits.email());
    let sweepers: Vec<_> = limiters.all().into_iter().map(spawn_sweeper).collect();
    info!(
        "Rate limits per {:?}: chat={} upload={} list={} email={}",
        limits.window, limits.chat, limits.upload, limits.list, limits.email
    );

    let state = AppState {
        config: config.clone(),
        store,
        extractor: Arc::new(PdfTextExtractor),
        answerer: Arc::new(llm),
        notifier: Arc::new(notifier),
        templates: Arc::new(templates),
        limiters,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the web UI has a fixed host

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    for sweeper in sweepers {
        sweeper.abort();
    }
    info!("Shut down");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
