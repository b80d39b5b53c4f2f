mod config;
mod errors;
mod generation;
mod jobs;
mod llm_client;
mod notify;
mod render;
mod routes;
mod state;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::jobs::manager::JobManager;
use crate::jobs::pipeline::Pipeline;
use crate::jobs::queue::JobQueue;
use crate::llm_client::LlmClient;
use crate::notify::SmtpNotifier;
use crate::render::LatexCompiler;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars or input files)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Tailor API v{}", env!("CARGO_PKG_VERSION"));

    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.output_dir.display()))?;

    // Initialize LLM client
    let llm = LlmClient::new(&config)?;
    info!("LLM client initialized (model: {})", llm.model());

    if config.smtp.credentials().is_none() {
        info!("GMAIL_USER/GMAIL_PASSWORD not set, result emails are disabled");
    }

    let pipeline = Arc::new(Pipeline::new(
        Arc::new(llm),
        Arc::new(LatexCompiler::new(config.latex_compiler.clone())),
        Arc::new(SmtpNotifier::new(config.smtp.clone())),
        config.output_dir.clone(),
        config.generation_concurrency,
    ));

    let jobs = JobManager::new();
    let queue = JobQueue::start(
        pipeline,
        jobs.clone(),
        config.job_workers,
        config.job_queue_capacity,
    );

    // Build app state
    let state = AppState {
        config: config.clone(),
        jobs,
        queue: queue.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped, draining queued jobs");
    queue.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        // Without a signal handler we never shut down on our own.
        std::future::pending::<()>().await;
    }
}
