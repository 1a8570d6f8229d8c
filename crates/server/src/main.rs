use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use depot_core::broker::MemoryBroker;
use depot_core::deposit::{DepositStore, SqliteDepositStore};
use depot_core::jobs::StepSequencer;
use depot_core::notify::{event_channel, LoggingNotifier};
use depot_core::{load_config, validate_config, PipelineRuntime};

use depot_server::{create_router, jobs, AppState};

/// Buffer size for the deposit event channel
const EVENT_BUFFER_SIZE: usize = 1000;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("DEPOT_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);
    info!(
        "Admission gate capacity: {}",
        config.orchestrator.max_concurrent_deposits
    );

    // Create SQLite deposit store
    let store: Arc<dyn DepositStore> = Arc::new(
        SqliteDepositStore::new(&config.database.path)
            .context("Failed to create deposit store")?,
    );
    info!("Deposit store initialized");

    // In-process broker carrying operation, job and control messages
    let broker = MemoryBroker::new();

    // Deposit event channel; the consumer just logs the envelopes
    let (events, mut events_rx) = event_channel(EVENT_BUFFER_SIZE);
    let events_task = tokio::spawn(async move {
        while let Some(envelope) = events_rx.recv().await {
            info!(timestamp = %envelope.timestamp, event = ?envelope.event, "deposit event");
        }
    });

    // Wire the pipeline
    let sequencer = Arc::new(StepSequencer::new(
        jobs::pipeline_steps(),
        Arc::clone(&store),
    ));
    let runtime = PipelineRuntime::new(
        Arc::clone(&store),
        broker.clone(),
        Arc::new(jobs::job_registry()),
        sequencer,
        Arc::new(LoggingNotifier),
        events,
        config.orchestrator.clone(),
    );
    runtime.start().await;
    info!("Deposit pipeline started");

    // Create app state
    let app_state = Arc::new(AppState::new(
        config.clone(),
        Arc::clone(&store),
        broker.clone(),
        runtime.controller(),
        runtime.switch(),
    ));

    // Create router
    let app = create_router(app_state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Stop the pipeline before closing the event channel
    info!("Server shutting down...");
    runtime.shutdown().await;
    drop(runtime);
    let _ = events_task.await;
    info!("Deposit pipeline stopped");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
