//! CloakX Relay
//!
//! Bridges the on-chain job registry and the secure compute enclave.
//!
//! Architecture:
//! - Configuration: Load settings from environment (and `.env`)
//! - Repositories: Postgres cursor/job stores, ledger JSON-RPC, enclave HTTP
//! - Services: Job ingestion, training pipeline, result encoding
//! - Scheduler: One event poller loop per tracked event type, plus the
//!   pipeline worker
//! - API: Health and operator endpoints
//!
//! The relay follows the registry's event log, records every new job, runs
//! it through the enclave and submits the signed result back on-chain.

mod api;
mod config;
mod db;
mod repository;
mod scheduler;
mod service;

use anyhow::{Context, Result};
use cloakx_core::domain::event::{EventFilter, JOB_CREATED_EVENT};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::{AppState, HealthState};
use crate::config::Config;
use crate::repository::{
    ComputeRepository, CursorRepository, HttpComputeRepository, JobRepository, LedgerRepository,
    OperatorKey, PgCursorRepository, PgJobRepository, SuiLedgerRepository,
};
use crate::scheduler::{EventPoller, EventTracker, PipelineDispatcher, PipelineWorker};
use crate::service::{JobCreatedHandler, TrainingPipeline};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cloakx_relay=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CloakX Relay");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    info!(
        "Loaded configuration: rpc={}, enclave={}, package={}::{}",
        config.sui_rpc_url, config.nautilus_url, config.contract.package_id, config.contract.module
    );

    // Storage
    let pool = connect_with_retry(&config.database_url).await?;
    db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let jobs: Arc<dyn JobRepository> = Arc::new(PgJobRepository::new(pool.clone()));
    let cursors: Arc<dyn CursorRepository> = Arc::new(PgCursorRepository::new(pool));

    // External systems
    let operator = OperatorKey::from_base64(&config.admin_private_key)
        .context("Failed to parse ADMIN_PRIVATE_KEY")?;
    info!("Operator address: {}", operator.address());

    let ledger: Arc<dyn LedgerRepository> = Arc::new(SuiLedgerRepository::new(
        config.sui_rpc_url.clone(),
        config.contract.clone(),
        operator,
        config.gas_budget,
    ));
    let compute: Arc<dyn ComputeRepository> =
        Arc::new(HttpComputeRepository::new(config.nautilus_url.clone()));

    // Pipeline worker
    let pipeline = Arc::new(TrainingPipeline::new(
        Arc::clone(&jobs),
        Arc::clone(&ledger),
        compute,
    ));
    let (dispatcher, queue) = PipelineDispatcher::new(config.pipeline_queue_depth);
    let worker = tokio::spawn(PipelineWorker::new(pipeline, queue).run());

    // HTTP surface
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (reset_tx, reset_rx) = watch::channel(0u64);
    let health = HealthState::new();
    let app = api::create_router(AppState {
        jobs: Arc::clone(&jobs),
        cursors: Arc::clone(&cursors),
        health: health.clone(),
        cursor_reset: Arc::new(reset_tx),
    });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;
    info!("Listening on {}", config.bind_addr);

    let server = {
        let mut shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown.wait_for(|stop| *stop).await;
                })
                .await;
            if let Err(e) = result {
                error!("HTTP server error: {}", e);
            }
        })
    };

    // Jobs stored but never started by a previous run
    let handler = Arc::new(JobCreatedHandler::new(Arc::clone(&jobs), dispatcher));
    let resumed = handler.resume_pending().await?;
    if resumed > 0 {
        info!("Resumed {} pending job(s)", resumed);
    }

    // Pollers
    let poller = Arc::new(
        EventPoller::new(
            ledger,
            cursors,
            config.poll_interval,
            config.event_page_size,
        )
        .with_reset_signal(reset_rx),
    );

    let trackers = vec![EventTracker {
        event_type: JOB_CREATED_EVENT.to_string(),
        filter: EventFilter::MoveEventModule {
            package: config.contract.package_id.clone(),
            module: config.contract.module.clone(),
        },
        handler: handler.clone(),
    }];

    let mut loops = Vec::with_capacity(trackers.len());
    for tracker in trackers {
        let cursor = match poller.load_cursor(&tracker).await {
            Ok(cursor) => cursor,
            Err(e) => {
                health.mark_unhealthy(format!("{:#}", e));
                return Err(e);
            }
        };

        let poller = Arc::clone(&poller);
        let shutdown = shutdown_rx.clone();
        loops.push(tokio::spawn(async move {
            poller.run_from(tracker, cursor, shutdown).await
        }));
    }

    health.mark_healthy();
    info!("Relay initialized successfully ({} poller(s))", loops.len());

    wait_for_shutdown().await;
    info!("Shutdown requested, finishing in-flight work");
    let _ = shutdown_tx.send(true);

    for handle in loops {
        if let Err(e) = handle.await {
            warn!("Poller task panicked: {}", e);
        }
    }

    // Dropping the last dispatcher stops the worker
    drop(handler);
    drop(poller);
    if let Err(e) = worker.await {
        warn!("Pipeline worker panicked: {}", e);
    }
    if let Err(e) = server.await {
        warn!("HTTP server task panicked: {}", e);
    }

    info!("CloakX Relay stopped");
    Ok(())
}

/// Connects to the database with exponential backoff
///
/// The database may not be ready yet when the relay starts (common in
/// container environments).
async fn connect_with_retry(database_url: &str) -> Result<PgPool> {
    const MAX_RETRIES: u32 = 10;
    const INITIAL_DELAY_MS: u64 = 500;
    const MAX_DELAY_MS: u64 = 30_000;

    let mut attempt = 0;
    let mut delay_ms = INITIAL_DELAY_MS;

    loop {
        attempt += 1;

        match db::create_pool(database_url).await {
            Ok(pool) => {
                info!("Database connection pool created");
                return Ok(pool);
            }
            Err(e) => {
                if attempt >= MAX_RETRIES {
                    return Err(e).context(format!(
                        "Failed to connect to database after {} attempts",
                        MAX_RETRIES
                    ));
                }

                warn!(
                    "Failed to connect to database (attempt {}/{}): {}",
                    attempt, MAX_RETRIES, e
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;

                // Exponential backoff with cap
                delay_ms = (delay_ms * 2).min(MAX_DELAY_MS);
            }
        }
    }
}

/// Resolves on SIGINT or SIGTERM
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
