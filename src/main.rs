//! Hybrid CLOB Engine — Entry Point
//!
//! Initializes configuration, logging, persistence, and the HTTP API.
//! Runs until SIGINT/SIGTERM.
//!
//! Wiring sequence:
//! 1. Load config.toml + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Open the trade journal + book snapshot store, restore the book
//! 4. Build the EIP-712 verifier for the configured signing domain
//! 5. Wire use cases (depth, planner, fills, cancel, intake)
//! 6. Spawn the periodic book snapshot task
//! 7. Serve the API (+ /live /ready /metrics) until shutdown
//! 8. Drain, take a final snapshot, exit

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{info, warn};

mod adapters;
mod config;
mod domain;
mod ports;
mod usecases;

use adapters::api::{AppState, EngineDomain, router};
use adapters::chain::Eip712Verifier;
use adapters::metrics::{HealthState, MetricsRegistry};
use adapters::persistence::{BookSnapshotStore, InMemoryOrderStore, TradeJournal};
use usecases::{CancelService, DepthAggregator, ExecutionPlanner, FillApplier, OrderIntake};

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration from config.toml ──────────────
    let config = config::loader::load_config("config.toml")
        .context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new(&config.service.log_level)
                }),
        )
        .json()
        .init();

    info!(
        name = %config.service.name,
        version = env!("CARGO_PKG_VERSION"),
        chain_id = config.engine.chain_id,
        contract = %config.engine.verifying_contract,
        "Starting hybrid CLOB engine"
    );

    let verifying_contract: alloy::primitives::Address = config
        .engine
        .verifying_contract
        .parse()
        .context("Invalid verifying contract address")?;

    // ── 3. Persistence: journal, snapshots, book restore ────
    let journal = TradeJournal::new(&config.persistence.data_dir)
        .await
        .context("Failed to open trade journal")?;
    let snapshots = Arc::new(
        BookSnapshotStore::new(&config.persistence.data_dir)
            .await
            .context("Failed to open snapshot store")?,
    );

    // Replay the journal before attaching it: the (tx, log) dedup set
    // must survive restarts or reconciliation would double-apply.
    let journaled_trades = journal
        .load_all()
        .await
        .context("Failed to replay trade journal")?;

    let store = Arc::new(InMemoryOrderStore::new().with_journal(journal));
    store.import_trades(journaled_trades).await;
    if let Some(snapshot) = snapshots.load().await.context("Failed to load book snapshot")? {
        store.import_orders(snapshot.orders).await;
    }

    // ── 4. EIP-712 verifier for the configured domain ───────
    let verifier = Arc::new(Eip712Verifier::new(
        &config.engine.domain_name,
        &config.engine.domain_version,
        config.engine.chain_id,
        verifying_contract,
    ));

    // ── 5. Use cases + shared handler state ─────────────────
    let metrics = Arc::new(MetricsRegistry::new().context("Failed to register metrics")?);
    let health = Arc::new(HealthState::new());

    let state = AppState {
        store: Arc::clone(&store),
        depth: DepthAggregator::new(Arc::clone(&store)),
        planner: ExecutionPlanner::new(Arc::clone(&store)),
        fills: FillApplier::new(Arc::clone(&store), config.limits.max_fill_retries),
        cancels: CancelService::new(Arc::clone(&store), Arc::clone(&verifier)),
        intake: OrderIntake::new(
            Arc::clone(&store),
            Arc::clone(&verifier),
            config.engine.chain_id,
            verifying_contract,
        ),
        metrics,
        health: Arc::clone(&health),
        domain: EngineDomain {
            chain_id: config.engine.chain_id,
            verifying_contract,
            max_depth_levels: config.limits.max_depth_levels,
            max_reconcile_batch: config.limits.max_reconcile_batch,
        },
    };

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // ── 6. Periodic book snapshot task ──────────────────────
    if config.persistence.snapshot_interval_secs > 0 {
        let store = Arc::clone(&store);
        let snapshots = Arc::clone(&snapshots);
        let health = Arc::clone(&health);
        let mut shutdown_rx = shutdown_tx.subscribe();
        let interval = std::time::Duration::from_secs(config.persistence.snapshot_interval_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let orders = store.export_orders().await;
                        match snapshots.save(orders).await {
                            Ok(()) => health.set_store_healthy(true),
                            Err(e) => {
                                warn!(error = %e, "Periodic book snapshot failed");
                                health.set_store_healthy(false);
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
        });
    }

    // ── 7. Serve the API until SIGINT/SIGTERM ───────────────
    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(address = %addr, "Engine API listening");

    let drain_health = Arc::clone(&health);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            drain_health.start_drain();
            info!("Shutdown signal received, draining");
        })
        .await
        .context("API server failed")?;

    // ── 8. Final snapshot and exit ──────────────────────────
    let _ = shutdown_tx.send(());
    let orders = store.export_orders().await;
    snapshots
        .save(orders)
        .await
        .context("Final book snapshot failed")?;
    info!("Engine stopped cleanly");

    Ok(())
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
