//! Booking API server.
//!
//! Loads `.env`, the policy and the inventory seed, installs the Prometheus exporter
//! and serves the booking API until Ctrl+C or SIGTERM.
//!
//! ```bash
//! INVENTORY_SEED=seed/inventory.json cargo run --bin server
//! ```

use anyhow::Context;
use booking_core::environment::SystemClock;
use booking_core::Utc;
use booking_core::{BookingEngine, InMemoryBookingStore, InMemoryInventory, InventorySeed};
use booking_web::{AppState, Config, build_router};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.server.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting booking server...");

    let metrics_addr: SocketAddr = config
        .server
        .metrics_address()
        .parse()
        .context("invalid METRICS_HOST/METRICS_PORT")?;
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .context("failed to install Prometheus exporter")?;
    booking_core::metrics::register_booking_metrics();
    tracing::info!(%metrics_addr, "✓ Prometheus metrics available");

    let seed_json = tokio::fs::read_to_string(&config.inventory_seed)
        .await
        .with_context(|| format!("cannot read inventory seed {}", config.inventory_seed))?;
    let seed = InventorySeed::from_json(&seed_json).context("invalid inventory seed")?;
    let inventory = Arc::new(InMemoryInventory::from_seed(seed));
    tracing::info!(
        seed = %config.inventory_seed,
        resources = inventory.resource_count().await,
        "✓ Inventory loaded"
    );

    let engine = BookingEngine::new(
        config.policy.clone(),
        inventory.clone(),
        Arc::new(InMemoryBookingStore::new()),
        Arc::new(SystemClock),
    )
    .context("invalid booking policy")?;
    tracing::info!(
        discount_bps = config.policy.bundle_discount_bps,
        tax_bps = config.policy.tax_rate_bps,
        free_window_hours = config.policy.free_window_hours,
        mid_window_hours = config.policy.mid_window_hours,
        "✓ Engine initialized"
    );

    let state = AppState::new(engine);
    let housekeeper = tokio::spawn(housekeeping(
        Arc::clone(&state.engine),
        inventory,
        Duration::from_secs(config.server.housekeeping_interval),
    ));

    let app = build_router(state);
    let address = config.server.address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("cannot bind {address}"))?;
    tracing::info!(%address, "🏨 Booking API listening");

    let (stop_tx, mut stop_rx) = tokio::sync::watch::channel(());
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop_rx.changed().await;
            })
            .await
    });

    shutdown_signal().await;
    tracing::info!("Shutting down gracefully...");
    housekeeper.abort();
    let _ = stop_tx.send(());

    let grace = Duration::from_secs(config.server.shutdown_timeout);
    match tokio::time::timeout(grace, server).await {
        Ok(Ok(Ok(()))) => tracing::info!("Graceful shutdown complete"),
        Ok(Ok(Err(error))) => tracing::error!(%error, "server stopped with an error"),
        Ok(Err(error)) => tracing::error!(%error, "server task failed"),
        Err(_) => tracing::warn!(?grace, "in-flight requests did not finish in time"),
    }
    Ok(())
}

/// Periodically drops finished capacity holds and retries queued compensations.
async fn housekeeping(
    engine: Arc<BookingEngine>,
    inventory: Arc<InMemoryInventory>,
    every: Duration,
) {
    let mut tick = tokio::time::interval(every);
    loop {
        tick.tick().await;

        let pruned = inventory.prune_before(Utc::now().date_naive()).await;
        if pruned > 0 {
            tracing::info!(pruned, "finished capacity holds pruned");
        }

        if engine.pending_compensations() > 0 {
            match engine.reconcile().await {
                Ok(pending) => tracing::info!(pending, "compensations retried"),
                Err(error) => tracing::warn!(%error, "compensations still failing"),
            }
        }
    }
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::error!(%error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
