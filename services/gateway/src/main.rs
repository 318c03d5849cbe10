mod error;
mod handlers;
mod models;
mod projection_feed;
mod recovery;
mod router;
mod state;

use engine::{Engine, EngineConfig};
use ledger::{Balance, Ledger, MemoryLedger};
use persistence::{EventStore, FileEventStore, FileSnapshotStore, RecoveryService};
use projection::{MemoryOrderRepository, MemoryTradeRepository, Projector};
use router::create_router;
use state::AppState;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt::init();

    let data_dir = PathBuf::from(getenv("DATA_DIR", "./data"));
    let addr = getenv("APP_ADDR", "0.0.0.0:8080");

    tracing::info!(data_dir = %data_dir.display(), "starting matching engine gateway");

    // Persistence plane.
    let event_store: Arc<FileEventStore> = Arc::new(FileEventStore::open(data_dir.join("events"))?);
    let snapshot_store: Arc<FileSnapshotStore> =
        Arc::new(FileSnapshotStore::open(data_dir.join("snapshots"))?);
    let recovery_service = RecoveryService::new(event_store.clone(), snapshot_store.clone());

    // Account ledger, with development accounts seeded before replay.
    let ledger: Arc<dyn Ledger> = Arc::new(MemoryLedger::new());
    bootstrap_test_accounts(ledger.as_ref())?;

    // Engine: attach stores, recover, then start accepting commands.
    let mut engine = Engine::new(EngineConfig::default());
    engine.set_event_store(event_store.clone())?;
    engine.set_snapshot_store(snapshot_store.clone())?;
    recovery::perform_recovery(
        &mut engine,
        ledger.as_ref(),
        event_store.as_ref(),
        &recovery_service,
    )?;
    engine.start();
    let engine = Arc::new(engine);

    // Query-side read models, fed by tailing the event log.
    let order_views = Arc::new(MemoryOrderRepository::new());
    let trade_views = Arc::new(MemoryTradeRepository::new());
    let projector = Projector::new(order_views.clone(), trade_views.clone());
    {
        let event_store = event_store.clone() as Arc<dyn EventStore>;
        let order_views = order_views.clone();
        tokio::task::spawn_blocking(move || {
            projection_feed::run(event_store, projector, order_views)
        });
    }

    let state = AppState {
        engine,
        ledger,
        order_views,
        trade_views,
    };
    let app = create_router(state);

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}

/// Seed development accounts with balances, before any event replay.
fn bootstrap_test_accounts(ledger: &dyn Ledger) -> Result<(), anyhow::Error> {
    // Scale-6 fixed point: 1,000,000 USDT and 100 BTC per account.
    let seeds = [
        ("acc-001", "USDT", 1_000_000_000_000i64),
        ("acc-001", "BTC", 100_000_000),
        ("acc-002", "USDT", 1_000_000_000_000),
        ("acc-002", "BTC", 100_000_000),
    ];
    for (account_id, asset, amount) in seeds {
        ledger.set_balance(account_id, asset, Balance::new(amount, 0))?;
    }
    tracing::info!("test accounts initialized");
    Ok(())
}

fn getenv(key: &str, fallback: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| fallback.to_string())
}
