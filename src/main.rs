//! aurum-gateway server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use aurum_gateway::adapters::RelayClient;
use aurum_gateway::api;
use aurum_gateway::app_state::AppState;
use aurum_gateway::config::{GatewayConfig, LogFormat};
use aurum_gateway::domain::{EventBus, WalletAddress};
use aurum_gateway::persistence::{
    MemoryDirectory, MemoryEscrowStore, MemoryLedgerStore, PostgresStore,
};
use aurum_gateway::ports::{
    EscrowStore, LedgerStore, LiquidityVenue, PriceReference, RecipientDirectory, SignerProvider,
};
use aurum_gateway::service::{
    GiftService, LedgerReconciler, QuoteBook, QuoteEngine, TradeService, TransactionExecutor,
};

struct Stores {
    ledger: Arc<dyn LedgerStore>,
    escrows: Arc<dyn EscrowStore>,
    directory: Arc<dyn RecipientDirectory>,
}

async fn open_stores(config: &GatewayConfig) -> anyhow::Result<Stores> {
    if !config.persistence_enabled {
        tracing::warn!("persistence disabled; holdings live in memory only");
        return Ok(Stores {
            ledger: Arc::new(MemoryLedgerStore::new()),
            escrows: Arc::new(MemoryEscrowStore::new()),
            directory: Arc::new(MemoryDirectory::new()),
        });
    }
    let store = PostgresStore::connect(
        &config.database_url,
        config.database_max_connections,
        config.database_min_connections,
        Duration::from_secs(config.database_connect_timeout_secs),
    )
    .await
    .context("connecting to PostgreSQL")?;
    tracing::info!("PostgreSQL connected and migrated");
    let store = Arc::new(store);
    Ok(Stores {
        ledger: Arc::clone(&store) as Arc<dyn LedgerStore>,
        escrows: Arc::clone(&store) as Arc<dyn EscrowStore>,
        directory: store,
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GatewayConfig::from_env().map_err(|e| anyhow::anyhow!("configuration: {e}"))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }

    tracing::info!(addr = %config.listen_addr, relay = %config.chain_relay_url, "starting aurum-gateway");

    let events = EventBus::new(config.event_bus_capacity);
    let stores = open_stores(&config).await?;

    let relay = Arc::new(
        RelayClient::new(
            &config.chain_relay_url,
            WalletAddress::new(config.venue_spender.clone()),
            config.executor.send_timeout,
        )
        .context("building relay client")?,
    );
    let venue: Arc<dyn LiquidityVenue> = Arc::clone(&relay) as Arc<dyn LiquidityVenue>;
    let prices: Arc<dyn PriceReference> = Arc::clone(&relay) as Arc<dyn PriceReference>;
    let signers: Arc<dyn SignerProvider> = relay;

    let engine = Arc::new(QuoteEngine::new(
        Arc::clone(&venue),
        Arc::clone(&prices),
        config.quote,
    ));
    let executor = Arc::new(TransactionExecutor::new(
        venue,
        events.clone(),
        config.executor,
    ));
    let reconciler = Arc::new(LedgerReconciler::new(
        stores.ledger,
        events.clone(),
        config.ledger,
    ));

    let trade = Arc::new(TradeService::new(
        engine,
        Arc::new(QuoteBook::new()),
        executor,
        Arc::clone(&reconciler),
        signers,
        Arc::clone(&prices),
    ));
    let gifts = Arc::new(GiftService::new(
        reconciler,
        stores.escrows,
        stores.directory,
        prices,
        events.clone(),
        config.gift,
    ));

    let app = api::app(AppState {
        trade,
        gifts,
        events,
    });

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
