// region:    --- Imports
use guild_dkp_service::clock::{Clock, SystemClock};
use guild_dkp_service::config::Config;
use guild_dkp_service::database::DatabaseManager;
use guild_dkp_service::economy::Economy;
use guild_dkp_service::guild::MemoryGuildDirectory;
use guild_dkp_service::handlers;
use guild_dkp_service::ledger::{DkpLedger, MemoryLedger, PgLedger};
use guild_dkp_service::scheduler::SettlementScheduler;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
// endregion: --- Imports

// region:    --- Main
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .with_target(false)
        .init();

    let config = Config::from_env()?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Ledger: Postgres when configured, memory otherwise
    let ledger: Arc<dyn DkpLedger> = match &config.database_url {
        Some(url) => {
            let db_manager = Arc::new(DatabaseManager::connect(url, config.db_max_connections).await?);
            if let Err(e) = db_manager.initialize_database().await {
                error!("{:<12} --> schema initialization failed: {:?}", "Main", e);
                return Err(e.into());
            }
            info!("{:<12} --> Postgres ledger ready", "Main");
            if config.dkp_seed.is_some() {
                warn!(
                    "{:<12} --> DKP_SEED ignored: balances already persist in Postgres",
                    "Main"
                );
            }
            Arc::new(PgLedger::new(db_manager, Arc::clone(&clock)))
        }
        None => {
            let ledger = MemoryLedger::new(Arc::clone(&clock));
            for seed in config.load_balance_seed()? {
                if seed.balance > 0 {
                    ledger.credit(seed.member_id, seed.balance, "seed").await?;
                }
            }
            info!("{:<12} --> in-memory ledger ready", "Main");
            Arc::new(ledger)
        }
    };

    let guilds = config.load_guilds()?;
    info!("{:<12} --> {} guild(s) loaded", "Main", guilds.len());
    let directory = Arc::new(MemoryGuildDirectory::from_records(guilds));

    let economy = Arc::new(Economy::new(clock, ledger, directory));

    let scheduler =
        SettlementScheduler::new(Arc::clone(&economy.auctions), config.settlement_interval);
    scheduler.start();

    let routes_all = handlers::router(economy);

    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(
        "{:<12} --> Web Server: Listening on {}",
        "Main",
        listener.local_addr()?
    );

    if let Err(err) = axum::serve(listener, routes_all.into_make_service()).await {
        error!("{:<12} --> Server error: {}", "Main", err);
    }
    Ok(())
}
// endregion: --- Main
