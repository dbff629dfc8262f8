//! CoinBank - virtual-currency ledger service
//!
//! Wires the account store, ledger engine, and the two background jobs
//! (interest accrual, debt reminders), then idles until shutdown. Chat
//! transport is attached externally through the library API.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use coinbank_backend::bank::{
    AccountStore, BankEngine, DebtReminderScheduler, InterestScheduler, LogNotifier, Notifier,
};
use coinbank_backend::config::BankConfig;

#[derive(Parser, Debug)]
#[command(name = "coinbank", about = "Virtual-currency ledger service")]
struct Args {
    /// Path to the SQLite account store
    #[arg(long, env = "DATABASE_PATH")]
    db_path: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = Args::parse();
    let mut cfg = BankConfig::from_env();
    if let Some(db_path) = args.db_path {
        cfg.database_path = db_path;
    }

    info!(db = %cfg.database_path, "🏦 starting coinbank ledger service");

    let store = AccountStore::new(&cfg.database_path)?;
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier::new(cfg.operator_id));
    let engine = BankEngine::new(store.clone(), notifier.clone(), cfg.clone()).await?;

    let treasury = engine.account(cfg.treasury_account_id).await?;
    info!(balance = treasury.balance, "treasury account ready");

    let interest = InterestScheduler::new(store.clone(), notifier.clone(), &cfg).spawn();
    let reminders = DebtReminderScheduler::new(store, notifier, &cfg).spawn();
    info!(
        interest_secs = cfg.interest_interval.as_secs(),
        reminder_secs = cfg.reminder_interval.as_secs(),
        "schedulers running"
    );

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    interest.abort();
    reminders.abort();

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coinbank_backend=info,coinbank=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
