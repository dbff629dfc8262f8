//! Debt Reminder Scheduler
//!
//! On a coarse interval, every account with outstanding debt (except the
//! operator) gets a reminder naming the amount owed. Pure read and notify;
//! nothing in the ledger is mutated, so a skipped or repeated firing is
//! harmless.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::bank::notify::Notifier;
use crate::bank::store::AccountStore;
use crate::config::BankConfig;

pub struct DebtReminderScheduler {
    store: AccountStore,
    notifier: Arc<dyn Notifier>,
    operator_id: i64,
    period: Duration,
}

impl DebtReminderScheduler {
    pub fn new(store: AccountStore, notifier: Arc<dyn Notifier>, cfg: &BankConfig) -> Self {
        Self {
            store,
            notifier,
            operator_id: cfg.operator_id,
            period: cfg.reminder_interval,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn run(self) {
        let mut interval = interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;

            match self.tick().await {
                Ok(reminded) => info!(reminded, "debt reminder tick"),
                Err(e) => warn!(error = %e, "debt reminder tick failed"),
            }
        }
    }

    /// Remind every debtor once. Returns how many reminders went out.
    pub async fn tick(&self) -> Result<usize> {
        let debtors = self.store.debtors(self.operator_id).await?;
        let mut reminded = 0;

        for debtor in &debtors {
            let text = format!(
                "Dear {}, your outstanding debt currently stands at {} coins. \
                 Please settle it promptly using /repay.",
                debtor.display_name, debtor.debt
            );

            if let Err(e) = self.notifier.notify(debtor.user_id, &text).await {
                warn!(user_id = debtor.user_id, error = %e, "debt reminder delivery failed");
                continue;
            }
            reminded += 1;

            if let Err(e) = self
                .notifier
                .notify_operator(&format!("sent debt reminder to {}", debtor.display_name))
                .await
            {
                warn!(error = %e, "operator reminder note failed");
            }
        }

        Ok(reminded)
    }
}
