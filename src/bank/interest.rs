//! Interest Accrual Scheduler
//!
//! Once per configured interval, every account with a positive deposit gets
//! compound growth applied. The convention is n = 24 compounding periods per
//! day with t expressed in days, so the exponent for a firing that covers
//! `hours` elapsed hours is exactly `hours`. One bad account never aborts the
//! batch, and a tick that falls behind is skipped rather than replayed, so a
//! given hour is compounded at most once.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::bank::notify::Notifier;
use crate::bank::store::{AccountPatch, AccountStore};
use crate::config::BankConfig;

const PERIODS_PER_DAY: f64 = 24.0;

/// Compound growth for `hours` elapsed hours of a deposit principal.
///
/// `None` signals a numeric failure (non-finite or out-of-range result);
/// callers skip the account and keep the old principal.
pub fn hourly_compound(principal: u64, annual_rate: f64, hours: u32) -> Option<u64> {
    if principal == 0 {
        return Some(0);
    }

    let factor = (1.0 + annual_rate / PERIODS_PER_DAY).powi(hours as i32);
    let amount = principal as f64 * factor;
    if !amount.is_finite() || amount > i64::MAX as f64 {
        return None;
    }

    Some(amount.round().max(0.0) as u64)
}

/// Outcome of one accrual firing.
#[derive(Debug, Default, Clone, Copy)]
pub struct AccrualReport {
    pub examined: usize,
    pub applied: usize,
    pub skipped: usize,
}

pub struct InterestScheduler {
    store: AccountStore,
    notifier: Arc<dyn Notifier>,
    annual_rate: f64,
    period: Duration,
}

impl InterestScheduler {
    pub fn new(store: AccountStore, notifier: Arc<dyn Notifier>, cfg: &BankConfig) -> Self {
        Self {
            store,
            notifier,
            annual_rate: cfg.annual_rate,
            period: cfg.interest_interval,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    /// The first firing lands one full period after start; a boot never
    /// compounds an hour that has not elapsed.
    async fn run(self) {
        let mut interval = interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;

            match self.tick().await {
                Ok(report) => {
                    info!(
                        examined = report.examined,
                        applied = report.applied,
                        skipped = report.skipped,
                        "interest accrual tick"
                    );
                }
                Err(e) => warn!(error = %e, "interest accrual tick failed"),
            }
        }
    }

    /// Apply one hour of compound growth to every earning account.
    pub async fn tick(&self) -> Result<AccrualReport> {
        let accounts = self.store.accounts_with_deposit().await?;
        let mut report = AccrualReport {
            examined: accounts.len(),
            ..Default::default()
        };

        for account in accounts {
            let new_deposit = match hourly_compound(account.deposit, self.annual_rate, 1) {
                Some(amount) => amount,
                None => {
                    warn!(
                        user_id = account.user_id,
                        deposit = account.deposit,
                        "interest computation failed, account skipped"
                    );
                    report.skipped += 1;
                    continue;
                }
            };

            if new_deposit == account.deposit {
                continue;
            }

            let patch = AccountPatch {
                deposit: Some(new_deposit),
                ..Default::default()
            };
            match self
                .store
                .update_versioned(account.user_id, account.version, &patch)
                .await
            {
                Ok(true) => {
                    report.applied += 1;
                    if let Err(e) = self
                        .notifier
                        .notify_operator(&format!(
                            "interest applied to {}: {} -> {}",
                            account.display_name, account.deposit, new_deposit
                        ))
                        .await
                    {
                        warn!(error = %e, "accrual notification failed");
                    }
                }
                Ok(false) => {
                    // Concurrent mutation won; next firing recomputes from
                    // the fresh principal.
                    debug!(user_id = account.user_id, "accrual lost version race");
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!(user_id = account.user_id, error = %e, "accrual write failed");
                    report.skipped += 1;
                }
            }
        }

        Ok(report)
    }
}
