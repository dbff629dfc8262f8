//! Ledger Engine
//!
//! Balance mutation operations over the account store: deposit, withdraw,
//! borrow, repay, transfer, the generic minigame delta, and the tax skim.
//! Every read-then-write path goes read, validate, compare-and-swap write
//! with a small bounded retry, so concurrent operations on the same account
//! serialize instead of losing updates. Pure deltas ride the store's atomic
//! increment. Store round-trips are bounded by a timeout and surface as
//! `StoreUnavailable`.

use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::bank::error::{BankError, BankResult};
use crate::bank::notify::Notifier;
use crate::bank::store::{Account, AccountPatch, AccountStore};
use crate::config::BankConfig;

/// Attempts before a lost version race is reported as store pressure.
const CAS_RETRIES: u32 = 4;

/// Result of a tax skim: `tax` went to the treasury, `net` stays with the
/// caller for crediting to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaxSplit {
    pub tax: i64,
    pub net: i64,
}

#[derive(Clone)]
pub struct BankEngine {
    store: AccountStore,
    notifier: Arc<dyn Notifier>,
    cfg: BankConfig,
}

impl BankEngine {
    /// Build the engine and make sure the treasury account exists, since the
    /// tax skim credits it through the blind delta path.
    pub async fn new(
        store: AccountStore,
        notifier: Arc<dyn Notifier>,
        cfg: BankConfig,
    ) -> Result<Self> {
        store
            .get_or_create(cfg.treasury_account_id, "treasury")
            .await?;

        Ok(Self {
            store,
            notifier,
            cfg,
        })
    }

    pub fn store(&self) -> &AccountStore {
        &self.store
    }

    pub fn config(&self) -> &BankConfig {
        &self.cfg
    }

    /// Current account snapshot.
    pub async fn account(&self, user_id: i64) -> BankResult<Account> {
        self.load(user_id).await
    }

    /// Move spendable coins into the interest-bearing deposit.
    pub async fn deposit(&self, user_id: i64, amount: i64) -> BankResult<Account> {
        if amount <= 0 {
            return Err(BankError::InvalidAmount);
        }

        let updated = self
            .mutate_versioned(user_id, |account| {
                if amount > account.balance {
                    return Err(BankError::InsufficientBalance);
                }
                Ok(AccountPatch {
                    balance: Some(account.balance - amount),
                    deposit: Some(account.deposit + amount as u64),
                    ..Default::default()
                })
            })
            .await?;

        self.operator_note(&format!(
            "{} moved {} coins into deposit (deposit now {})",
            updated.display_name, amount, updated.deposit
        ))
        .await;

        Ok(updated)
    }

    /// Move coins out of the deposit back into the spendable balance.
    pub async fn withdraw(&self, user_id: i64, amount: i64) -> BankResult<Account> {
        if amount <= 0 {
            return Err(BankError::InvalidAmount);
        }

        let updated = self
            .mutate_versioned(user_id, |account| {
                if amount as u64 > account.deposit {
                    return Err(BankError::InsufficientDeposit);
                }
                Ok(AccountPatch {
                    balance: Some(account.balance + amount),
                    deposit: Some(account.deposit - amount as u64),
                    ..Default::default()
                })
            })
            .await?;

        self.operator_note(&format!(
            "{} withdrew {} coins from deposit (deposit now {})",
            updated.display_name, amount, updated.deposit
        ))
        .await;

        Ok(updated)
    }

    /// Borrow against the debt ceiling.
    pub async fn borrow(&self, user_id: i64, amount: i64) -> BankResult<Account> {
        let ceiling = self.cfg.debt_ceiling;

        let updated = self
            .mutate_versioned(user_id, |account| {
                if account.debt_limit_reached {
                    return Err(BankError::DebtCeilingReached);
                }
                if amount <= 0 || amount as u64 > ceiling - account.debt {
                    return Err(BankError::InvalidAmount);
                }
                let new_debt = account.debt + amount as u64;
                Ok(AccountPatch {
                    balance: Some(account.balance + amount),
                    debt: Some(new_debt),
                    debt_limit_reached: Some(new_debt >= ceiling),
                    ..Default::default()
                })
            })
            .await?;

        self.operator_note(&format!(
            "{} borrowed {} coins (debt now {})",
            updated.display_name, amount, updated.debt
        ))
        .await;

        Ok(updated)
    }

    /// Repay outstanding debt. The applied amount is clamped to the debt;
    /// overpaying settles the debt and costs exactly what was owed.
    pub async fn repay(&self, user_id: i64, amount: i64) -> BankResult<Account> {
        let ceiling = self.cfg.debt_ceiling;

        let updated = self
            .mutate_versioned(user_id, |account| {
                if account.debt == 0 {
                    return Err(BankError::NoDebt);
                }
                if amount <= 0 {
                    return Err(BankError::InvalidAmount);
                }
                if amount > account.balance {
                    return Err(BankError::InsufficientBalance);
                }
                let applied = (amount as u64).min(account.debt);
                let new_debt = account.debt - applied;
                Ok(AccountPatch {
                    balance: Some(account.balance - applied as i64),
                    debt: Some(new_debt),
                    debt_limit_reached: Some(new_debt >= ceiling),
                    ..Default::default()
                })
            })
            .await?;

        self.operator_note(&format!(
            "{} repaid debt (debt now {})",
            updated.display_name, updated.debt
        ))
        .await;

        Ok(updated)
    }

    /// Peer-to-peer transfer. Debits the sender first; if the credit then
    /// fails, the operator is alerted and the caller sees
    /// `ReconciliationRequired` rather than a silent loss.
    pub async fn transfer(
        &self,
        sender_id: i64,
        recipient_id: i64,
        amount: i64,
    ) -> BankResult<Account> {
        if amount <= 0 {
            return Err(BankError::InvalidAmount);
        }

        let recipient = self
            .store_call(self.store.get(recipient_id))
            .await?
            .ok_or(BankError::RecipientNotFound)?;

        let sender = self
            .mutate_versioned(sender_id, |account| {
                if amount > account.balance {
                    return Err(BankError::InsufficientBalance);
                }
                Ok(AccountPatch {
                    balance: Some(account.balance - amount),
                    ..Default::default()
                })
            })
            .await?;

        let credited = match self.store_call(self.store.adjust_balance(recipient_id, amount)).await
        {
            Ok(changed) => changed,
            Err(_) => false,
        };

        if !credited {
            error!(
                sender_id,
                recipient_id, amount, "transfer debited but credit failed"
            );
            self.operator_note(&format!(
                "RECONCILIATION REQUIRED: {} coins debited from {} but not credited to {}",
                amount, sender_id, recipient_id
            ))
            .await;
            return Err(BankError::ReconciliationRequired);
        }

        self.user_note(
            sender_id,
            &format!(
                "You sent {} coins to {}.",
                amount, recipient.display_name
            ),
        )
        .await;
        self.user_note(
            recipient_id,
            &format!("You received {} coins from {}.", amount, sender.display_name),
        )
        .await;
        self.operator_note(&format!(
            "{} transferred {} coins to {}",
            sender.display_name, amount, recipient.display_name
        ))
        .await;

        Ok(sender)
    }

    /// Generic primitive for minigame callers. Any sign, no floor; the caller
    /// has already decided the delta.
    pub async fn adjust_balance(&self, user_id: i64, delta: i64) -> BankResult<Account> {
        let changed = self
            .store_call(self.store.adjust_balance(user_id, delta))
            .await?;
        if !changed {
            return Err(BankError::AccountNotFound);
        }

        self.load(user_id).await
    }

    /// Skim `tax_rate` of `amount` into the treasury; the remainder goes back
    /// to the caller for crediting. Rounding is half-up.
    pub async fn apply_tax(&self, amount: i64, tax_rate: f64) -> BankResult<TaxSplit> {
        if amount <= 0 {
            return Err(BankError::InvalidAmount);
        }

        let tax = round_half_up(amount as f64 * tax_rate).clamp(0, amount);
        if tax > 0 {
            let changed = self
                .store_call(self.store.adjust_balance(self.cfg.treasury_account_id, tax))
                .await?;
            if !changed {
                warn!(
                    treasury = self.cfg.treasury_account_id,
                    "treasury account missing during tax skim"
                );
                return Err(BankError::AccountNotFound);
            }
        }

        Ok(TaxSplit {
            tax,
            net: amount - tax,
        })
    }

    async fn load(&self, user_id: i64) -> BankResult<Account> {
        self.store_call(self.store.get(user_id))
            .await?
            .ok_or(BankError::AccountNotFound)
    }

    /// Read, validate, CAS-write. Validation failures pass straight through;
    /// a lost version race reloads and revalidates against fresh state.
    async fn mutate_versioned<F>(&self, user_id: i64, mut build: F) -> BankResult<Account>
    where
        F: FnMut(&Account) -> BankResult<AccountPatch>,
    {
        for _ in 0..CAS_RETRIES {
            let account = self.load(user_id).await?;
            let patch = build(&account)?;
            let applied = self
                .store_call(self.store.update_versioned(user_id, account.version, &patch))
                .await?;
            if applied {
                return Ok(merge(account, &patch));
            }
        }

        warn!(user_id, "account update kept losing the version race");
        Err(BankError::StoreUnavailable)
    }

    async fn store_call<T, F>(&self, fut: F) -> BankResult<T>
    where
        F: Future<Output = Result<T>>,
    {
        match timeout(self.cfg.store_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                warn!(error = %e, "account store error");
                Err(BankError::StoreUnavailable)
            }
            Err(_) => {
                warn!("account store call timed out");
                Err(BankError::StoreUnavailable)
            }
        }
    }

    async fn operator_note(&self, text: &str) {
        if let Err(e) = self.notifier.notify_operator(text).await {
            warn!(error = %e, "operator notification failed");
        }
    }

    async fn user_note(&self, user_id: i64, text: &str) {
        if let Err(e) = self.notifier.notify(user_id, text).await {
            info!(user_id, error = %e, "user notification failed");
        }
    }
}

fn merge(mut account: Account, patch: &AccountPatch) -> Account {
    if let Some(balance) = patch.balance {
        account.balance = balance;
    }
    if let Some(deposit) = patch.deposit {
        account.deposit = deposit;
    }
    if let Some(debt) = patch.debt {
        account.debt = debt;
    }
    if let Some(flag) = patch.debt_limit_reached {
        account.debt_limit_reached = flag;
    }
    if let Some(ref name) = patch.display_name {
        account.display_name = name.clone();
    }
    if let Some(t) = patch.last_farm_time {
        account.last_farm_time = t;
    }
    account.version += 1;
    account
}

/// Half-up rounding for a non-negative product.
fn round_half_up(x: f64) -> i64 {
    (x + 0.5).floor() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::notify::{RecordingNotifier, Target};

    async fn engine_with_notifier() -> (BankEngine, Arc<RecordingNotifier>) {
        let store = AccountStore::in_memory().unwrap();
        let notifier = Arc::new(RecordingNotifier::new());
        let cfg = BankConfig::default();
        let engine = BankEngine::new(store, notifier.clone(), cfg).await.unwrap();
        (engine, notifier)
    }

    async fn seed(engine: &BankEngine, user_id: i64, name: &str, balance: i64) {
        engine.store().get_or_create(user_id, name).await.unwrap();
        if balance != 0 {
            engine
                .store()
                .adjust_balance(user_id, balance)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn deposit_then_withdraw_round_trips() {
        let (engine, _) = engine_with_notifier().await;
        seed(&engine, 1, "alice", 1_000).await;

        let after = engine.deposit(1, 400).await.unwrap();
        assert_eq!(after.balance, 600);
        assert_eq!(after.deposit, 400);

        let after = engine.withdraw(1, 150).await.unwrap();
        assert_eq!(after.balance, 750);
        assert_eq!(after.deposit, 250);
    }

    #[tokio::test]
    async fn deposit_rejects_bad_amounts() {
        let (engine, _) = engine_with_notifier().await;
        seed(&engine, 1, "alice", 100).await;

        assert_eq!(engine.deposit(1, 0).await, Err(BankError::InvalidAmount));
        assert_eq!(engine.deposit(1, -5).await, Err(BankError::InvalidAmount));
        assert_eq!(
            engine.deposit(1, 101).await,
            Err(BankError::InsufficientBalance)
        );
        assert_eq!(
            engine.withdraw(1, 1).await,
            Err(BankError::InsufficientDeposit)
        );

        let account = engine.account(1).await.unwrap();
        assert_eq!(account.balance, 100);
        assert_eq!(account.deposit, 0);
    }

    #[tokio::test]
    async fn borrow_repay_round_trip_restores_state() {
        let (engine, _) = engine_with_notifier().await;
        seed(&engine, 2, "bob", 50).await;

        let before = engine.account(2).await.unwrap();
        engine.borrow(2, 300).await.unwrap();
        let after = engine.repay(2, 300).await.unwrap();

        assert_eq!(after.balance, before.balance);
        assert_eq!(after.debt, before.debt);
        assert!(!after.debt_limit_reached);
    }

    #[tokio::test]
    async fn debt_flag_tracks_ceiling_exactly() {
        let (engine, _) = engine_with_notifier().await;
        let ceiling = engine.config().debt_ceiling as i64;
        seed(&engine, 3, "carol", 0).await;

        let maxed = engine.borrow(3, ceiling).await.unwrap();
        assert_eq!(maxed.debt, ceiling as u64);
        assert!(maxed.debt_limit_reached);

        // Further borrowing is gated by the flag.
        assert_eq!(
            engine.borrow(3, 1).await,
            Err(BankError::DebtCeilingReached)
        );

        // Repaying a single coin drops back under the ceiling.
        let eased = engine.repay(3, 1).await.unwrap();
        assert!(!eased.debt_limit_reached);
        assert_eq!(eased.debt, ceiling as u64 - 1);
    }

    #[tokio::test]
    async fn borrow_over_remaining_limit_is_rejected_unchanged() {
        let (engine, _) = engine_with_notifier().await;
        seed(&engine, 4, "dave", 0).await;
        engine.borrow(4, 900_000).await.unwrap();

        assert_eq!(engine.borrow(4, 200_000).await, Err(BankError::InvalidAmount));

        let account = engine.account(4).await.unwrap();
        assert_eq!(account.debt, 900_000);
        assert_eq!(account.balance, 900_000);
        assert!(!account.debt_limit_reached);
    }

    #[tokio::test]
    async fn repay_clamps_to_outstanding_debt() {
        // The concrete scenario: 1000 coins, deposit 400, borrow 500,
        // repay 700 which clamps to 500.
        let (engine, _) = engine_with_notifier().await;
        seed(&engine, 1000, "eve", 1_000).await;

        let a = engine.deposit(1000, 400).await.unwrap();
        assert_eq!((a.balance, a.deposit), (600, 400));

        let a = engine.borrow(1000, 500).await.unwrap();
        assert_eq!((a.balance, a.debt), (1_100, 500));

        let a = engine.repay(1000, 700).await.unwrap();
        assert_eq!((a.balance, a.debt), (600, 0));
    }

    #[tokio::test]
    async fn repay_guards_fire_in_order() {
        let (engine, _) = engine_with_notifier().await;
        seed(&engine, 5, "frank", 10).await;

        assert_eq!(engine.repay(5, 10).await, Err(BankError::NoDebt));

        engine.borrow(5, 100).await.unwrap();
        assert_eq!(engine.repay(5, 0).await, Err(BankError::InvalidAmount));
        assert_eq!(
            engine.repay(5, 200).await,
            Err(BankError::InsufficientBalance)
        );
    }

    #[tokio::test]
    async fn transfer_conserves_total_balance() {
        let (engine, notifier) = engine_with_notifier().await;
        seed(&engine, 10, "sender", 800).await;
        seed(&engine, 11, "recipient", 25).await;

        let sender = engine.transfer(10, 11, 300).await.unwrap();
        let recipient = engine.account(11).await.unwrap();

        assert_eq!(sender.balance, 500);
        assert_eq!(recipient.balance, 325);
        assert_eq!(sender.balance + recipient.balance, 800 + 25);

        // Both parties were told.
        assert_eq!(notifier.sent_to(10).len(), 1);
        assert_eq!(notifier.sent_to(11).len(), 1);
    }

    #[tokio::test]
    async fn transfer_rejects_missing_recipient_and_short_balance() {
        let (engine, _) = engine_with_notifier().await;
        seed(&engine, 10, "sender", 100).await;

        assert_eq!(
            engine.transfer(10, 999, 50).await,
            Err(BankError::RecipientNotFound)
        );

        seed(&engine, 11, "recipient", 0).await;
        assert_eq!(
            engine.transfer(10, 11, 101).await,
            Err(BankError::InsufficientBalance)
        );
        assert_eq!(
            engine.transfer(10, 11, 0).await,
            Err(BankError::InvalidAmount)
        );

        assert_eq!(engine.account(10).await.unwrap().balance, 100);
        assert_eq!(engine.account(11).await.unwrap().balance, 0);
    }

    #[tokio::test]
    async fn concurrent_withdraws_cannot_overdraw() {
        let (engine, _) = engine_with_notifier().await;
        seed(&engine, 20, "racer", 500).await;
        engine.deposit(20, 500).await.unwrap();

        let (a, b) = tokio::join!(engine.withdraw(20, 400), engine.withdraw(20, 400));

        let outcomes = [a, b];
        let wins = outcomes.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1);
        assert!(outcomes
            .iter()
            .any(|r| *r == Err(BankError::InsufficientDeposit)));

        let account = engine.account(20).await.unwrap();
        assert_eq!(account.deposit, 100);
    }

    #[tokio::test]
    async fn adjust_balance_has_no_floor() {
        let (engine, _) = engine_with_notifier().await;
        seed(&engine, 30, "gambler", 5).await;

        let account = engine.adjust_balance(30, -25).await.unwrap();
        assert_eq!(account.balance, -20);

        assert_eq!(
            engine.adjust_balance(404, 10).await,
            Err(BankError::AccountNotFound)
        );
    }

    #[tokio::test]
    async fn tax_skim_credits_treasury_exactly() {
        let (engine, _) = engine_with_notifier().await;
        let treasury = engine.config().treasury_account_id;
        let before = engine.account(treasury).await.unwrap().balance;

        let split = engine.apply_tax(1_000, 0.4).await.unwrap();
        assert_eq!(split, TaxSplit { tax: 400, net: 600 });

        let after = engine.account(treasury).await.unwrap().balance;
        assert_eq!(after - before, 400);
    }

    #[tokio::test]
    async fn tax_rounds_half_up() {
        let (engine, _) = engine_with_notifier().await;

        // 5 * 0.5 = 2.5 rounds up, not to even.
        let split = engine.apply_tax(5, 0.5).await.unwrap();
        assert_eq!((split.tax, split.net), (3, 2));

        // A skim that rounds to zero still succeeds.
        let split = engine.apply_tax(1, 0.4).await.unwrap();
        assert_eq!((split.tax, split.net), (0, 1));

        assert_eq!(engine.apply_tax(0, 0.4).await, Err(BankError::InvalidAmount));
    }

    #[tokio::test]
    async fn operator_hears_about_every_mutation() {
        let (engine, notifier) = engine_with_notifier().await;
        seed(&engine, 40, "loud", 1_000).await;

        engine.deposit(40, 100).await.unwrap();
        engine.withdraw(40, 50).await.unwrap();
        engine.borrow(40, 10).await.unwrap();
        engine.repay(40, 10).await.unwrap();

        assert_eq!(notifier.operator_messages().len(), 4);
        assert!(notifier
            .sent()
            .iter()
            .all(|(t, _)| *t == Target::Operator));
    }
}
