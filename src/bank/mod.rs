//! Bank Module - Virtual-Currency Ledger & Accrual Engine
//!
//! This module handles:
//! 1. Balance mutation operations (deposit, withdraw, borrow, repay,
//!    transfer, minigame deltas, tax skim)
//! 2. The periodic compound-interest job on deposits
//! 3. The debt-limit state machine and periodic debt reminders
//!
//! Architecture:
//! - Accounts live in a SQLite-backed store with versioned writes
//! - The engine validates invariants and commits via compare-and-swap
//! - Schedulers are independent spawned tasks over the same store

pub mod engine;
pub mod error;
pub mod interest;
pub mod notify;
pub mod reminder;
pub mod store;

pub use engine::{BankEngine, TaxSplit};
pub use error::{BankError, BankResult};
pub use interest::{hourly_compound, AccrualReport, InterestScheduler};
pub use notify::{LogNotifier, Notifier, RecordingNotifier};
pub use reminder::DebtReminderScheduler;
pub use store::{Account, AccountPatch, AccountStore};
