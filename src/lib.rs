//! CoinBank Backend Library
//!
//! Virtual-currency ledger for a chat bot: accounts, deposits with compound
//! interest, borrowing against a debt ceiling, peer-to-peer transfers, and
//! the minigames that feed coin deltas into the ledger. The chat transport
//! itself lives outside this crate and drives the engine through this API.

pub mod bank;
pub mod config;
pub mod games;

pub use bank::{BankEngine, BankError};
pub use config::BankConfig;
