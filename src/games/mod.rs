//! Games Module - Minigame Callers
//!
//! Thin random-outcome generators over the ledger engine. Each game decides
//! a coin delta and pushes it through `BankEngine::adjust_balance`; none of
//! them touch ledger fields directly. Balance is allowed to go negative on
//! losses, which is the long-standing penalty behavior.
//!
//! Callers provide the RNG so outcomes stay seedable in tests.

pub mod farm;
pub mod roulette;
pub mod slots;

use thiserror::Error;

use crate::bank::BankError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    /// Farm action attempted before the cooldown elapsed.
    #[error("farming available again in {remaining_secs} seconds")]
    Cooldown { remaining_secs: i64 },

    /// The player cannot cover the game's entry requirement.
    #[error("not enough coins to play")]
    NotEnoughCoins,

    #[error("invalid bet")]
    InvalidBet,

    #[error(transparent)]
    Bank(#[from] BankError),
}

pub use farm::{FarmGame, FarmOutcome};
pub use roulette::{RouletteBet, RouletteGame, RouletteOutcome};
pub use slots::{SlotsGame, SlotsOutcome};
