//! European roulette with color and straight-number bets.

use rand::Rng;

use crate::bank::BankEngine;
use crate::games::GameError;

const RED_NUMBERS: [u8; 18] = [
    1, 3, 5, 7, 9, 12, 14, 16, 18, 19, 21, 23, 25, 27, 30, 32, 34, 36,
];

/// Straight-number payout multiplier.
const STRAIGHT_PAYOUT: i64 = 35;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouletteBet {
    Red,
    Black,
    Number(u8),
}

pub struct RouletteGame {
    engine: BankEngine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouletteOutcome {
    pub result: u8,
    pub delta: i64,
    pub balance: i64,
}

impl RouletteGame {
    pub fn new(engine: BankEngine) -> Self {
        Self { engine }
    }

    /// Spin the wheel against a bet. Color bets pay 1:1, a straight number
    /// pays 35:1, zero is the house's pocket.
    pub async fn play<R: Rng>(
        &self,
        user_id: i64,
        bet_amount: i64,
        bet: RouletteBet,
        rng: &mut R,
    ) -> Result<RouletteOutcome, GameError> {
        if bet_amount <= 0 {
            return Err(GameError::InvalidBet);
        }
        if let RouletteBet::Number(n) = bet {
            if n > 36 {
                return Err(GameError::InvalidBet);
            }
        }

        let account = self.engine.account(user_id).await?;
        if account.balance <= 0 || bet_amount > account.balance {
            return Err(GameError::NotEnoughCoins);
        }

        let result = rng.gen_range(0..=36u8);

        let won = match bet {
            RouletteBet::Red => result != 0 && RED_NUMBERS.contains(&result),
            RouletteBet::Black => result != 0 && !RED_NUMBERS.contains(&result),
            RouletteBet::Number(n) => n == result,
        };
        let delta = match (bet, won) {
            (RouletteBet::Number(_), true) => bet_amount * STRAIGHT_PAYOUT,
            (_, true) => bet_amount,
            (_, false) => -bet_amount,
        };

        let updated = self.engine.adjust_balance(user_id, delta).await?;

        Ok(RouletteOutcome {
            result,
            delta,
            balance: updated.balance,
        })
    }
}
