//! Three-reel slot machine.

use rand::Rng;

use crate::bank::BankEngine;
use crate::games::GameError;

const REEL_SYMBOLS: [&str; 8] = ["🍒", "🍋", "🍊", "🍉", "🍇", "🍓", "🍍", "🍑"];

pub struct SlotsGame {
    engine: BankEngine,
    win_chance: f64,
    jackpot_chance: f64,
    jackpot_coins: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotsOutcome {
    pub reels: [&'static str; 3],
    pub delta: i64,
    pub balance: i64,
}

impl SlotsGame {
    pub fn new(engine: BankEngine) -> Self {
        Self {
            engine,
            win_chance: 0.2,
            jackpot_chance: 0.05,
            jackpot_coins: 250,
        }
    }

    /// Spin the reels. Playing needs a positive balance; a loss may still
    /// push the balance negative.
    pub async fn spin<R: Rng>(&self, user_id: i64, rng: &mut R) -> Result<SlotsOutcome, GameError> {
        let account = self.engine.account(user_id).await?;
        if account.balance <= 0 {
            return Err(GameError::NotEnoughCoins);
        }

        let mut reels = [
            Self::symbol(rng),
            Self::symbol(rng),
            Self::symbol(rng),
        ];
        if rng.gen::<f64>() < self.win_chance {
            let forced = Self::symbol(rng);
            reels = [forced, forced, forced];
        }

        let delta = if reels[0] == reels[1] && reels[1] == reels[2] {
            if rng.gen::<f64>() < self.jackpot_chance {
                self.jackpot_coins
            } else {
                rng.gen_range(15..=40)
            }
        } else {
            -rng.gen_range(10..=25)
        };

        let updated = self.engine.adjust_balance(user_id, delta).await?;

        Ok(SlotsOutcome {
            reels,
            delta,
            balance: updated.balance,
        })
    }

    fn symbol<R: Rng>(rng: &mut R) -> &'static str {
        REEL_SYMBOLS[rng.gen_range(0..REEL_SYMBOLS.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::{AccountStore, RecordingNotifier};
    use crate::config::BankConfig;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::sync::Arc;

    async fn slots_with_balance(balance: i64) -> SlotsGame {
        let store = AccountStore::in_memory().unwrap();
        let engine = BankEngine::new(
            store,
            Arc::new(RecordingNotifier::new()),
            BankConfig::default(),
        )
        .await
        .unwrap();
        engine.store().get_or_create(1, "spinner").await.unwrap();
        if balance != 0 {
            engine.store().adjust_balance(1, balance).await.unwrap();
        }
        SlotsGame::new(engine)
    }

    #[tokio::test]
    async fn broke_players_cannot_spin() {
        let game = slots_with_balance(0).await;
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        let err = game.spin(1, &mut rng).await.unwrap_err();
        assert_eq!(err, GameError::NotEnoughCoins);
    }

    #[tokio::test]
    async fn payout_matches_the_reels() {
        let game = slots_with_balance(10_000).await;
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut balance = 10_000;

        for _ in 0..50 {
            let outcome = game.spin(1, &mut rng).await.unwrap();

            let triple = outcome.reels[0] == outcome.reels[1]
                && outcome.reels[1] == outcome.reels[2];
            if triple {
                assert!(
                    outcome.delta == 250 || (15..=40).contains(&outcome.delta),
                    "unexpected win {}",
                    outcome.delta
                );
            } else {
                assert!((-25..=-10).contains(&outcome.delta));
            }

            balance += outcome.delta;
            assert_eq!(outcome.balance, balance);
        }
    }

    #[tokio::test]
    async fn losses_may_go_below_zero() {
        let game = slots_with_balance(1).await;
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        // Keep the balance pinned at one coin until the first loss; that
        // loss must be allowed to push it negative.
        let mut saw_loss = false;
        for _ in 0..50 {
            let outcome = game.spin(1, &mut rng).await.unwrap();
            if outcome.delta < 0 {
                assert!(outcome.balance < 0);
                saw_loss = true;
                break;
            }
            game.engine
                .adjust_balance(1, 1 - outcome.balance)
                .await
                .unwrap();
        }
        assert!(saw_loss);
    }
}
