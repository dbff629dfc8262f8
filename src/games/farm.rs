//! Cooldown-gated coin farming.

use rand::Rng;
use tracing::warn;

use crate::bank::{AccountPatch, BankEngine, BankError};
use crate::games::GameError;

pub struct FarmGame {
    engine: BankEngine,
    cooldown_secs: i64,
    rare_coins: i64,
    rare_chance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FarmOutcome {
    pub coins: i64,
    pub rare: bool,
    pub balance: i64,
}

impl FarmGame {
    pub fn new(engine: BankEngine) -> Self {
        Self {
            engine,
            cooldown_secs: 3_600,
            rare_coins: 50,
            rare_chance: 0.1,
        }
    }

    /// Farm coins once per cooldown window. `now` is unix seconds supplied by
    /// the caller.
    pub async fn farm<R: Rng>(
        &self,
        user_id: i64,
        now: i64,
        rng: &mut R,
    ) -> Result<FarmOutcome, GameError> {
        let account = self.engine.account(user_id).await?;

        let elapsed = now - account.last_farm_time;
        if elapsed < self.cooldown_secs {
            return Err(GameError::Cooldown {
                remaining_secs: self.cooldown_secs - elapsed,
            });
        }

        let (coins, rare) = if rng.gen::<f64>() < self.rare_chance {
            (self.rare_coins, true)
        } else {
            (rng.gen_range(5..=30), false)
        };

        let updated = self.engine.adjust_balance(user_id, coins).await?;

        let stamped = self
            .engine
            .store()
            .upsert(
                user_id,
                &AccountPatch {
                    last_farm_time: Some(now),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| {
                warn!(user_id, error = %e, "failed to stamp farm cooldown");
                GameError::Bank(BankError::StoreUnavailable)
            })?;
        if !stamped {
            return Err(GameError::Bank(BankError::AccountNotFound));
        }

        Ok(FarmOutcome {
            coins,
            rare,
            balance: updated.balance,
        })
    }
}
