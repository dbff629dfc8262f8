//! Application configuration
//!
//! Everything the ledger core needs arrives through environment variables
//! (with a `.env` file honored in development), each with a sane default and
//! a clamp where a bad value could hurt.

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BankConfig {
    pub database_path: String,
    /// Hard upper bound on outstanding debt per account.
    pub debt_ceiling: u64,
    /// Annual interest rate applied to deposits.
    pub annual_rate: f64,
    /// Period of the interest accrual job.
    pub interest_interval: Duration,
    /// Period of the debt reminder job.
    pub reminder_interval: Duration,
    /// Fraction skimmed into the treasury by `apply_tax`.
    pub tax_rate: f64,
    /// Account receiving tax skims.
    pub treasury_account_id: i64,
    /// Operator identity: receives alerts, excluded from debt reminders.
    pub operator_id: i64,
    /// Bound on any single account-store round-trip.
    pub store_timeout: Duration,
}

impl BankConfig {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let database_path =
            env::var("DATABASE_PATH").unwrap_or_else(|_| "./coinbank.db".to_string());

        let debt_ceiling = env::var("DEBT_CEILING")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|&v| v > 0)
            .unwrap_or(1_000_000);

        let annual_rate = env::var("ANNUAL_INTEREST_RATE")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(0.05)
            .clamp(0.0, 1.0);

        let interest_interval_secs = env::var("INTEREST_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(3_600)
            .clamp(60, 86_400);

        let reminder_interval_secs = env::var("REMINDER_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(43_200)
            .clamp(3_600, 7 * 86_400);

        let tax_rate = env::var("TAX_RATE")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(0.4)
            .clamp(0.0, 1.0);

        let treasury_account_id = env::var("TREASURY_ACCOUNT_ID")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(0);

        let operator_id = env::var("OPERATOR_ID")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(0);

        let store_timeout_ms = env::var("STORE_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(2_000)
            .clamp(100, 60_000);

        Self {
            database_path,
            debt_ceiling,
            annual_rate,
            interest_interval: Duration::from_secs(interest_interval_secs),
            reminder_interval: Duration::from_secs(reminder_interval_secs),
            tax_rate,
            treasury_account_id,
            operator_id,
            store_timeout: Duration::from_millis(store_timeout_ms),
        }
    }
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            database_path: "./coinbank.db".to_string(),
            debt_ceiling: 1_000_000,
            annual_rate: 0.05,
            interest_interval: Duration::from_secs(3_600),
            reminder_interval: Duration::from_secs(43_200),
            tax_rate: 0.4,
            treasury_account_id: 0,
            operator_id: 0,
            store_timeout: Duration::from_secs(2),
        }
    }
}
