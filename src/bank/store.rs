//! Account Store
//!
//! One row per user with SQLite persistence. The ledger engine drives this
//! store through point reads, field-level partial updates, predicate scans,
//! an atomic balance delta, and a versioned compare-and-swap write. Partial
//! updates only touch the fields a patch names, so concurrent writers can
//! never clobber fields they did not intend to change.

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Per-user ledger record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub user_id: i64,
    pub display_name: String,
    /// Spendable coins. Signed, no enforced floor.
    pub balance: i64,
    /// Interest-bearing sub-balance.
    pub deposit: u64,
    /// Outstanding borrowed amount.
    pub debt: u64,
    /// True iff `debt` has hit the configured ceiling.
    pub debt_limit_reached: bool,
    /// Unix seconds of the last successful farm action.
    pub last_farm_time: i64,
    /// Optimistic-concurrency counter, bumped on every write.
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Field-level partial update. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct AccountPatch {
    pub balance: Option<i64>,
    pub deposit: Option<u64>,
    pub debt: Option<u64>,
    pub debt_limit_reached: Option<bool>,
    pub display_name: Option<String>,
    pub last_farm_time: Option<i64>,
}

impl AccountPatch {
    fn is_empty(&self) -> bool {
        self.balance.is_none()
            && self.deposit.is_none()
            && self.debt.is_none()
            && self.debt_limit_reached.is_none()
            && self.display_name.is_none()
            && self.last_farm_time.is_none()
    }
}

/// SQLite-backed account store.
#[derive(Clone)]
pub struct AccountStore {
    conn: Arc<Mutex<Connection>>,
}

const ACCOUNT_COLUMNS: &str = "user_id, display_name, balance, deposit, debt, \
     debt_limit_reached, last_farm_time, version, created_at, updated_at";

impl AccountStore {
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).context("open account store")?;
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory store for tests.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory account store")?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS accounts (
                user_id INTEGER PRIMARY KEY,
                display_name TEXT NOT NULL,
                balance INTEGER NOT NULL DEFAULT 0,
                deposit INTEGER NOT NULL DEFAULT 0,
                debt INTEGER NOT NULL DEFAULT 0,
                debt_limit_reached INTEGER NOT NULL DEFAULT 0,
                last_farm_time INTEGER NOT NULL DEFAULT 0,
                version INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_accounts_deposit ON accounts(deposit)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_accounts_debt ON accounts(debt)",
            [],
        )?;

        Ok(())
    }

    fn map_account(row: &Row<'_>) -> rusqlite::Result<Account> {
        Ok(Account {
            user_id: row.get(0)?,
            display_name: row.get(1)?,
            balance: row.get(2)?,
            deposit: row.get::<_, i64>(3)?.max(0) as u64,
            debt: row.get::<_, i64>(4)?.max(0) as u64,
            debt_limit_reached: row.get::<_, i64>(5)? == 1,
            last_farm_time: row.get(6)?,
            version: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    /// Point read by user id.
    pub async fn get(&self, user_id: i64) -> Result<Option<Account>> {
        let conn = self.conn.lock().await;
        let account = conn
            .query_row(
                &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE user_id = ?1"),
                params![user_id],
                Self::map_account,
            )
            .optional()
            .context("read account")?;

        Ok(account)
    }

    /// Fetch an account, creating it with zeroed fields on first interaction.
    pub async fn get_or_create(&self, user_id: i64, display_name: &str) -> Result<Account> {
        let conn = self.conn.lock().await;
        let existing = conn
            .query_row(
                &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE user_id = ?1"),
                params![user_id],
                Self::map_account,
            )
            .optional()
            .context("read account")?;

        if let Some(account) = existing {
            return Ok(account);
        }

        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO accounts (user_id, display_name, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![user_id, display_name, &now, &now],
        )
        .context("create account")?;

        Ok(Account {
            user_id,
            display_name: display_name.to_string(),
            balance: 0,
            deposit: 0,
            debt: 0,
            debt_limit_reached: false,
            last_farm_time: 0,
            version: 0,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Unconditional partial update. Returns false when the account is missing.
    pub async fn upsert(&self, user_id: i64, patch: &AccountPatch) -> Result<bool> {
        let conn = self.conn.lock().await;
        Self::apply_patch(&conn, user_id, None, patch)
    }

    /// Compare-and-swap partial update: applied only when the stored version
    /// still matches `expected_version`. Returns false on conflict or when
    /// the account is missing.
    pub async fn update_versioned(
        &self,
        user_id: i64,
        expected_version: i64,
        patch: &AccountPatch,
    ) -> Result<bool> {
        let conn = self.conn.lock().await;
        Self::apply_patch(&conn, user_id, Some(expected_version), patch)
    }

    fn apply_patch(
        conn: &Connection,
        user_id: i64,
        expected_version: Option<i64>,
        patch: &AccountPatch,
    ) -> Result<bool> {
        if patch.is_empty() {
            return Ok(true);
        }

        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(balance) = patch.balance {
            sets.push("balance = ?");
            values.push(Value::Integer(balance));
        }
        if let Some(deposit) = patch.deposit {
            sets.push("deposit = ?");
            values.push(Value::Integer(deposit as i64));
        }
        if let Some(debt) = patch.debt {
            sets.push("debt = ?");
            values.push(Value::Integer(debt as i64));
        }
        if let Some(flag) = patch.debt_limit_reached {
            sets.push("debt_limit_reached = ?");
            values.push(Value::Integer(flag as i64));
        }
        if let Some(ref name) = patch.display_name {
            sets.push("display_name = ?");
            values.push(Value::Text(name.clone()));
        }
        if let Some(t) = patch.last_farm_time {
            sets.push("last_farm_time = ?");
            values.push(Value::Integer(t));
        }

        sets.push("version = version + 1");
        sets.push("updated_at = ?");
        values.push(Value::Text(Utc::now().to_rfc3339()));

        let mut sql = format!("UPDATE accounts SET {} WHERE user_id = ?", sets.join(", "));
        values.push(Value::Integer(user_id));

        if let Some(version) = expected_version {
            sql.push_str(" AND version = ?");
            values.push(Value::Integer(version));
        }

        let changed = conn
            .execute(&sql, params_from_iter(values.iter()))
            .context("update account")?;

        Ok(changed == 1)
    }

    /// Atomic increment of the spendable balance. The whole read-modify-write
    /// happens inside SQLite, so concurrent deltas never lose updates.
    /// Returns false when the account is missing.
    pub async fn adjust_balance(&self, user_id: i64, delta: i64) -> Result<bool> {
        let conn = self.conn.lock().await;
        let changed = conn
            .execute(
                "UPDATE accounts
                 SET balance = balance + ?1, version = version + 1, updated_at = ?2
                 WHERE user_id = ?3",
                params![delta, Utc::now().to_rfc3339(), user_id],
            )
            .context("adjust balance")?;

        Ok(changed == 1)
    }

    /// All accounts currently earning interest.
    pub async fn accounts_with_deposit(&self) -> Result<Vec<Account>> {
        self.scan("deposit > 0", vec![]).await
    }

    /// All accounts with outstanding debt, excluding the given identity.
    pub async fn debtors(&self, exclude_user_id: i64) -> Result<Vec<Account>> {
        self.scan(
            "debt > 0 AND user_id != ?1",
            vec![Value::Integer(exclude_user_id)],
        )
        .await
    }

    async fn scan(&self, predicate: &str, params: Vec<Value>) -> Result<Vec<Account>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE {predicate} ORDER BY user_id"
        ))?;

        let accounts = stmt
            .query_map(params_from_iter(params.iter()), Self::map_account)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("scan accounts")?;

        Ok(accounts)
    }
}
