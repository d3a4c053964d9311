use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::domain::{Account, Cents};

use super::{
    AccountStore, MIGRATION_001_ACCOUNTS, StoreError, StoreOptions, validate_initial_balance,
    validate_transfer,
};

const ACCOUNT_COLUMNS: &str = "id, name, balance, created_at";

/// Durable account store backed by SQLite.
///
/// Transfers run inside a write transaction whose first statement is the
/// conditional debit, so the database write lock is held before any balance
/// is examined. Lock waits are bounded by SQLite's busy timeout and the pool's
/// acquire timeout, both set from [`StoreOptions::lock_timeout`].
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new store with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database file.
    /// With `create_if_missing`, the file is created when absent.
    pub async fn connect(path: &str, create_if_missing: bool, options: &StoreOptions) -> Result<Self> {
        let connect_options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(create_if_missing)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(options.lock_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(options.max_connections)
            .acquire_timeout(options.lock_timeout)
            .connect_with(connect_options)
            .await
            .with_context(|| format!("Failed to connect to database {}", path))?;

        tracing::debug!(path, max_connections = options.max_connections, "connected to sqlite");
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_ACCOUNTS)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a database (connect, creating the file if needed, then migrate).
    pub async fn init(path: &str, options: &StoreOptions) -> Result<Self> {
        let store = Self::connect(path, true, options).await?;
        store.migrate().await?;
        Ok(store)
    }

    async fn fetch_balance(
        tx: &mut Transaction<'_, Sqlite>,
        name: &str,
    ) -> Result<Option<Cents>, StoreError> {
        let row = sqlx::query("SELECT balance FROM accounts WHERE name = ?")
            .bind(name)
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("fetch balance", e))?;

        row.map(|row| row.try_get::<i64, _>("balance"))
            .transpose()
            .map_err(|e| map_sqlx_error("decode balance", e))
    }

    /// Work out why the conditional debit matched no row.
    /// Runs inside the transfer transaction, so the answer reflects locked state.
    async fn explain_failed_debit(
        tx: &mut Transaction<'_, Sqlite>,
        from: &str,
        to: &str,
        amount: Cents,
    ) -> StoreError {
        let sender_balance = match Self::fetch_balance(tx, from).await {
            Ok(Some(balance)) => balance,
            Ok(None) => return StoreError::AccountNotFound(from.to_string()),
            Err(err) => return err,
        };

        match Self::fetch_balance(tx, to).await {
            Ok(Some(_)) => StoreError::InsufficientBalance {
                account: from.to_string(),
                balance: sender_balance,
                required: amount,
            },
            Ok(None) => StoreError::AccountNotFound(to.to_string()),
            Err(err) => err,
        }
    }

    /// Same as above for the credit leg: either the receiver is missing or
    /// its balance would overflow.
    async fn explain_failed_credit(tx: &mut Transaction<'_, Sqlite>, to: &str) -> StoreError {
        match Self::fetch_balance(tx, to).await {
            Ok(Some(_)) => {
                StoreError::InvalidAmount(format!("Balance of {} would overflow", to))
            }
            Ok(None) => StoreError::AccountNotFound(to.to_string()),
            Err(err) => err,
        }
    }

    async fn rollback(tx: Transaction<'_, Sqlite>) {
        if let Err(err) = tx.rollback().await {
            // The transaction is discarded by SQLite regardless once the connection drops.
            tracing::warn!(error = %err, "failed to roll back transfer");
        }
    }

    fn row_to_account(row: &SqliteRow) -> Result<Account, StoreError> {
        let decode = |e: sqlx::Error| map_sqlx_error("decode account", e);
        let id_str: String = row.try_get("id").map_err(decode)?;
        let created_at_str: String = row.try_get("created_at").map_err(decode)?;

        Ok(Account {
            id: Uuid::parse_str(&id_str).context("Invalid account ID")?,
            name: row.try_get("name").map_err(decode)?,
            balance: row.try_get("balance").map_err(decode)?,
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        })
    }
}

#[async_trait]
impl AccountStore for SqliteStore {
    async fn create(&self, name: &str, initial_balance: Cents) -> Result<Account, StoreError> {
        validate_initial_balance(initial_balance)?;
        let account = Account::new(name, initial_balance);

        sqlx::query(
            r#"
            INSERT INTO accounts (id, name, balance, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(account.id.to_string())
        .bind(&account.name)
        .bind(account.balance)
        .bind(account.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                StoreError::DuplicateAccount(name.to_string())
            }
            e => map_sqlx_error("create account", e),
        })?;

        Ok(account)
    }

    async fn get(&self, name: &str) -> Result<Account, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM accounts WHERE name = ?",
            ACCOUNT_COLUMNS
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch account", e))?;

        match row {
            Some(row) => Self::row_to_account(&row),
            None => Err(StoreError::AccountNotFound(name.to_string())),
        }
    }

    async fn list(&self) -> Result<Vec<Account>, StoreError> {
        // A single statement reads one snapshot, so no half-applied transfer is visible.
        let rows = sqlx::query(&format!(
            "SELECT {} FROM accounts ORDER BY name",
            ACCOUNT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list accounts", e))?;

        rows.iter().map(Self::row_to_account).collect()
    }

    async fn atomic_transfer(
        &self,
        from: &str,
        to: &str,
        amount: Cents,
    ) -> Result<(Account, Account), StoreError> {
        validate_transfer(from, to, amount)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin transfer", e))?;

        // Writing first takes the database write lock before anything is read.
        let debited = sqlx::query(&format!(
            "UPDATE accounts SET balance = balance - ? WHERE name = ? AND balance >= ? RETURNING {}",
            ACCOUNT_COLUMNS
        ))
        .bind(amount)
        .bind(from)
        .bind(amount)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("debit sender", e));

        let debited = match debited {
            Ok(Some(row)) => row,
            Ok(None) => {
                let err = Self::explain_failed_debit(&mut tx, from, to, amount).await;
                Self::rollback(tx).await;
                return Err(err);
            }
            Err(err) => {
                Self::rollback(tx).await;
                return Err(err);
            }
        };

        let credited = sqlx::query(&format!(
            "UPDATE accounts SET balance = balance + ? WHERE name = ? AND balance <= ? RETURNING {}",
            ACCOUNT_COLUMNS
        ))
        .bind(amount)
        .bind(to)
        .bind(Cents::MAX - amount)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("credit receiver", e));

        let credited = match credited {
            Ok(Some(row)) => row,
            Ok(None) => {
                let err = Self::explain_failed_credit(&mut tx, to).await;
                Self::rollback(tx).await;
                return Err(err);
            }
            Err(err) => {
                Self::rollback(tx).await;
                return Err(err);
            }
        };

        let sender = Self::row_to_account(&debited)?;
        let receiver = Self::row_to_account(&credited)?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit transfer", e))?;

        Ok((sender, receiver))
    }
}

/// Translate driver errors into store errors.
/// Lock contention becomes `Timeout` so callers can retry the whole transfer.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolTimedOut => StoreError::Timeout,
        sqlx::Error::PoolClosed => {
            StoreError::Unavailable(format!("{}: connection pool closed", operation))
        }
        sqlx::Error::Io(ref io_err) => {
            StoreError::Unavailable(format!("{}: {}", operation, io_err))
        }
        sqlx::Error::Database(ref db_err) => {
            let code = db_err.code().map(|c| c.into_owned());
            match code.as_deref() {
                // SQLITE_BUSY, SQLITE_LOCKED and their extended codes
                Some("5") | Some("6") | Some("261") | Some("262") | Some("517") => {
                    StoreError::Timeout
                }
                // SQLITE_CANTOPEN
                Some("14") => StoreError::Unavailable(format!(
                    "{}: {}",
                    operation,
                    db_err.message()
                )),
                _ => StoreError::Internal(
                    anyhow::Error::new(err).context(format!("database error in {}", operation)),
                ),
            }
        }
        other => StoreError::Internal(
            anyhow::Error::new(other).context(format!("database error in {}", operation)),
        ),
    }
}
