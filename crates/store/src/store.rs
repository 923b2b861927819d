//! SQLite-backed position store.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS positions (
    market_id TEXT PRIMARY KEY,
    yes_token TEXT NOT NULL,
    no_token TEXT NOT NULL,
    yes_filled TEXT NOT NULL DEFAULT '0',
    no_filled TEXT NOT NULL DEFAULT '0',
    cost_basis_yes TEXT NOT NULL DEFAULT '0',
    cost_basis_no TEXT NOT NULL DEFAULT '0',
    entry_time TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'OPEN'
);

CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ts TEXT NOT NULL,
    type TEXT NOT NULL,
    payload TEXT NOT NULL
);
";

/// Lifecycle status of a position row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionStatus {
    /// Position is live; counts toward the exposure cap.
    Open,
    /// Closed before resolution (hedged out or cancelled).
    Closed,
    /// Hedge sell fired on a one-sided fill.
    Hedged,
    /// Market resolved and the position was settled.
    Settled,
}

impl PositionStatus {
    /// Stable string form used in the `status` column.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Closed => "CLOSED",
            Self::Hedged => "HEDGED",
            Self::Settled => "SETTLED",
        }
    }

    /// Parses a `status` column value. Unknown strings map to
    /// `Closed` so a foreign row can never resurrect as live exposure.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "OPEN" => Self::Open,
            "HEDGED" => Self::Hedged,
            "SETTLED" => Self::Settled,
            _ => Self::Closed,
        }
    }
}

/// One position row.
#[derive(Debug, Clone)]
pub struct PositionRow {
    /// Market identifier (primary key).
    pub market_id: String,
    /// YES leg token id.
    pub yes_token: String,
    /// NO leg token id.
    pub no_token: String,
    /// Filled YES shares.
    pub yes_filled: Decimal,
    /// Filled NO shares.
    pub no_filled: Decimal,
    /// Dollars spent on the YES leg.
    pub cost_basis_yes: Decimal,
    /// Dollars spent on the NO leg.
    pub cost_basis_no: Decimal,
    /// When the position was opened.
    pub entry_time: DateTime<Utc>,
    /// Lifecycle status.
    pub status: PositionStatus,
}

/// Durable ledger of positions plus an append-only audit trail.
#[derive(Debug, Clone)]
pub struct PositionStore {
    pool: SqlitePool,
}

impl PositionStore {
    /// Opens (creating if missing) the ledger at `path` and ensures
    /// the schema exists.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or the schema
    /// cannot be created.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("opening position store")?;

        sqlx::query(SCHEMA).execute(&pool).await?;
        debug!(path = %path.as_ref().display(), "position store ready");

        Ok(Self { pool })
    }

    /// Creates an OPEN row for `market_id`.
    ///
    /// Callers must ensure at most one concurrent open per market; the
    /// store does not arbitrate races beyond the primary key.
    ///
    /// # Errors
    /// Returns an error if the insert fails (including a duplicate
    /// `market_id`).
    #[allow(clippy::too_many_arguments)]
    pub async fn open_position(
        &self,
        market_id: &str,
        yes_token: &str,
        no_token: &str,
        yes_filled: Decimal,
        no_filled: Decimal,
        cost_basis_yes: Decimal,
        cost_basis_no: Decimal,
    ) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO positions
                (market_id, yes_token, no_token, yes_filled, no_filled,
                 cost_basis_yes, cost_basis_no, entry_time, status)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'OPEN')
            ",
        )
        .bind(market_id)
        .bind(yes_token)
        .bind(no_token)
        .bind(yes_filled.to_string())
        .bind(no_filled.to_string())
        .bind(cost_basis_yes.to_string())
        .bind(cost_basis_no.to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Updates fill sizes and cost bases of the OPEN row for
    /// `market_id`. Rows in any other status are left untouched.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn update_fills(
        &self,
        market_id: &str,
        yes_filled: Decimal,
        no_filled: Decimal,
        cost_basis_yes: Decimal,
        cost_basis_no: Decimal,
    ) -> Result<()> {
        sqlx::query(
            r"
            UPDATE positions
            SET yes_filled = ?2, no_filled = ?3,
                cost_basis_yes = ?4, cost_basis_no = ?5
            WHERE market_id = ?1 AND status = 'OPEN'
            ",
        )
        .bind(market_id)
        .bind(yes_filled.to_string())
        .bind(no_filled.to_string())
        .bind(cost_basis_yes.to_string())
        .bind(cost_basis_no.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Transitions the OPEN row for `market_id` to `status`.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn update_status(&self, market_id: &str, status: PositionStatus) -> Result<()> {
        sqlx::query(
            r"UPDATE positions SET status = ?2 WHERE market_id = ?1 AND status = 'OPEN'",
        )
        .bind(market_id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Number of distinct markets with an OPEN position. Backs the
    /// engine's exposure cap.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn count_open_markets(&self) -> Result<u32> {
        let row = sqlx::query(
            r"SELECT COUNT(DISTINCT market_id) AS n FROM positions WHERE status = 'OPEN'",
        )
        .fetch_one(&self.pool)
        .await?;
        let n: i64 = row.try_get("n")?;
        Ok(u32::try_from(n).unwrap_or(u32::MAX))
    }

    /// All OPEN positions, for the settlement sweep.
    ///
    /// # Errors
    /// Returns an error if the query fails or a row cannot be parsed.
    pub async fn get_open_positions(&self) -> Result<Vec<PositionRow>> {
        let rows = sqlx::query(
            r"
            SELECT market_id, yes_token, no_token, yes_filled, no_filled,
                   cost_basis_yes, cost_basis_no, entry_time, status
            FROM positions
            WHERE status = 'OPEN'
            ORDER BY entry_time ASC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_position).collect()
    }

    /// Returns true if any row (in any status) exists for `market_id`.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn position_exists(&self, market_id: &str) -> Result<bool> {
        let row = sqlx::query(r"SELECT COUNT(*) AS n FROM positions WHERE market_id = ?1")
            .bind(market_id)
            .fetch_one(&self.pool)
            .await?;
        let n: i64 = row.try_get("n")?;
        Ok(n > 0)
    }

    /// Appends one audit record. The timestamp is taken at call time.
    ///
    /// # Errors
    /// Returns an error if the insert fails; callers treat this as
    /// best-effort and log rather than propagate.
    pub async fn log_event(&self, event_type: &str, payload: &serde_json::Value) -> Result<()> {
        sqlx::query(r"INSERT INTO events (ts, type, payload) VALUES (?1, ?2, ?3)")
            .bind(Utc::now().to_rfc3339())
            .bind(event_type)
            .bind(payload.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Total number of audit records.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn count_events(&self) -> Result<u64> {
        let row = sqlx::query(r"SELECT COUNT(*) AS n FROM events")
            .fetch_one(&self.pool)
            .await?;
        let n: i64 = row.try_get("n")?;
        Ok(u64::try_from(n).unwrap_or(0))
    }

    fn row_to_position(row: &sqlx::sqlite::SqliteRow) -> Result<PositionRow> {
        let decimal = |col: &str| -> Result<Decimal> {
            let raw: String = row.try_get(col)?;
            Decimal::from_str(&raw).with_context(|| format!("parsing column {col}"))
        };
        let entry_raw: String = row.try_get("entry_time")?;
        let entry_time = DateTime::parse_from_rfc3339(&entry_raw)
            .context("parsing entry_time")?
            .with_timezone(&Utc);
        let status_raw: String = row.try_get("status")?;

        Ok(PositionRow {
            market_id: row.try_get("market_id")?,
            yes_token: row.try_get("yes_token")?,
            no_token: row.try_get("no_token")?,
            yes_filled: decimal("yes_filled")?,
            no_filled: decimal("no_filled")?,
            cost_basis_yes: decimal("cost_basis_yes")?,
            cost_basis_no: decimal("cost_basis_no")?,
            entry_time,
            status: PositionStatus::parse(&status_raw),
        })
    }
}
