//! Persistence of scanned events and detected opportunities

#[cfg(test)]
mod tests;

use crate::error::Result;
use crate::types::{ArbitrageOpportunity, Event};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;
use uuid::Uuid;

/// SQLite store for events and opportunities
pub struct Database {
    pool: SqlitePool,
}

/// An opportunity as read back from storage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredOpportunity {
    pub id: String,
    pub event_id: String,
    pub home_team: String,
    pub away_team: String,
    pub sport_key: String,
    /// {outcome: {bookmaker, odds}}
    pub best_odds: serde_json::Value,
    pub arb_percent: f64,
    pub inverse_sum: f64,
    pub commence_time: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Database {
    /// Connect to SQLite database (creates if not exists)
    pub async fn connect<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db_url = format!("sqlite:{}?mode=rwc", path.as_ref().display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Private in-memory database, one connection so every query sees the same data
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS event_odds (
                event_id TEXT PRIMARY KEY,
                commence_time TEXT NOT NULL,
                home_team TEXT NOT NULL,
                away_team TEXT NOT NULL,
                sport_key TEXT NOT NULL,
                odds TEXT NOT NULL,
                created_at TEXT NOT NULL,
                last_update TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS arbitrage_opportunities (
                id TEXT PRIMARY KEY,
                event_id TEXT NOT NULL,
                home_team TEXT NOT NULL,
                away_team TEXT NOT NULL,
                sport_key TEXT NOT NULL,
                best_odds TEXT NOT NULL,
                arb_percent REAL NOT NULL,
                inverse_sum REAL NOT NULL,
                commence_time TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_arb_active ON arbitrage_opportunities (is_active, arb_percent)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert or refresh an event's odds snapshot
    pub async fn save_event(&self, event: &Event) -> Result<()> {
        let now = timestamp(Utc::now());

        sqlx::query(
            r#"
            INSERT INTO event_odds (event_id, commence_time, home_team, away_team, sport_key, odds, created_at, last_update)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(event_id) DO UPDATE SET
                commence_time = excluded.commence_time,
                odds = excluded.odds,
                last_update = excluded.last_update
            "#,
        )
        .bind(event.id())
        .bind(timestamp(event.commence_time()))
        .bind(event.home_team())
        .bind(event.away_team())
        .bind(event.sport_key())
        .bind(odds_snapshot(event).to_string())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Stored odds snapshot for an event
    pub async fn get_event_odds(&self, event_id: &str) -> Result<Option<serde_json::Value>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT odds FROM event_odds WHERE event_id = ?")
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|(odds,)| serde_json::from_str(&odds).map_err(Into::into))
            .transpose()
    }

    /// Save a detected opportunity, returning its id.
    /// Replaces any earlier active opportunity for the same event.
    pub async fn save_opportunity(&self, opp: &ArbitrageOpportunity) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE arbitrage_opportunities SET is_active = 0 WHERE event_id = ? AND is_active = 1")
            .bind(&opp.event.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO arbitrage_opportunities
                (id, event_id, home_team, away_team, sport_key, best_odds, arb_percent, inverse_sum, commence_time, is_active, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?)
            "#,
        )
        .bind(&id)
        .bind(&opp.event.id)
        .bind(&opp.event.home_team)
        .bind(&opp.event.away_team)
        .bind(&opp.event.sport_key)
        .bind(serde_json::to_string(&opp.best_odds)?)
        .bind(opp.percent())
        .bind(opp.inverse_sum)
        .bind(timestamp(opp.event.commence_time))
        .bind(timestamp(opp.detected_at))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(id)
    }

    /// Active opportunities, most profitable first
    pub async fn active_opportunities(&self, limit: i64) -> Result<Vec<StoredOpportunity>> {
        let rows = sqlx::query_as::<_, OpportunityRow>(
            r#"
            SELECT id, event_id, home_team, away_team, sport_key, best_odds, arb_percent,
                   inverse_sum, commence_time, is_active, created_at
            FROM arbitrage_opportunities
            WHERE is_active = 1
            ORDER BY arb_percent DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let id = row.id.clone();
                match StoredOpportunity::try_from(row) {
                    Ok(opp) => Some(opp),
                    Err(e) => {
                        warn!("Skipping undecodable opportunity {}: {}", id, e);
                        None
                    }
                }
            })
            .collect())
    }

    /// Deactivate opportunities whose event has started. Returns rows changed.
    pub async fn expire_started(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE arbitrage_opportunities SET is_active = 0 WHERE is_active = 1 AND commence_time <= ?",
        )
        .bind(timestamp(now))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

/// Fixed-width UTC timestamps so text comparison matches time order
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// {bookmaker: {market: {outcome: odds}}}
fn odds_snapshot(event: &Event) -> serde_json::Value {
    let mut books: BTreeMap<&str, BTreeMap<String, BTreeMap<&str, f64>>> = BTreeMap::new();
    for quote in event.bookmakers() {
        let markets = books.entry(quote.key.as_str()).or_default();
        for market in &quote.markets {
            let outcomes = markets.entry(market.kind.to_string()).or_default();
            for price in &market.outcomes {
                outcomes.insert(price.name.as_str(), price.price);
            }
        }
    }
    serde_json::json!(books)
}

#[derive(Debug, sqlx::FromRow)]
struct OpportunityRow {
    id: String,
    event_id: String,
    home_team: String,
    away_team: String,
    sport_key: String,
    best_odds: String,
    arb_percent: f64,
    inverse_sum: f64,
    commence_time: String,
    is_active: i64,
    created_at: String,
}

impl TryFrom<OpportunityRow> for StoredOpportunity {
    type Error = anyhow::Error;

    fn try_from(row: OpportunityRow) -> std::result::Result<Self, Self::Error> {
        Ok(StoredOpportunity {
            id: row.id,
            event_id: row.event_id,
            home_team: row.home_team,
            away_team: row.away_team,
            sport_key: row.sport_key,
            best_odds: serde_json::from_str(&row.best_odds)?,
            arb_percent: row.arb_percent,
            inverse_sum: row.inverse_sum,
            commence_time: row.commence_time.parse()?,
            is_active: row.is_active != 0,
            created_at: row.created_at.parse()?,
        })
    }
}
