use std::str::FromStr;

use chrono::{DateTime, Utc};
use llm_client::CircuitSnapshot;
use signal_pipeline::Signal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Local persistence for the three tables the core owns outright, the way
/// the donor's `StateManager` (`trading-agent/src/state_manager.rs`) owns
/// `agent_state`: a pool built at startup, tables created with `CREATE
/// TABLE IF NOT EXISTS`, rows upserted with `ON CONFLICT ... DO UPDATE`.
/// Generalized from the donor's single key-value table into three
/// purpose-specific ones, since each has its own shape here.
///
/// - `bot_cycle_state`: last-cycle heartbeat per bot, restart diagnostics only.
/// - `circuit_breaker_state`: the LLM breaker's durable snapshot, so a
///   restart doesn't spuriously re-close a breaker that was open because of
///   a real outage.
/// - `signal_audit`: a local mirror of the externally-owned signals table,
///   for idempotence checks on restart.
pub struct StateStore {
    pool: SqlitePool,
}

impl StateStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.init_tables().await?;
        Ok(store)
    }

    async fn init_tables(&self) -> anyhow::Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS bot_cycle_state (
                bot_id TEXT PRIMARY KEY,
                last_cycle_at TEXT NOT NULL,
                duration_ms INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS circuit_breaker_state (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                consecutive_failures INTEGER NOT NULL,
                opened_at TEXT,
                circuit_open INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS signal_audit (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                symbol TEXT NOT NULL,
                signal_type TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Upserts the last-cycle heartbeat for `bot_id`. Best-effort: a write
    /// failure is logged and swallowed rather than failing the cycle that
    /// triggered it — this table only feeds restart diagnostics, never a
    /// live scheduling decision.
    pub async fn record_bot_cycle(&self, bot_id: Uuid, duration_ms: u64) {
        let result = sqlx::query(
            "INSERT INTO bot_cycle_state (bot_id, last_cycle_at, duration_ms) VALUES (?, ?, ?)
             ON CONFLICT(bot_id) DO UPDATE SET
                last_cycle_at = excluded.last_cycle_at,
                duration_ms = excluded.duration_ms",
        )
        .bind(bot_id.to_string())
        .bind(Utc::now().to_rfc3339())
        .bind(duration_ms as i64)
        .execute(&self.pool)
        .await;

        if let Err(err) = result {
            tracing::warn!(%bot_id, %err, "failed to persist bot_cycle_state");
        }
    }

    /// Mirrors one signal's identity/status into the local audit table.
    /// Same best-effort posture as `record_bot_cycle`.
    pub async fn record_signal_audit(&self, signal: &Signal) {
        let result = sqlx::query(
            "INSERT INTO signal_audit (id, user_id, symbol, signal_type, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET status = excluded.status",
        )
        .bind(signal.id.to_string())
        .bind(&signal.user_id)
        .bind(&signal.symbol)
        .bind(format!("{:?}", signal.signal_type))
        .bind(format!("{:?}", signal.status))
        .bind(signal.created_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        if let Err(err) = result {
            tracing::warn!(signal_id = %signal.id, %err, "failed to persist signal_audit");
        }
    }

    /// Flushed at shutdown once the scheduler has drained its in-flight
    /// cycles; loaded back at the next startup via `load_circuit_breaker`.
    pub async fn save_circuit_breaker(&self, snapshot: &CircuitSnapshot) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO circuit_breaker_state (id, consecutive_failures, opened_at, circuit_open)
             VALUES (1, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                consecutive_failures = excluded.consecutive_failures,
                opened_at = excluded.opened_at,
                circuit_open = excluded.circuit_open",
        )
        .bind(snapshot.consecutive_failures as i64)
        .bind(snapshot.opened_at.map(|d| d.to_rfc3339()))
        .bind(snapshot.is_open as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn load_circuit_breaker(&self) -> anyhow::Result<Option<CircuitSnapshot>> {
        let row = sqlx::query(
            "SELECT consecutive_failures, opened_at, circuit_open FROM circuit_breaker_state WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| {
            let opened_at: Option<String> = row.get("opened_at");
            CircuitSnapshot {
                consecutive_failures: row.get::<i64, _>("consecutive_failures") as u32,
                opened_at: opened_at
                    .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                    .map(|d| d.with_timezone(&Utc)),
                is_open: row.get::<i64, _>("circuit_open") != 0,
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn circuit_breaker_state_roundtrips() {
        let store = StateStore::connect("sqlite::memory:").await.unwrap();
        assert!(store.load_circuit_breaker().await.unwrap().is_none());

        let snapshot = CircuitSnapshot {
            consecutive_failures: 3,
            opened_at: Some(Utc::now()),
            is_open: true,
        };
        store.save_circuit_breaker(&snapshot).await.unwrap();

        let loaded = store.load_circuit_breaker().await.unwrap().unwrap();
        assert_eq!(loaded.consecutive_failures, 3);
        assert!(loaded.is_open);
        assert!(loaded.opened_at.is_some());

        // Re-running init against the live pool exercises CREATE TABLE IF
        // NOT EXISTS idempotence and confirms the saved row survives it.
        store.init_tables().await.unwrap();
        assert!(store.load_circuit_breaker().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn bot_cycle_state_upserts_instead_of_duplicating() {
        let store = StateStore::connect("sqlite::memory:").await.unwrap();
        let bot_id = Uuid::new_v4();
        store.record_bot_cycle(bot_id, 120).await;
        store.record_bot_cycle(bot_id, 340).await;

        let row: (i64,) = sqlx::query_as("SELECT duration_ms FROM bot_cycle_state WHERE bot_id = ?")
            .bind(bot_id.to_string())
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(row.0, 340);
    }
}
