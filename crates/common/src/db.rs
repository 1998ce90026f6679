use anyhow::Result;
use rusqlite::Connection;

/// Async database wrapper around `tokio_rusqlite::Connection`.
///
/// Runs all SQLite operations on a dedicated background thread via
/// `tokio_rusqlite`, keeping the Tokio runtime cooperative. Clone is
/// cheap (shared mpsc sender to the background thread).
#[derive(Clone)]
pub struct AsyncDb {
    conn: tokio_rusqlite::Connection,
}

impl AsyncDb {
    /// Open a database at `path`, set PRAGMAs (WAL, foreign keys, busy_timeout),
    /// and apply the schema — all on the background thread.
    pub async fn open(path: &str) -> Result<Self> {
        let conn = tokio_rusqlite::Connection::open(path).await?;
        conn.call(|conn| -> std::result::Result<(), rusqlite::Error> {
            conn.busy_timeout(std::time::Duration::from_secs(30))?;
            conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
            apply_schema(conn)?;
            Ok(())
        })
        .await
        .map_err(|e| anyhow::anyhow!("AsyncDb::open: {e}"))?;
        Ok(Self { conn })
    }

    /// Run a closure on the background SQLite thread and return the result.
    pub async fn call<F, R>(&self, function: F) -> Result<R>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        self.conn.call(move |conn| function(conn)).await.map_err(
            |e: tokio_rusqlite::Error<anyhow::Error>| match e {
                tokio_rusqlite::Error::ConnectionClosed => {
                    anyhow::anyhow!("database connection closed")
                }
                tokio_rusqlite::Error::Close((_, err)) => {
                    anyhow::anyhow!("database close error: {err}")
                }
                tokio_rusqlite::Error::Error(err) => err,
                other => anyhow::anyhow!("database error: {other}"),
            },
        )
    }

    /// Like [`Self::call`], but records Prometheus metrics for DB latency and errors.
    ///
    /// Measures the full wall-clock time of the operation, including queueing
    /// on the dedicated SQLite thread.
    pub async fn call_named<F, R>(&self, op: &'static str, function: F) -> Result<R>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let start = std::time::Instant::now();
        let res = self.call(function).await;
        let ms = start.elapsed().as_secs_f64() * 1000.0;

        match &res {
            Ok(_) => {
                metrics::histogram!(
                    "arena_db_query_latency_ms",
                    "op" => op,
                    "status" => "ok"
                )
                .record(ms);
            }
            Err(_) => {
                metrics::histogram!(
                    "arena_db_query_latency_ms",
                    "op" => op,
                    "status" => "err"
                )
                .record(ms);
                metrics::counter!("arena_db_query_errors_total", "op" => op).increment(1);
            }
        }

        res
    }
}

/// Create all tables and indexes. Idempotent; also used by the seed
/// endpoint's reset modes to rebuild dropped tables.
pub fn apply_schema(conn: &Connection) -> std::result::Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA)
}

/// Drop the four domain tables so the schema can be recreated from scratch.
pub fn drop_domain_tables(conn: &Connection) -> std::result::Result<(), rusqlite::Error> {
    conn.execute_batch(
        "DROP TABLE IF EXISTS model_inferences;
         DROP TABLE IF EXISTS leaderboard_snapshots;
         DROP TABLE IF EXISTS daily_picks;
         DROP TABLE IF EXISTS models;",
    )
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS models (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    wallet_address TEXT NOT NULL,      -- stored lowercased
    learnings TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(wallet_address)
);

CREATE TABLE IF NOT EXISTS daily_picks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    pick_date TEXT NOT NULL,           -- YYYY-MM-DD (UTC)
    selected_markets_json TEXT NOT NULL DEFAULT '[]',
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(pick_date)
);

CREATE TABLE IF NOT EXISTS model_inferences (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    model_id INTEGER NOT NULL REFERENCES models(id),
    timestamp TEXT NOT NULL,           -- RFC 3339 UTC; dedup and sort key
    prompt TEXT NOT NULL,
    reasoning TEXT,
    UNIQUE(model_id, timestamp)
);

CREATE TABLE IF NOT EXISTS leaderboard_snapshots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    model_id INTEGER NOT NULL REFERENCES models(id),
    date TEXT NOT NULL,                -- RFC 3339 UTC
    total_value REAL NOT NULL DEFAULT 0,
    realized_pnl REAL NOT NULL DEFAULT 0,
    unrealized_pnl REAL NOT NULL DEFAULT 0,
    top_positions_json TEXT NOT NULL DEFAULT '[]',
    UNIQUE(model_id, date)
);

CREATE INDEX IF NOT EXISTS idx_model_inferences_timestamp ON model_inferences(timestamp);
CREATE INDEX IF NOT EXISTS idx_model_inferences_model_ts ON model_inferences(model_id, timestamp);
CREATE INDEX IF NOT EXISTS idx_leaderboard_snapshots_model_date ON leaderboard_snapshots(model_id, date);
"#;
