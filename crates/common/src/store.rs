//! Row-level storage operations. All writes are idempotent upserts keyed by
//! the schema's uniqueness constraints, so concurrent duplicate writes are
//! safe to retry or ignore. Executed via `AsyncDb::call` from handlers.

use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

/// Inferences older than this are pruned on the write path.
pub const INFERENCE_RETENTION_DAYS: i64 = 90;

#[derive(Debug, Clone)]
pub struct ModelRow {
    pub id: i64,
    pub name: String,
    pub wallet_address: String,
}

#[derive(Debug, Clone)]
pub struct SnapshotRow {
    pub id: i64,
    pub date: DateTime<Utc>,
    pub total_value: f64,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    pub top_positions: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct InferenceRow {
    pub id: i64,
    pub model_id: i64,
    pub model_name: String,
    pub timestamp: DateTime<Utc>,
    pub prompt: String,
    pub reasoning: String,
}

#[derive(Debug, Clone)]
pub struct DailyPickRow {
    pub pick_date: NaiveDate,
    pub selected_markets: Vec<String>,
}

/// RFC 3339 with a trailing Z; lexicographic order matches chronological
/// order, which the range queries below rely on.
fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

fn parse_slugs(json: &str) -> Vec<String> {
    serde_json::from_str(json).unwrap_or_default()
}

// --- models ---

pub fn upsert_model(
    conn: &Connection,
    name: &str,
    wallet_address: &str,
    learnings: Option<&str>,
) -> Result<i64> {
    let wallet = wallet_address.to_lowercase();
    conn.execute(
        "INSERT INTO models (name, wallet_address, learnings) VALUES (?1, ?2, ?3)
         ON CONFLICT(wallet_address) DO UPDATE SET
             name = excluded.name,
             learnings = excluded.learnings",
        params![name, wallet, learnings],
    )?;
    let id = conn.query_row(
        "SELECT id FROM models WHERE wallet_address = ?1",
        params![wallet],
        |row| row.get(0),
    )?;
    Ok(id)
}

pub fn list_models(conn: &Connection) -> Result<Vec<ModelRow>> {
    let mut stmt = conn.prepare("SELECT id, name, wallet_address FROM models ORDER BY id")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(ModelRow {
                id: row.get(0)?,
                name: row.get(1)?,
                wallet_address: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// --- daily picks ---

pub fn upsert_daily_pick(conn: &Connection, date: NaiveDate, slugs: &[String]) -> Result<()> {
    conn.execute(
        "INSERT INTO daily_picks (pick_date, selected_markets_json) VALUES (?1, ?2)
         ON CONFLICT(pick_date) DO UPDATE SET
             selected_markets_json = excluded.selected_markets_json,
             updated_at = datetime('now')",
        params![date.to_string(), serde_json::to_string(slugs)?],
    )?;
    Ok(())
}

/// Today's pick when present, otherwise the most recent one.
pub fn latest_daily_pick(conn: &Connection, today: NaiveDate) -> Result<Option<DailyPickRow>> {
    let map = |row: &rusqlite::Row<'_>| -> rusqlite::Result<(String, String)> {
        Ok((row.get(0)?, row.get(1)?))
    };
    let found = conn
        .query_row(
            "SELECT pick_date, selected_markets_json FROM daily_picks WHERE pick_date = ?1",
            params![today.to_string()],
            map,
        )
        .optional()?;
    let found = match found {
        Some(row) => Some(row),
        None => conn
            .query_row(
                "SELECT pick_date, selected_markets_json FROM daily_picks
                 ORDER BY pick_date DESC LIMIT 1",
                [],
                map,
            )
            .optional()?,
    };
    Ok(found.map(|(date, slugs)| DailyPickRow {
        pick_date: date.parse().unwrap_or(today),
        selected_markets: parse_slugs(&slugs),
    }))
}

// --- inferences ---

pub fn upsert_inference(
    conn: &Connection,
    model_id: i64,
    timestamp: DateTime<Utc>,
    prompt: &str,
    reasoning: Option<&str>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO model_inferences (model_id, timestamp, prompt, reasoning)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(model_id, timestamp) DO UPDATE SET
             prompt = excluded.prompt,
             reasoning = excluded.reasoning",
        params![model_id, ts(timestamp), prompt, reasoning],
    )?;
    Ok(())
}

pub fn recent_inferences(conn: &Connection, skip: u32, limit: u32) -> Result<Vec<InferenceRow>> {
    let mut stmt = conn.prepare(
        "SELECT i.id, i.model_id, m.name, i.timestamp, i.prompt, i.reasoning
         FROM model_inferences i
         JOIN models m ON m.id = i.model_id
         ORDER BY i.timestamp DESC
         LIMIT ?1 OFFSET ?2",
    )?;
    let rows = stmt
        .query_map(params![limit, skip], map_inference_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn map_inference_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<InferenceRow> {
    let timestamp: String = row.get(3)?;
    Ok(InferenceRow {
        id: row.get(0)?,
        model_id: row.get(1)?,
        model_name: row.get(2)?,
        timestamp: parse_ts(&timestamp),
        prompt: row.get(4)?,
        reasoning: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
    })
}

/// Enforce the retention window. Returns the number of rows deleted.
pub fn prune_expired_inferences(conn: &Connection, now: DateTime<Utc>) -> Result<usize> {
    let cutoff = ts(now - Duration::days(INFERENCE_RETENTION_DAYS));
    let deleted = conn.execute(
        "DELETE FROM model_inferences WHERE timestamp < ?1",
        params![cutoff],
    )?;
    Ok(deleted)
}

// --- leaderboard snapshots ---

#[allow(clippy::too_many_arguments)]
pub fn upsert_snapshot(
    conn: &Connection,
    model_id: i64,
    date: DateTime<Utc>,
    total_value: f64,
    realized_pnl: f64,
    unrealized_pnl: f64,
    top_positions: &[String],
) -> Result<()> {
    conn.execute(
        "INSERT INTO leaderboard_snapshots
             (model_id, date, total_value, realized_pnl, unrealized_pnl, top_positions_json)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(model_id, date) DO UPDATE SET
             total_value = excluded.total_value,
             realized_pnl = excluded.realized_pnl,
             unrealized_pnl = excluded.unrealized_pnl,
             top_positions_json = excluded.top_positions_json",
        params![
            model_id,
            ts(date),
            total_value,
            realized_pnl,
            unrealized_pnl,
            serde_json::to_string(top_positions)?
        ],
    )?;
    Ok(())
}

/// Latest `n` snapshots for one model, newest first.
pub fn latest_snapshots(conn: &Connection, model_id: i64, n: u32) -> Result<Vec<SnapshotRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, date, total_value, realized_pnl, unrealized_pnl, top_positions_json
         FROM leaderboard_snapshots
         WHERE model_id = ?1
         ORDER BY date DESC
         LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(params![model_id, n], map_snapshot_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Snapshots within `[start, end]` for one model, ascending by date.
pub fn snapshots_in_window(
    conn: &Connection,
    model_id: i64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<SnapshotRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, date, total_value, realized_pnl, unrealized_pnl, top_positions_json
         FROM leaderboard_snapshots
         WHERE model_id = ?1 AND date >= ?2 AND date <= ?3
         ORDER BY date ASC",
    )?;
    let rows = stmt
        .query_map(params![model_id, ts(start), ts(end)], map_snapshot_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn map_snapshot_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SnapshotRow> {
    let date: String = row.get(1)?;
    let top_positions: String = row.get(5)?;
    Ok(SnapshotRow {
        id: row.get(0)?,
        date: parse_ts(&date),
        total_value: row.get(2)?,
        realized_pnl: row.get(3)?,
        unrealized_pnl: row.get(4)?,
        top_positions: parse_slugs(&top_positions),
    })
}
