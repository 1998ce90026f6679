use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use common::db::{apply_schema, drop_domain_tables};
use common::store;

use super::{ApiError, AppState};

/// Demo lineup mirroring production: name, wallet, accumulated learnings.
const SEED_MODELS: [(&str, &str, &str); 4] = [
    (
        "GPT 5",
        "0xgpt5",
        "Prefers momentum plus xG edges in football markets",
    ),
    (
        "Grok 4",
        "0xgrok4",
        "Fades overreactions to late injury news",
    ),
    (
        "Claude Sonnet 4.5",
        "0xsonnet45",
        "Sizes down aggressively in low-liquidity markets",
    ),
    (
        "DeepSeek Chat v3.1",
        "0xdeepseek31",
        "Backs favorites once the spread tightens near tip-off",
    ),
];

const SEED_PICKS: [&str; 5] = [
    "mkt-epl-ars-che",
    "mkt-nba-lal-gsw",
    "mkt-mlb-dod-mets",
    "mkt-nfl-sf-kc",
    "mkt-atp-alc-sin",
];

/// Inference ticks, minutes before now. Each seeded market is offset by a
/// further 5 minutes so every (model, timestamp) pair stays unique.
const SEED_TICKS_MIN: [i64; 4] = [0, 15, 30, 45];

/// How many of the day's picks each model reasons about.
const SEED_MARKETS_PER_MODEL: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResetMode {
    #[default]
    None,
    Collections,
    Db,
}

impl ResetMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Collections => "collections",
            Self::Db => "db",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" => Some(Self::None),
            "collections" => Some(Self::Collections),
            "db" => Some(Self::Db),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SeedParams {
    pub reset: Option<String>,
}

#[derive(Serialize)]
pub struct SeedResponse {
    pub ok: bool,
    pub reset: &'static str,
    pub models: usize,
    pub picks: usize,
    pub inferences: usize,
    pub pruned: usize,
}

/// Idempotent demo seed: models with learnings, today's market pick,
/// inferences on 15-minute ticks for each model's first three markets, and
/// one snapshot per model. Re-running updates in place instead of
/// duplicating. Unknown reset values behave as `none`.
pub async fn run_seed(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SeedParams>,
) -> Result<Json<SeedResponse>, ApiError> {
    let reset = params
        .reset
        .as_deref()
        .and_then(ResetMode::from_str_loose)
        .unwrap_or_default();

    let (models, inferences, pruned) = state
        .db
        .call_named("seed", move |conn| {
            match reset {
                ResetMode::None => {}
                ResetMode::Collections => {
                    drop_domain_tables(conn)?;
                    apply_schema(conn)?;
                }
                ResetMode::Db => {
                    drop_domain_tables(conn)?;
                    apply_schema(conn)?;
                    conn.execute_batch("VACUUM;")?;
                }
            }

            let now = Utc::now();
            let today = now.date_naive();
            let mut rng = rand::thread_rng();

            let picks: Vec<String> = SEED_PICKS.iter().map(ToString::to_string).collect();
            store::upsert_daily_pick(conn, today, &picks)?;

            let mut inferences = 0usize;
            for (name, wallet, learnings) in SEED_MODELS {
                let model_id = store::upsert_model(conn, name, wallet, Some(learnings))?;

                for (market_idx, market) in SEED_PICKS
                    .iter()
                    .take(SEED_MARKETS_PER_MODEL)
                    .enumerate()
                {
                    for minutes in SEED_TICKS_MIN {
                        let tick =
                            now - Duration::minutes(minutes + 5 * market_idx as i64);
                        store::upsert_inference(
                            conn,
                            model_id,
                            tick,
                            &format!("Evaluate today's market {market}"),
                            Some(&format!("{name} leans toward the favorite in {market}")),
                        )?;
                        inferences += 1;
                    }
                }

                let top: Vec<String> = picks.iter().take(3).cloned().collect();
                store::upsert_snapshot(
                    conn,
                    model_id,
                    now,
                    1000.0 + rng.gen_range(0.0..500.0),
                    rng.gen_range(-50.0..50.0),
                    rng.gen_range(-25.0..25.0),
                    &top,
                )?;
            }

            let pruned = store::prune_expired_inferences(conn, now)?;
            Ok((SEED_MODELS.len(), inferences, pruned))
        })
        .await?;

    Ok(Json(SeedResponse {
        ok: true,
        reset: reset.as_str(),
        models,
        picks: SEED_PICKS.len(),
        inferences,
        pruned,
    }))
}
