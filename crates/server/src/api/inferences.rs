use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use common::polymarket::{MAX_PAGE_LIMIT, MAX_PAGE_OFFSET};
use common::store;

use super::{ApiError, AppState};

const DEFAULT_LIMIT: u32 = 12;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct InferencesParams {
    pub skip: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Serialize)]
pub struct InferencesResponse {
    pub inferences: Vec<InferenceJson>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceJson {
    pub id: i64,
    pub model_id: i64,
    pub model_name: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub prompt: String,
    pub reasoning: String,
}

/// Recent reasoning logs across all models, newest first.
pub async fn get_inferences(
    State(state): State<Arc<AppState>>,
    Query(params): Query<InferencesParams>,
) -> Result<Json<InferencesResponse>, ApiError> {
    let skip = params.skip.unwrap_or(0).min(MAX_PAGE_OFFSET);
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_PAGE_LIMIT);

    let rows = state
        .db
        .call_named("recent_inferences", move |conn| {
            store::recent_inferences(conn, skip, limit)
        })
        .await?;

    let inferences = rows
        .into_iter()
        .map(|row| InferenceJson {
            id: row.id,
            model_id: row.model_id,
            model_name: row.model_name,
            timestamp: row.timestamp,
            prompt: row.prompt,
            reasoning: row.reasoning,
        })
        .collect();

    Ok(Json(InferencesResponse { inferences }))
}
