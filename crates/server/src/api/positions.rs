use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use common::fetch::{best_effort_join, FetchOutcome};
use common::polymarket::{
    ClosedPositionsQuery, PositionSort, PositionsQuery, SortDirection,
};
use common::positions::{filter_live, recently_closed, PositionStats};
use common::store::{self, SnapshotRow};
use common::types::ApiPosition;

use super::{ApiError, AppState};

// --- /api/snapshots ---

#[derive(Serialize)]
pub struct SnapshotsResponse {
    pub models: Vec<ModelSnapshots>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSnapshots {
    pub model_id: i64,
    pub model_name: String,
    pub wallet_address: String,
    /// Newest first, at most two.
    pub snapshots: Vec<SnapshotJson>,
    /// Top positions present in the previous snapshot but gone from the
    /// latest one. A heuristic over the captured top-N lists.
    pub recently_closed: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotJson {
    pub date: chrono::DateTime<chrono::Utc>,
    pub total_value: f64,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    pub top_positions: Vec<String>,
}

impl From<&SnapshotRow> for SnapshotJson {
    fn from(row: &SnapshotRow) -> Self {
        Self {
            date: row.date,
            total_value: row.total_value,
            realized_pnl: row.realized_pnl,
            unrealized_pnl: row.unrealized_pnl,
            top_positions: row.top_positions.clone(),
        }
    }
}

/// Latest two snapshots per model plus the diff of their top-position lists.
pub async fn get_snapshots(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SnapshotsResponse>, ApiError> {
    let model_rows = state
        .db
        .call_named("list_models", |conn| store::list_models(conn))
        .await?;

    let mut models = Vec::with_capacity(model_rows.len());
    for model in model_rows {
        let model_id = model.id;
        let rows = state
            .db
            .call_named("latest_snapshots", move |conn| {
                store::latest_snapshots(conn, model_id, 2)
            })
            .await?;

        let closed = match (rows.first(), rows.get(1)) {
            (Some(latest), Some(previous)) => {
                recently_closed(&previous.top_positions, &latest.top_positions)
            }
            _ => Vec::new(),
        };

        models.push(ModelSnapshots {
            model_id: model.id,
            model_name: model.name,
            wallet_address: model.wallet_address,
            snapshots: rows.iter().map(SnapshotJson::from).collect(),
            recently_closed: closed,
        });
    }

    Ok(Json(SnapshotsResponse { models }))
}

// --- /api/live-positions and /api/closed-positions ---

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PositionsParams {
    pub size_threshold: Option<f64>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub sort_by: Option<String>,
    pub sort_direction: Option<String>,
}

impl PositionsParams {
    fn sort_by(&self) -> Option<PositionSort> {
        self.sort_by.as_deref().and_then(PositionSort::from_str_loose)
    }

    fn sort_direction(&self) -> Option<SortDirection> {
        self.sort_direction
            .as_deref()
            .and_then(SortDirection::from_str_loose)
    }

    /// Unknown sort spellings fall back to the endpoint defaults; limit and
    /// offset ceilings are enforced by the client's URL builder.
    fn to_positions_query(&self) -> PositionsQuery {
        let defaults = PositionsQuery::default();
        PositionsQuery {
            size_threshold: self.size_threshold.unwrap_or(defaults.size_threshold),
            limit: self.limit.unwrap_or(defaults.limit),
            offset: self.offset.unwrap_or(defaults.offset),
            sort_by: self.sort_by().unwrap_or(defaults.sort_by),
            sort_direction: self.sort_direction().unwrap_or(defaults.sort_direction),
        }
    }

    fn to_closed_query(&self) -> ClosedPositionsQuery {
        let defaults = ClosedPositionsQuery::default();
        ClosedPositionsQuery {
            limit: self.limit.unwrap_or(defaults.limit),
            offset: self.offset.unwrap_or(defaults.offset),
            sort_by: self.sort_by().unwrap_or(defaults.sort_by),
            sort_direction: self.sort_direction().unwrap_or(defaults.sort_direction),
        }
    }
}

#[derive(Serialize)]
pub struct PositionsResponse {
    pub positions: Vec<ModelPositions>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelPositions {
    pub model_id: i64,
    pub model_name: String,
    pub wallet_address: String,
    /// False when this model's upstream call failed and its position list
    /// degraded to empty.
    pub fetched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub positions: Vec<ApiPosition>,
    pub stats: PositionStats,
}

/// Open positions per model, fanned out to the gateway in parallel. One
/// model's failure never hides the others.
pub async fn get_live_positions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PositionsParams>,
) -> Result<Json<PositionsResponse>, ApiError> {
    let query = params.to_positions_query();
    let models = state
        .db
        .call_named("list_models", |conn| store::list_models(conn))
        .await?;

    let results = best_effort_join(models, state.fetch_timeout, |model| {
        let client = state.client.clone();
        let query = query.clone();
        async move { client.fetch_positions(&model.wallet_address, &query).await }
    })
    .await;

    let positions = results
        .into_iter()
        .map(|(model, outcome)| {
            let (fetched, error, live) = match outcome {
                FetchOutcome::Fetched(fetched) => (true, None, filter_live(fetched)),
                FetchOutcome::Failed { reason } => {
                    tracing::warn!(
                        model = %model.name,
                        %reason,
                        "live position fetch degraded to empty"
                    );
                    (false, Some(reason), Vec::new())
                }
            };
            let stats = PositionStats::compute(&live, &[]);
            ModelPositions {
                model_id: model.id,
                model_name: model.name,
                wallet_address: model.wallet_address,
                fetched,
                error,
                positions: live,
                stats,
            }
        })
        .collect();

    Ok(Json(PositionsResponse { positions }))
}

/// Closed positions per model. Everything upstream returns here is closed
/// by definition; no liveness filtering applies.
pub async fn get_closed_positions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PositionsParams>,
) -> Result<Json<PositionsResponse>, ApiError> {
    let query = params.to_closed_query();
    let models = state
        .db
        .call_named("list_models", |conn| store::list_models(conn))
        .await?;

    let results = best_effort_join(models, state.fetch_timeout, |model| {
        let client = state.client.clone();
        let query = query.clone();
        async move {
            client
                .fetch_closed_positions(&model.wallet_address, &query)
                .await
        }
    })
    .await;

    let positions = results
        .into_iter()
        .map(|(model, outcome)| {
            let (fetched, error, closed) = match outcome {
                FetchOutcome::Fetched(closed) => (true, None, closed),
                FetchOutcome::Failed { reason } => {
                    tracing::warn!(
                        model = %model.name,
                        %reason,
                        "closed position fetch degraded to empty"
                    );
                    (false, Some(reason), Vec::new())
                }
            };
            let stats = PositionStats::compute(&[], &closed);
            ModelPositions {
                model_id: model.id,
                model_name: model.name,
                wallet_address: model.wallet_address,
                fetched,
                error,
                positions: closed,
                stats,
            }
        })
        .collect();

    Ok(Json(PositionsResponse { positions }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_default_to_endpoint_defaults() {
        let params = PositionsParams::default();
        let query = params.to_positions_query();
        assert_eq!(query.limit, 100);
        assert!((query.size_threshold - 1.0).abs() < 1e-9);
        assert_eq!(query.sort_by, PositionSort::Tokens);

        let closed = params.to_closed_query();
        assert_eq!(closed.limit, 50);
        assert_eq!(closed.sort_by, PositionSort::RealizedPnl);
    }

    #[test]
    fn test_params_unknown_sort_falls_back() {
        let params = PositionsParams {
            sort_by: Some("bogus".to_string()),
            sort_direction: Some("sideways".to_string()),
            ..PositionsParams::default()
        };
        let query = params.to_positions_query();
        assert_eq!(query.sort_by, PositionSort::Tokens);
        assert_eq!(query.sort_direction, SortDirection::Desc);
    }

    #[test]
    fn test_params_parse_loose_case() {
        let params = PositionsParams {
            sort_by: Some("cashpnl".to_string()),
            sort_direction: Some("asc".to_string()),
            limit: Some(25),
            ..PositionsParams::default()
        };
        let query = params.to_positions_query();
        assert_eq!(query.sort_by, PositionSort::CashPnl);
        assert_eq!(query.sort_direction, SortDirection::Asc);
        assert_eq!(query.limit, 25);
    }
}
