use axum::{extract::State, Json};
use chrono::{Duration, Utc};
use serde::Serialize;
use std::sync::Arc;

use common::series::{hourly_series, SeriesPoint, Snapshot, WINDOW_HOURS};
use common::store;

use super::{ApiError, AppState};

#[derive(Serialize)]
pub struct SeriesResponse {
    pub series: Vec<ModelSeries>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSeries {
    pub model_id: i64,
    pub model_name: String,
    pub points: Vec<SeriesPoint>,
}

/// Hourly account-value series over the trailing 24 hours, one entry per
/// model. The window end is fixed once per request.
pub async fn get_series(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SeriesResponse>, ApiError> {
    let window_end = Utc::now();
    let window_start = window_end - Duration::hours(WINDOW_HOURS);

    let models = state
        .db
        .call_named("list_models", |conn| store::list_models(conn))
        .await?;

    let mut series = Vec::with_capacity(models.len());
    for model in models {
        let model_id = model.id;
        let rows = state
            .db
            .call_named("snapshots_in_window", move |conn| {
                store::snapshots_in_window(conn, model_id, window_start, window_end)
            })
            .await?;

        let snapshots: Vec<Snapshot> = rows
            .iter()
            .map(|row| Snapshot {
                at: row.date,
                total_value: row.total_value,
            })
            .collect();

        series.push(ModelSeries {
            model_id: model.id,
            model_name: model.name,
            points: hourly_series(&snapshots, window_end),
        });
    }

    Ok(Json(SeriesResponse { series }))
}
