use axum::{extract::State, Json};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use common::fetch::{best_effort_join, FetchOutcome};
use common::store;
use common::types::GammaMarket;

use super::{ApiError, AppState};

/// How many of the day's picked markets the dashboard shows.
const TRENDING_COUNT: usize = 5;

#[derive(Serialize)]
pub struct TrendingResponse {
    pub markets: Vec<MarketJson>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketJson {
    pub slug: String,
    pub question: String,
    pub category: String,
    pub volume_24hr: f64,
    pub volume: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcomes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome_prices: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

impl MarketJson {
    fn from_market(slug: String, market: &GammaMarket) -> Self {
        Self {
            question: market.question.clone().unwrap_or_else(|| slug.clone()),
            category: market.category.clone().unwrap_or_default(),
            volume_24hr: market.volume_24hr_any(),
            volume: market.volume_num.unwrap_or(0.0),
            outcomes: market.outcome_labels(),
            outcome_prices: market.outcome_price_values(),
            image: market.image_url(),
            icon: market.icon_url(),
            end_date: market.end_date_iso_or_derived(),
            slug,
        }
    }

    /// Placeholder for a slug whose gamma lookup failed; the UI still gets a
    /// row to render.
    fn stub(slug: String) -> Self {
        Self {
            question: slug.clone(),
            category: String::new(),
            volume_24hr: 0.0,
            volume: 0.0,
            outcomes: None,
            outcome_prices: None,
            image: None,
            icon: None,
            end_date: None,
            slug,
        }
    }
}

/// Today's picked markets (falling back to the most recent pick), enriched
/// with gamma metadata fetched in parallel.
pub async fn get_trending(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TrendingResponse>, ApiError> {
    let today = Utc::now().date_naive();
    let pick = state
        .db
        .call_named("latest_daily_pick", move |conn| {
            store::latest_daily_pick(conn, today)
        })
        .await?;

    let Some(pick) = pick else {
        return Ok(Json(TrendingResponse { markets: vec![] }));
    };

    let slugs: Vec<String> = pick
        .selected_markets
        .into_iter()
        .take(TRENDING_COUNT)
        .collect();

    let results = best_effort_join(slugs, state.fetch_timeout, |slug| {
        let client = state.client.clone();
        async move { client.fetch_market_by_slug(&slug).await }
    })
    .await;

    let markets = results
        .into_iter()
        .map(|(slug, outcome)| match outcome {
            FetchOutcome::Fetched(market) => MarketJson::from_market(slug, &market),
            FetchOutcome::Failed { reason } => {
                tracing::warn!(%slug, %reason, "gamma lookup failed, serving stub");
                MarketJson::stub(slug)
            }
        })
        .collect();

    Ok(Json(TrendingResponse { markets }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stub_uses_slug_as_question() {
        let stub = MarketJson::stub("mkt-epl-ars-che".to_string());
        assert_eq!(stub.question, "mkt-epl-ars-che");
        assert_eq!(stub.category, "");
        assert_eq!(stub.volume_24hr, 0.0);
    }

    #[test]
    fn test_from_market_falls_back_to_slug_question() {
        let market = GammaMarket::default();
        let json = MarketJson::from_market("mkt-x".to_string(), &market);
        assert_eq!(json.question, "mkt-x");
    }
}
