mod api;
mod metrics;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use common::config::{redact_conn_str, Config};
use common::db::AsyncDb;
use common::observability::build_dispatch;
use common::polymarket::PolymarketClient;

use api::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    let dispatch = build_dispatch(&config.general.log_level);
    tracing::dispatcher::set_global_default(dispatch)?;
    metrics::install_recorder()?;

    let db_path = config.db_path()?;
    tracing::info!(path = %redact_conn_str(&db_path), "opening database");
    let db = AsyncDb::open(&db_path).await?;

    let client = PolymarketClient::new(
        &config.polymarket.data_api_url,
        &config.polymarket.gamma_api_url,
        Duration::from_secs(config.polymarket.request_timeout_secs),
    )?;

    let state = Arc::new(AppState {
        db,
        client,
        fetch_timeout: Duration::from_secs(config.polymarket.fetch_timeout_secs),
        started_at: chrono::Utc::now(),
    });

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("api listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, api::router(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use tower::ServiceExt;

    /// App backed by an in-memory DB and a gateway nobody listens on, so
    /// every outbound call fails fast and the degrade paths are exercised.
    async fn test_app() -> Router {
        let db = AsyncDb::open(":memory:").await.unwrap();
        let client = PolymarketClient::new(
            "http://127.0.0.1:9",
            "http://127.0.0.1:9",
            Duration::from_secs(1),
        )
        .unwrap();
        let state = Arc::new(AppState {
            db,
            client,
            fetch_timeout: Duration::from_secs(2),
            started_at: chrono::Utc::now(),
        });
        api::router(state)
    }

    async fn get_json(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app().await;
        let (status, json) = get_json(&app, "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert!(json["uptime_secs"].as_i64().unwrap() >= 0);
    }

    #[tokio::test]
    async fn test_series_empty_without_models() {
        let app = test_app().await;
        let (status, json) = get_json(&app, "/api/series").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["series"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_seed_creates_all_fixtures() {
        let app = test_app().await;
        let (status, json) = get_json(&app, "/api/seed").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["ok"], true);
        assert_eq!(json["reset"], "none");
        assert_eq!(json["models"], 4);
        assert_eq!(json["picks"], 5);
        // 4 models x 3 markets x 4 ticks.
        assert_eq!(json["inferences"], 48);
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let app = test_app().await;
        get_json(&app, "/api/seed").await;
        get_json(&app, "/api/seed").await;

        let (_, json) = get_json(&app, "/api/snapshots").await;
        let models = json["models"].as_array().unwrap();
        assert_eq!(models.len(), 4, "re-seeding must not duplicate models");
    }

    #[tokio::test]
    async fn test_seed_reset_db_rebuilds() {
        let app = test_app().await;
        get_json(&app, "/api/seed").await;
        let (status, json) = get_json(&app, "/api/seed?reset=db").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["reset"], "db");

        let (_, json) = get_json(&app, "/api/snapshots").await;
        assert_eq!(json["models"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_snapshots_after_seed() {
        let app = test_app().await;
        get_json(&app, "/api/seed").await;

        let (status, json) = get_json(&app, "/api/snapshots").await;
        assert_eq!(status, StatusCode::OK);
        let models = json["models"].as_array().unwrap();
        assert_eq!(models.len(), 4);
        for model in models {
            assert_eq!(model["snapshots"].as_array().unwrap().len(), 1);
            assert!(model["recentlyClosed"].as_array().unwrap().is_empty());
            assert!(model["snapshots"][0]["totalValue"].as_f64().unwrap() >= 1000.0);
        }
    }

    #[tokio::test]
    async fn test_series_after_seed_has_one_point_per_model() {
        let app = test_app().await;
        get_json(&app, "/api/seed").await;

        let (status, json) = get_json(&app, "/api/series").await;
        assert_eq!(status, StatusCode::OK);
        let series = json["series"].as_array().unwrap();
        assert_eq!(series.len(), 4);
        for entry in series {
            assert_eq!(entry["points"].as_array().unwrap().len(), 1);
        }
    }

    #[tokio::test]
    async fn test_inferences_default_page_size() {
        let app = test_app().await;
        get_json(&app, "/api/seed").await;

        let (status, json) = get_json(&app, "/api/inferences").await;
        assert_eq!(status, StatusCode::OK);
        // 48 seeded, default page of 12, newest first.
        let inferences = json["inferences"].as_array().unwrap();
        assert_eq!(inferences.len(), 12);
        assert!(inferences[0]["modelName"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_inferences_skip_and_limit() {
        let app = test_app().await;
        get_json(&app, "/api/seed").await;

        let (_, json) = get_json(&app, "/api/inferences?skip=44&limit=12").await;
        assert_eq!(json["inferences"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_trending_degrades_to_stubs_when_gateway_down() {
        let app = test_app().await;
        get_json(&app, "/api/seed").await;

        let (status, json) = get_json(&app, "/api/trending").await;
        assert_eq!(status, StatusCode::OK);
        let markets = json["markets"].as_array().unwrap();
        assert_eq!(markets.len(), 5);
        for market in markets {
            // Stub entries carry the slug as the question.
            assert_eq!(market["question"], market["slug"]);
        }
    }

    #[tokio::test]
    async fn test_trending_empty_without_pick() {
        let app = test_app().await;
        let (status, json) = get_json(&app, "/api/trending").await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["markets"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_live_positions_isolated_failures() {
        let app = test_app().await;
        get_json(&app, "/api/seed").await;

        let (status, json) = get_json(&app, "/api/live-positions").await;
        assert_eq!(status, StatusCode::OK, "gateway failure must not 500");
        let positions = json["positions"].as_array().unwrap();
        assert_eq!(positions.len(), 4);
        for entry in positions {
            assert_eq!(entry["fetched"], false);
            assert!(entry["positions"].as_array().unwrap().is_empty());
            assert!(entry["error"].as_str().is_some());
            assert_eq!(entry["stats"]["totalPositions"], 0);
        }
    }

    #[tokio::test]
    async fn test_closed_positions_isolated_failures() {
        let app = test_app().await;
        get_json(&app, "/api/seed").await;

        let (status, json) = get_json(&app, "/api/closed-positions?sortBy=realizedpnl").await;
        assert_eq!(status, StatusCode::OK);
        let positions = json["positions"].as_array().unwrap();
        assert_eq!(positions.len(), 4);
        for entry in positions {
            assert_eq!(entry["fetched"], false);
        }
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let app = test_app().await;
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_on_disk_db_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("arena.db");
        let db = AsyncDb::open(path.to_str().unwrap()).await.unwrap();
        let client = PolymarketClient::new(
            "http://127.0.0.1:9",
            "http://127.0.0.1:9",
            Duration::from_secs(1),
        )
        .unwrap();
        let state = Arc::new(AppState {
            db,
            client,
            fetch_timeout: Duration::from_secs(2),
            started_at: chrono::Utc::now(),
        });
        let app = api::router(state);

        let (status, json) = get_json(&app, "/api/seed").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["ok"], true);

        let (_, json) = get_json(&app, "/api/snapshots").await;
        assert_eq!(json["models"].as_array().unwrap().len(), 4);
    }
}
