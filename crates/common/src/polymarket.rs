use crate::types::{ApiPosition, GammaMarket};
use anyhow::Result;
use reqwest::Url;
use std::time::{Duration, Instant};

/// Validation-layer ceilings applied before a request is built; requested
/// values above these are clamped, not rejected.
pub const MAX_PAGE_LIMIT: u32 = 500;
pub const MAX_PAGE_OFFSET: u32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "ASC" => Some(Self::Asc),
            "DESC" => Some(Self::Desc),
            _ => None,
        }
    }
}

/// Sort fields accepted by the Data API position endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionSort {
    Tokens,
    Current,
    Initial,
    CashPnl,
    PercentPnl,
    RealizedPnl,
    Title,
    Price,
}

impl PositionSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tokens => "TOKENS",
            Self::Current => "CURRENT",
            Self::Initial => "INITIAL",
            Self::CashPnl => "CASHPNL",
            Self::PercentPnl => "PERCENTPNL",
            Self::RealizedPnl => "REALIZEDPNL",
            Self::Title => "TITLE",
            Self::Price => "PRICE",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "TOKENS" => Some(Self::Tokens),
            "CURRENT" => Some(Self::Current),
            "INITIAL" => Some(Self::Initial),
            "CASHPNL" => Some(Self::CashPnl),
            "PERCENTPNL" => Some(Self::PercentPnl),
            "REALIZEDPNL" => Some(Self::RealizedPnl),
            "TITLE" => Some(Self::Title),
            "PRICE" => Some(Self::Price),
            _ => None,
        }
    }
}

/// Pagination and sort controls for `/positions`.
#[derive(Debug, Clone)]
pub struct PositionsQuery {
    pub size_threshold: f64,
    pub limit: u32,
    pub offset: u32,
    pub sort_by: PositionSort,
    pub sort_direction: SortDirection,
}

impl Default for PositionsQuery {
    fn default() -> Self {
        Self {
            size_threshold: 1.0,
            limit: 100,
            offset: 0,
            sort_by: PositionSort::Tokens,
            sort_direction: SortDirection::Desc,
        }
    }
}

/// Pagination and sort controls for `/closed-positions`.
#[derive(Debug, Clone)]
pub struct ClosedPositionsQuery {
    pub limit: u32,
    pub offset: u32,
    pub sort_by: PositionSort,
    pub sort_direction: SortDirection,
}

impl Default for ClosedPositionsQuery {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
            sort_by: PositionSort::RealizedPnl,
            sort_direction: SortDirection::Desc,
        }
    }
}

/// Error classification for gateway metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    Timeout,
    Connect,
    Status,
    Decode,
    Other,
}

impl ApiErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Connect => "connect",
            Self::Status => "status",
            Self::Decode => "decode",
            Self::Other => "other",
        }
    }
}

pub fn classify_api_error(err: &anyhow::Error) -> ApiErrorKind {
    let Some(e) = err.downcast_ref::<reqwest::Error>() else {
        if err.downcast_ref::<serde_json::Error>().is_some() {
            return ApiErrorKind::Decode;
        }
        return ApiErrorKind::Other;
    };
    if e.is_timeout() {
        ApiErrorKind::Timeout
    } else if e.is_connect() {
        ApiErrorKind::Connect
    } else if e.is_status() {
        ApiErrorKind::Status
    } else if e.is_decode() {
        ApiErrorKind::Decode
    } else {
        ApiErrorKind::Other
    }
}

#[derive(Clone)]
pub struct PolymarketClient {
    data_api_url: String,
    gamma_api_url: String,
    http: reqwest::Client,
}

impl PolymarketClient {
    /// `timeout` is the transport-level deadline applied to every request.
    pub fn new(data_api_url: &str, gamma_api_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            data_api_url: data_api_url.trim_end_matches('/').to_string(),
            gamma_api_url: gamma_api_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn data_api_url(&self) -> &str {
        &self.data_api_url
    }

    pub fn gamma_api_url(&self) -> &str {
        &self.gamma_api_url
    }

    pub fn positions_url(&self, user: &str, query: &PositionsQuery) -> Result<String> {
        let mut url = Url::parse(&format!("{}/positions", self.data_api_url))?;
        {
            let mut qp = url.query_pairs_mut();
            qp.append_pair("sizeThreshold", &query.size_threshold.to_string());
            qp.append_pair("limit", &query.limit.min(MAX_PAGE_LIMIT).to_string());
            qp.append_pair("offset", &query.offset.min(MAX_PAGE_OFFSET).to_string());
            qp.append_pair("sortBy", query.sort_by.as_str());
            qp.append_pair("sortDirection", query.sort_direction.as_str());
            qp.append_pair("user", user);
        }
        Ok(url.to_string())
    }

    pub fn closed_positions_url(&self, user: &str, query: &ClosedPositionsQuery) -> Result<String> {
        let mut url = Url::parse(&format!("{}/closed-positions", self.data_api_url))?;
        {
            let mut qp = url.query_pairs_mut();
            qp.append_pair("limit", &query.limit.min(MAX_PAGE_LIMIT).to_string());
            qp.append_pair("offset", &query.offset.min(MAX_PAGE_OFFSET).to_string());
            qp.append_pair("sortBy", query.sort_by.as_str());
            qp.append_pair("sortDirection", query.sort_direction.as_str());
            qp.append_pair("user", user);
        }
        Ok(url.to_string())
    }

    pub fn market_by_slug_url(&self, slug: &str) -> String {
        format!(
            "{}/markets/slug/{}",
            self.gamma_api_url,
            urlencoding::encode(slug)
        )
    }

    /// Current positions for one wallet.
    pub async fn fetch_positions(
        &self,
        user: &str,
        query: &PositionsQuery,
    ) -> Result<Vec<ApiPosition>> {
        let url = self.positions_url(user, query)?;
        self.get_json("positions", &url).await
    }

    /// Closed/historical positions for one wallet. Every returned item is
    /// closed by upstream definition; no further filtering happens here.
    pub async fn fetch_closed_positions(
        &self,
        user: &str,
        query: &ClosedPositionsQuery,
    ) -> Result<Vec<ApiPosition>> {
        let url = self.closed_positions_url(user, query)?;
        self.get_json("closed_positions", &url).await
    }

    /// Market metadata for one slug from the Gamma API.
    pub async fn fetch_market_by_slug(&self, slug: &str) -> Result<GammaMarket> {
        let url = self.market_by_slug_url(slug);
        self.get_json("gamma_market_slug", &url).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &'static str,
        url: &str,
    ) -> Result<T> {
        let start = Instant::now();
        let res = async {
            let body = self
                .http
                .get(url)
                .send()
                .await?
                .error_for_status()?
                .text()
                .await?;
            Ok(serde_json::from_str(&body)?)
        }
        .await;
        let ms = start.elapsed().as_secs_f64() * 1000.0;
        metrics::histogram!("arena_gateway_latency_ms", "endpoint" => endpoint).record(ms);
        match res {
            Ok(v) => {
                metrics::counter!("arena_gateway_requests_total", "endpoint" => endpoint, "status" => "ok").increment(1);
                Ok(v)
            }
            Err(e) => {
                metrics::counter!("arena_gateway_requests_total", "endpoint" => endpoint, "status" => "error").increment(1);
                metrics::counter!(
                    "arena_gateway_errors_total",
                    "endpoint" => endpoint,
                    "kind" => classify_api_error(&e).as_str()
                )
                .increment(1);
                Err(e)
            }
        }
    }
}
