use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Position from Data API `/positions` and `/closed-positions`.
///
/// Both endpoints share one shape; `realized_pnl` is only meaningful for
/// closed positions. Every field is optional — the upstream occasionally
/// omits fields, and missing numbers are treated as zero downstream.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ApiPosition {
    #[serde(rename = "proxyWallet")]
    pub proxy_wallet: Option<String>,
    pub asset: Option<String>,
    #[serde(rename = "conditionId")]
    pub condition_id: Option<String>,
    pub size: Option<f64>,
    #[serde(rename = "avgPrice")]
    pub avg_price: Option<f64>,
    #[serde(rename = "initialValue")]
    pub initial_value: Option<f64>,
    #[serde(rename = "currentValue")]
    pub current_value: Option<f64>,
    #[serde(rename = "cashPnl")]
    pub cash_pnl: Option<f64>,
    #[serde(rename = "percentPnl")]
    pub percent_pnl: Option<f64>,
    #[serde(rename = "totalBought")]
    pub total_bought: Option<f64>,
    #[serde(rename = "realizedPnl")]
    pub realized_pnl: Option<f64>,
    #[serde(rename = "curPrice")]
    pub cur_price: Option<f64>,
    pub redeemable: Option<bool>,
    pub title: Option<String>,
    pub slug: Option<String>,
    pub icon: Option<String>,
    #[serde(rename = "eventSlug")]
    pub event_slug: Option<String>,
    pub outcome: Option<String>,
    #[serde(rename = "outcomeIndex")]
    pub outcome_index: Option<i32>,
    #[serde(rename = "endDate")]
    pub end_date: Option<String>,
}

impl ApiPosition {
    /// Position size, falling back to total bought when `size` is absent.
    pub fn effective_size(&self) -> f64 {
        self.size.or(self.total_bought).unwrap_or(0.0)
    }

    pub fn current_price(&self) -> f64 {
        self.cur_price.unwrap_or(0.0)
    }

    pub fn average_price(&self) -> f64 {
        self.avg_price.unwrap_or(0.0)
    }

    pub fn is_redeemable(&self) -> bool {
        self.redeemable.unwrap_or(false)
    }
}

/// Market from Gamma API `/markets/slug/{slug}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GammaMarket {
    pub question: Option<String>,
    pub category: Option<String>,
    pub slug: Option<String>,
    #[serde(rename = "volume24hr")]
    pub volume_24hr: Option<f64>,
    #[serde(rename = "volume24hrAmm")]
    pub volume_24hr_amm: Option<f64>,
    #[serde(rename = "volumeNum")]
    pub volume_num: Option<f64>,
    // Gamma serves outcome labels/prices either as JSON arrays or as
    // JSON-encoded strings, depending on the market.
    pub outcomes: Option<Value>,
    #[serde(rename = "shortOutcomes")]
    pub short_outcomes: Option<Value>,
    #[serde(rename = "outcomePrices")]
    pub outcome_prices: Option<Value>,
    pub image: Option<String>,
    pub icon: Option<String>,
    #[serde(rename = "imageOptimized")]
    pub image_optimized: Option<OptimizedImage>,
    #[serde(rename = "iconOptimized")]
    pub icon_optimized: Option<OptimizedImage>,
    #[serde(rename = "endDate")]
    pub end_date: Option<String>,
    #[serde(rename = "endDateIso")]
    pub end_date_iso: Option<String>,
    #[serde(rename = "gameStartTime")]
    pub game_start_time: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OptimizedImage {
    #[serde(rename = "imageUrlOptimized")]
    pub image_url_optimized: Option<String>,
    #[serde(rename = "imageUrlSource")]
    pub image_url_source: Option<String>,
}

impl GammaMarket {
    pub fn outcome_labels(&self) -> Option<Vec<String>> {
        string_array(self.short_outcomes.as_ref()).or_else(|| string_array(self.outcomes.as_ref()))
    }

    pub fn outcome_price_values(&self) -> Option<Vec<f64>> {
        number_array(self.outcome_prices.as_ref())
    }

    pub fn image_url(&self) -> Option<String> {
        self.image_optimized
            .as_ref()
            .and_then(|o| o.image_url_optimized.clone())
            .or_else(|| self.image.clone())
    }

    pub fn icon_url(&self) -> Option<String> {
        self.icon_optimized
            .as_ref()
            .and_then(|o| {
                o.image_url_optimized
                    .clone()
                    .or_else(|| o.image_url_source.clone())
            })
            .or_else(|| self.icon.clone())
    }

    /// Calendar end date: `endDateIso` when present, otherwise the date part
    /// of `endDate`.
    pub fn end_date_iso_or_derived(&self) -> Option<String> {
        self.end_date_iso.clone().or_else(|| {
            self.end_date
                .as_ref()
                .filter(|d| d.len() >= 10)
                .map(|d| d[..10].to_string())
        })
    }

    pub fn volume_24hr_any(&self) -> f64 {
        self.volume_24hr.or(self.volume_24hr_amm).unwrap_or(0.0)
    }
}

/// Normalize a value that is either a JSON array of strings or a
/// JSON-encoded string containing one.
pub fn string_array(value: Option<&Value>) -> Option<Vec<String>> {
    let array = match value? {
        Value::Array(items) => items.clone(),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(items)) => items,
            _ => return None,
        },
        _ => return None,
    };
    Some(
        array
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                other => Some(other.to_string()),
            })
            .collect(),
    )
}

/// Like [`string_array`], but parses each element as a number. Elements that
/// fail to parse become 0.
pub fn number_array(value: Option<&Value>) -> Option<Vec<f64>> {
    let array = match value? {
        Value::Array(items) => items.clone(),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(items)) => items,
            _ => return None,
        },
        _ => return None,
    };
    Some(
        array
            .into_iter()
            .map(|v| match v {
                Value::Number(n) => n.as_f64().unwrap_or(0.0),
                Value::String(s) => s.parse().unwrap_or(0.0),
                _ => 0.0,
            })
            .collect(),
    )
}
