//! Position reconciliation: separating genuinely open exposure from dust,
//! pending settlement, and zero-liquidity holdings, and inferring recently
//! closed positions from consecutive snapshots.

use crate::types::ApiPosition;
use serde::Serialize;
use std::collections::HashSet;

/// A fetched position is live only if it has strictly positive size, is not
/// flagged redeemable, and its current price is strictly positive. Missing
/// numeric fields read as zero and therefore fail the filter.
pub fn is_live(position: &ApiPosition) -> bool {
    position.effective_size() > 0.0
        && !position.is_redeemable()
        && position.current_price() > 0.0
}

pub fn filter_live(positions: Vec<ApiPosition>) -> Vec<ApiPosition> {
    positions.into_iter().filter(is_live).collect()
}

/// Identifiers present in the previous snapshot's top-position list but
/// absent from the latest one, in previous-list order.
///
/// This is a heuristic, not ground truth: it only sees positions large
/// enough to make the top-N list captured at snapshot time. A position that
/// shrank below the cutoff will look "closed" here.
pub fn recently_closed(previous_top: &[String], latest_top: &[String]) -> Vec<String> {
    let latest: HashSet<&str> = latest_top.iter().map(|s| s.trim()).collect();
    previous_top
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty() && !latest.contains(s))
        .map(str::to_string)
        .collect()
}

/// Counts and value-weighted average size across a model's live and closed
/// position sets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionStats {
    pub total_positions: usize,
    pub open_positions: usize,
    pub closed_positions: usize,
    pub avg_position_size: f64,
}

impl PositionStats {
    pub fn compute(live: &[ApiPosition], closed: &[ApiPosition]) -> Self {
        let open_positions = live.len();
        let closed_positions = closed.len();
        let total_positions = open_positions + closed_positions;

        let avg_position_size = if total_positions == 0 {
            0.0
        } else {
            let notional: f64 = live
                .iter()
                .chain(closed)
                .map(|p| p.effective_size() * p.average_price())
                .sum();
            notional / total_positions as f64
        };

        Self {
            total_positions,
            open_positions,
            closed_positions,
            avg_position_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(size: f64, redeemable: bool, cur_price: f64) -> ApiPosition {
        ApiPosition {
            size: Some(size),
            redeemable: Some(redeemable),
            cur_price: Some(cur_price),
            avg_price: Some(0.5),
            ..ApiPosition::default()
        }
    }

    #[test]
    fn test_live_filter_all_failing_combinations() {
        // Each disqualifier must exclude the position regardless of the
        // other two fields being valid.
        assert!(!is_live(&position(0.0, false, 0.6)));
        assert!(!is_live(&position(10.0, true, 0.6)));
        assert!(!is_live(&position(10.0, false, 0.0)));
        assert!(!is_live(&position(0.0, true, 0.0)));
        assert!(is_live(&position(10.0, false, 0.6)));
    }

    #[test]
    fn test_live_filter_missing_fields_fail() {
        let sparse = ApiPosition::default();
        assert!(!is_live(&sparse));
    }

    #[test]
    fn test_live_filter_uses_total_bought_fallback() {
        let p = ApiPosition {
            total_bought: Some(5.0),
            cur_price: Some(0.4),
            ..ApiPosition::default()
        };
        assert!(is_live(&p));
    }

    #[test]
    fn test_filter_live_keeps_only_live() {
        let input = vec![
            position(10.0, false, 0.6),
            position(0.0, false, 0.6),
            position(3.0, true, 0.6),
        ];
        let live = filter_live(input);
        assert_eq!(live.len(), 1);
    }

    #[test]
    fn test_recently_closed_is_prev_minus_latest() {
        let previous = vec!["mkt-a".to_string(), "mkt-b".to_string(), "mkt-c".to_string()];
        let latest = vec!["mkt-b".to_string()];
        assert_eq!(
            recently_closed(&previous, &latest),
            vec!["mkt-a".to_string(), "mkt-c".to_string()]
        );
    }

    #[test]
    fn test_recently_closed_trims_whitespace() {
        let previous = vec![" mkt-a ".to_string(), "mkt-b".to_string()];
        let latest = vec!["mkt-a".to_string()];
        assert_eq!(recently_closed(&previous, &latest), vec!["mkt-b".to_string()]);
    }

    #[test]
    fn test_recently_closed_empty_previous() {
        assert!(recently_closed(&[], &["mkt-a".to_string()]).is_empty());
    }

    #[test]
    fn test_stats_value_weighted_average() {
        // live: 10 * 0.5 = 5; closed: 20 * 0.5 = 10 -> (5 + 10) / 2 = 7.5
        let live = vec![position(10.0, false, 0.6)];
        let closed = vec![position(20.0, false, 0.0)];
        let stats = PositionStats::compute(&live, &closed);
        assert_eq!(stats.total_positions, 2);
        assert_eq!(stats.open_positions, 1);
        assert_eq!(stats.closed_positions, 1);
        assert!((stats.avg_position_size - 7.5).abs() < 1e-9);
    }

    #[test]
    fn test_stats_zero_guard() {
        let stats = PositionStats::compute(&[], &[]);
        assert_eq!(stats.total_positions, 0);
        assert_eq!(stats.avg_position_size, 0.0);
    }
}
