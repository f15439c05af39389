//! Trend computation between consecutive fresh snapshots.
//!
//! Each tracked metric gets a [`TrendIndicator`]: the absolute percentage
//! change from the previous fresh reading and whether it went up or down.
//! A metric that did not move keeps the indicator it already had, so the
//! display does not flicker back to neutral on a flat reading.

use crate::model::{Direction, Metric, Snapshot, TrendBoard, TrendIndicator};

/// Magnitude reported when a metric rises from zero.
const FROM_ZERO_MAGNITUDE: f64 = 100.0;

/// Compute the indicator for one metric.
///
/// # Rules
///
/// - `current == previous`: the `existing` indicator is returned unchanged
/// - `previous == 0`: magnitude 100 and `Up` if `current > 0`
/// - otherwise: `|current - previous| / previous * 100`, rounded to one decimal
pub fn compute_trend(current: u64, previous: u64, existing: TrendIndicator) -> TrendIndicator {
    if current == previous {
        return existing;
    }

    if previous == 0 {
        // current != previous, so current > 0 here
        return TrendIndicator {
            magnitude: FROM_ZERO_MAGNITUDE,
            direction: Direction::Up,
        };
    }

    let change = current.abs_diff(previous) as f64 / previous as f64 * 100.0;

    TrendIndicator {
        magnitude: round1(change),
        direction: if current >= previous {
            Direction::Up
        } else {
            Direction::Down
        },
    }
}

/// Update every metric on `board` from `previous` to `current`.
///
/// `previous` must be the last *fresh* snapshot; pass `None` for the first
/// one, in which case the board is left as it is.
pub fn update_trends(board: &mut TrendBoard, current: &Snapshot, previous: Option<&Snapshot>) {
    let Some(previous) = previous else {
        return;
    };

    for metric in Metric::ALL {
        let indicator = compute_trend(
            current.metric(metric),
            previous.metric(metric),
            board.get(metric),
        );
        board.set(metric, indicator);
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn up(magnitude: f64) -> TrendIndicator {
        TrendIndicator {
            magnitude,
            direction: Direction::Up,
        }
    }

    fn down(magnitude: f64) -> TrendIndicator {
        TrendIndicator {
            magnitude,
            direction: Direction::Down,
        }
    }

    fn snapshot(online: u64, today: u64, new_users: u64, all_time: u64) -> Snapshot {
        Snapshot {
            online,
            today,
            new_users,
            all_time,
            ..Snapshot::empty(Utc::now())
        }
    }

    #[test]
    fn test_trend_increase() {
        assert_eq!(compute_trend(15, 10, TrendIndicator::default()), up(50.0));
    }

    #[test]
    fn test_trend_decrease() {
        assert_eq!(compute_trend(5, 20, TrendIndicator::default()), down(75.0));
    }

    #[test]
    fn test_trend_from_zero() {
        assert_eq!(compute_trend(4, 0, TrendIndicator::default()), up(100.0));
    }

    #[test]
    fn test_trend_to_zero() {
        assert_eq!(compute_trend(0, 8, up(12.0)), down(100.0));
    }

    #[test]
    fn test_trend_unchanged_keeps_existing() {
        assert_eq!(compute_trend(7, 7, down(33.3)), down(33.3));
        assert_eq!(compute_trend(0, 0, up(100.0)), up(100.0));
    }

    #[test]
    fn test_trend_rounds_to_one_decimal() {
        // 1/3 = 33.333...%
        assert_eq!(compute_trend(4, 3, TrendIndicator::default()), up(33.3));
        // 2/3 = 66.666...%
        assert_eq!(compute_trend(1, 3, TrendIndicator::default()), down(66.7));
    }

    #[test]
    fn test_trend_magnitude_never_negative() {
        for (current, previous) in [(0, 1), (1, 1000), (1000, 1), (3, 9), (9, 3)] {
            let indicator = compute_trend(current, previous, TrendIndicator::default());
            assert!(indicator.magnitude >= 0.0);
            assert_eq!(indicator.direction == Direction::Up, current > previous);
        }
    }

    #[test]
    fn test_first_snapshot_leaves_board_neutral() {
        let mut board = TrendBoard::default();

        update_trends(&mut board, &snapshot(10, 20, 5, 100), None);

        assert_eq!(board, TrendBoard::default());
    }

    #[test]
    fn test_update_trends_per_metric() {
        let mut board = TrendBoard::default();
        board.today = down(10.0);

        update_trends(
            &mut board,
            &snapshot(15, 20, 0, 110),
            Some(&snapshot(10, 20, 5, 100)),
        );

        assert_eq!(board.online, up(50.0));
        assert_eq!(board.today, down(10.0));
        assert_eq!(board.new_users, down(100.0));
        assert_eq!(board.all_time, up(10.0));
    }
}
