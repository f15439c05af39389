//! Data models for Apex Stats.
//!
//! Everything the pipeline produces is described here: the parsed [`Snapshot`],
//! the derived [`TrendBoard`] and [`HistoryPoint`] series, and the
//! [`StatsView`] handed to whatever renders them.
//!
//! Snapshots are immutable once built. The trend board and the history series
//! are owned by the acquisition service and replaced only by a refresh cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One parsed, point-in-time reading of the upstream status feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Concurrently active users.
    pub online: u64,

    /// Users observed so far in the current day.
    pub today: u64,

    pub new_users: u64,

    /// Lifetime total. Assumed non-decreasing upstream, not enforced here.
    pub all_time: u64,

    /// Per-country breakdown, sorted descending by `count`.
    pub countries: Vec<CountryStat>,

    /// When this snapshot was constructed locally (UTC).
    pub captured_at: DateTime<Utc>,
}

impl Snapshot {
    /// A snapshot with every numeric field at zero and no countries.
    ///
    /// Returned both for a legitimately empty feed and for an unreachable one;
    /// only the accompanying [`SyncStatus`] tells them apart.
    pub fn empty(captured_at: DateTime<Utc>) -> Self {
        Self {
            online: 0,
            today: 0,
            new_users: 0,
            all_time: 0,
            countries: Vec::new(),
            captured_at,
        }
    }

    /// Read one tracked metric.
    pub fn metric(&self, metric: Metric) -> u64 {
        match metric {
            Metric::Online => self.online,
            Metric::Today => self.today,
            Metric::NewUsers => self.new_users,
            Metric::AllTime => self.all_time,
        }
    }
}

/// Country names with a known flag image code.
const FLAG_CODES: &[(&str, &str)] = &[
    ("united states", "us"),
    ("mexico", "mx"),
    ("canada", "ca"),
    ("brazil", "br"),
    ("united kingdom", "gb"),
    ("germany", "de"),
    ("france", "fr"),
    ("india", "in"),
    ("china", "cn"),
    ("japan", "jp"),
    ("australia", "au"),
];

/// A single country's share of the current user base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryStat {
    /// Free-form name as sent upstream. Lookups on it are case-insensitive.
    pub name: String,

    pub count: u64,

    /// `count` as a rounded share of all counts in the same snapshot (0..=100).
    ///
    /// Rounded independently per country, so the column may not sum to 100.
    pub percentage: u8,
}

impl CountryStat {
    /// Lowercase ISO 3166-1 alpha-2 code used for flag images, if known.
    pub fn flag_code(&self) -> Option<&'static str> {
        FLAG_CODES
            .iter()
            .find(|(name, _)| self.name.eq_ignore_ascii_case(name))
            .map(|(_, code)| *code)
    }
}

/// The metrics tracked by the trend engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    Online,
    Today,
    NewUsers,
    AllTime,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::Online,
        Metric::Today,
        Metric::NewUsers,
        Metric::AllTime,
    ];
}

/// Direction of change between two consecutive fresh snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Up,
    Down,
}

/// Magnitude and direction of change for one metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendIndicator {
    /// Absolute percentage change, rounded to one decimal place. Never negative.
    pub magnitude: f64,

    pub direction: Direction,
}

/// Trend indicators for every tracked metric.
///
/// Lives across refreshes: a metric whose value did not change keeps the
/// indicator it had, rather than resetting to neutral.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendBoard {
    pub online: TrendIndicator,
    pub today: TrendIndicator,
    pub new_users: TrendIndicator,
    pub all_time: TrendIndicator,
}

impl TrendBoard {
    pub fn get(&self, metric: Metric) -> TrendIndicator {
        match metric {
            Metric::Online => self.online,
            Metric::Today => self.today,
            Metric::NewUsers => self.new_users,
            Metric::AllTime => self.all_time,
        }
    }

    pub fn set(&mut self, metric: Metric, indicator: TrendIndicator) {
        let slot = match metric {
            Metric::Online => &mut self.online,
            Metric::Today => &mut self.today,
            Metric::NewUsers => &mut self.new_users,
            Metric::AllTime => &mut self.all_time,
        };
        *slot = indicator;
    }
}

/// One calendar day's persisted aggregate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayBucket {
    /// Latest live `online` value seen that day.
    pub current: u64,

    /// Highest value ever observed that day. Only ever grows.
    pub peak: u64,
}

/// One entry of the fixed-length chart series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPoint {
    /// Short English weekday name, e.g. `Mon`.
    pub day_label: String,
    pub current: u64,
    pub peak: u64,
}

/// Outcome tag of a single acquisition cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncStatus {
    /// A strategy returned a usable payload and it was parsed.
    Fresh,

    /// Every strategy failed cleanly.
    Unreachable,

    /// Something inside the cycle went wrong that is not a network failure.
    SynchronizerFailure,
}

/// Read model handed to the presentation layer.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatsView {
    /// Last fresh snapshot. Kept when later cycles are unreachable.
    pub snapshot: Option<Snapshot>,

    pub trends: TrendBoard,

    /// Seven points, oldest first. Empty until history is restored or updated.
    pub history: Vec<HistoryPoint>,

    /// Status of the most recent completed cycle, if any has run.
    pub status: Option<SyncStatus>,

    /// User-facing problem description, if one should be shown.
    pub error: Option<String>,

    /// True while a cycle is in flight.
    pub syncing: bool,

    pub last_attempt: Option<DateTime<Utc>>,
}
