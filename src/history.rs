//! Rolling 7-day activity history.
//!
//! Each calendar day (local time) gets one [`DayBucket`] keyed by its ISO date.
//! On every update today's bucket is rewritten, buckets older than the
//! retention window are pruned, and a fixed seven-point series is derived for
//! charts, zero-filling days that were never observed.
//!
//! Persistence is read-modify-write through a [`HistoryBackend`]. A blob that
//! cannot be decoded is treated as empty, and backend errors are logged, never
//! propagated: history must not get in the way of the snapshot itself.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Days, NaiveDate};
use tracing::warn;

use crate::model::{DayBucket, HistoryPoint};
use crate::storage::HistoryBackend;

/// Number of points in the chart series.
pub const SERIES_DAYS: u64 = 7;

/// Buckets dated more than this many days before today are pruned.
pub const RETENTION_DAYS: u64 = 7;

/// Persisted layout: ISO date string to bucket.
pub type BucketMap = BTreeMap<String, DayBucket>;

/// Day-bucketed history backed by a persistent blob.
#[derive(Clone)]
pub struct HistoryStore {
    backend: Arc<dyn HistoryBackend>,
    key: String,
}

impl HistoryStore {
    pub fn new(backend: Arc<dyn HistoryBackend>, key: &str) -> Self {
        Self {
            backend,
            key: key.to_string(),
        }
    }

    /// Fold a fresh reading into today's bucket and return the chart series.
    pub async fn record(
        &self,
        online: u64,
        today_count: u64,
        today: NaiveDate,
    ) -> Vec<HistoryPoint> {
        let mut buckets = self.load_buckets().await;

        apply_observation(&mut buckets, online, today_count, today);
        prune(&mut buckets, today);

        match serde_json::to_string(&buckets) {
            Ok(blob) => {
                if let Err(e) = self.backend.save(&self.key, &blob).await {
                    warn!(key = %self.key, error = %e, "Failed to persist history");
                }
            }
            Err(e) => warn!(key = %self.key, error = %e, "Failed to encode history"),
        }

        build_series(&buckets, today, Some(online))
    }

    /// The chart series as currently persisted, without writing anything.
    pub async fn series(&self, today: NaiveDate) -> Vec<HistoryPoint> {
        let mut buckets = self.load_buckets().await;
        prune(&mut buckets, today);
        build_series(&buckets, today, None)
    }

    async fn load_buckets(&self) -> BucketMap {
        match self.backend.load(&self.key).await {
            Ok(Some(blob)) => decode_buckets(&blob).unwrap_or_else(|| {
                warn!(key = %self.key, "Persisted history is corrupt, starting empty");
                BucketMap::new()
            }),
            Ok(None) => BucketMap::new(),
            Err(e) => {
                warn!(key = %self.key, error = %e, "Failed to load history, starting empty");
                BucketMap::new()
            }
        }
    }
}

/// Decode a persisted blob. `None` if it is not a valid bucket map.
pub fn decode_buckets(blob: &str) -> Option<BucketMap> {
    serde_json::from_str(blob).ok()
}

/// Overwrite today's `current` and raise its `peak`.
pub fn apply_observation(
    buckets: &mut BucketMap,
    online: u64,
    today_count: u64,
    today: NaiveDate,
) {
    let bucket = buckets.entry(date_key(today)).or_default();
    bucket.current = online;
    bucket.peak = bucket.peak.max(online).max(today_count);
}

/// Drop buckets older than the retention window and keys that are not dates.
pub fn prune(buckets: &mut BucketMap, today: NaiveDate) {
    let cutoff = today.checked_sub_days(Days::new(RETENTION_DAYS));

    buckets.retain(|key, _| match (parse_date_key(key), cutoff) {
        (Some(date), Some(cutoff)) => date >= cutoff,
        (Some(_), None) => true,
        (None, _) => false,
    });
}

/// Seven points, oldest first, ending with `today`.
///
/// When `live_online` is given it replaces today's `current`, so the last
/// point always matches the reading just taken.
pub fn build_series(
    buckets: &BucketMap,
    today: NaiveDate,
    live_online: Option<u64>,
) -> Vec<HistoryPoint> {
    (0..SERIES_DAYS)
        .rev()
        .map(|offset| {
            let date = today.checked_sub_days(Days::new(offset)).unwrap_or(today);
            let bucket = buckets.get(&date_key(date)).copied().unwrap_or_default();
            let current = match live_online {
                Some(online) if offset == 0 => online,
                _ => bucket.current,
            };

            HistoryPoint {
                day_label: date.format("%a").to_string(),
                current,
                peak: bucket.peak,
            }
        })
        .collect()
}

fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_date_key(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(key, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;

    const KEY: &str = "test.history";

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn bucket(current: u64, peak: u64) -> DayBucket {
        DayBucket { current, peak }
    }

    fn store() -> (HistoryStore, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        (HistoryStore::new(backend.clone(), KEY), backend)
    }

    #[test]
    fn test_apply_observation_new_day() {
        let mut buckets = BucketMap::new();

        apply_observation(&mut buckets, 5, 12, day(2024, 3, 10));

        assert_eq!(buckets.get("2024-03-10"), Some(&bucket(5, 12)));
    }

    #[test]
    fn test_peak_never_decreases() {
        let mut buckets = BucketMap::new();
        let today = day(2024, 3, 10);

        apply_observation(&mut buckets, 40, 10, today);
        apply_observation(&mut buckets, 3, 20, today);

        assert_eq!(buckets.get("2024-03-10"), Some(&bucket(3, 40)));
    }

    #[test]
    fn test_prune_boundaries() {
        let today = day(2024, 3, 10);
        let mut buckets = BucketMap::new();
        buckets.insert("2024-02-29".to_string(), bucket(1, 1)); // 10 days ago
        buckets.insert("2024-03-02".to_string(), bucket(2, 2)); // 8 days ago
        buckets.insert("2024-03-03".to_string(), bucket(3, 3)); // 7 days ago
        buckets.insert("2024-03-09".to_string(), bucket(4, 4));
        buckets.insert("not-a-date".to_string(), bucket(5, 5));

        prune(&mut buckets, today);

        let keys: Vec<&str> = buckets.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["2024-03-03", "2024-03-09"]);
    }

    #[test]
    fn test_series_is_seven_days_oldest_first() {
        let today = day(2024, 3, 10); // a Sunday
        let mut buckets = BucketMap::new();
        buckets.insert("2024-03-05".to_string(), bucket(7, 9));

        let series = build_series(&buckets, today, None);

        let labels: Vec<&str> = series.iter().map(|p| p.day_label.as_str()).collect();
        assert_eq!(labels, vec!["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"]);
        assert_eq!(series[1].current, 7);
        assert_eq!(series[1].peak, 9);
        assert!(series.iter().enumerate().all(|(i, p)| i == 1 || p.current == 0));
    }

    #[test]
    fn test_series_forces_live_value_today() {
        let today = day(2024, 3, 10);
        let mut buckets = BucketMap::new();
        buckets.insert("2024-03-10".to_string(), bucket(2, 30));

        let series = build_series(&buckets, today, Some(11));

        assert_eq!(series[6].current, 11);
        assert_eq!(series[6].peak, 30);
    }

    #[test]
    fn test_series_spans_month_and_year_boundary() {
        let series = build_series(&BucketMap::new(), day(2025, 1, 2), None);

        assert_eq!(series.len(), 7);
        assert_eq!(series[0].day_label, "Fri"); // 2024-12-27
        assert_eq!(series[6].day_label, "Thu"); // 2025-01-02
    }

    #[tokio::test]
    async fn test_record_persists_and_returns_series() {
        let (store, backend) = store();
        let today = day(2024, 3, 10);

        let series = store.record(5, 12, today).await;

        assert_eq!(series.len(), 7);
        assert_eq!(series[6].current, 5);
        assert_eq!(series[6].peak, 12);

        let blob = backend.load(KEY).await.unwrap().unwrap();
        let persisted = decode_buckets(&blob).unwrap();
        assert_eq!(persisted.get("2024-03-10"), Some(&bucket(5, 12)));
    }

    #[tokio::test]
    async fn test_record_prunes_old_buckets() {
        let (store, backend) = store();
        backend
            .insert(
                KEY,
                r#"{"2024-02-29":{"current":50,"peak":80},"2024-03-09":{"current":4,"peak":6}}"#,
            )
            .await;

        store.record(1, 1, day(2024, 3, 10)).await;

        let persisted = decode_buckets(&backend.load(KEY).await.unwrap().unwrap()).unwrap();
        assert!(!persisted.contains_key("2024-02-29"));
        assert_eq!(persisted.get("2024-03-09"), Some(&bucket(4, 6)));
    }

    #[tokio::test]
    async fn test_corrupt_blob_fails_open() {
        let (store, backend) = store();
        backend.insert(KEY, "{ definitely not json").await;

        let series = store.record(3, 4, day(2024, 3, 10)).await;

        assert_eq!(series.len(), 7);
        assert_eq!(series[6].current, 3);
        let persisted = decode_buckets(&backend.load(KEY).await.unwrap().unwrap()).unwrap();
        assert_eq!(persisted.len(), 1);
    }

    #[tokio::test]
    async fn test_series_reads_without_writing() {
        let (store, backend) = store();

        let series = store.series(day(2024, 3, 10)).await;

        assert_eq!(series.len(), 7);
        assert!(series.iter().all(|p| p.current == 0 && p.peak == 0));
        assert!(backend.load(KEY).await.unwrap().is_none());
    }
}
