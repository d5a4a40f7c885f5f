use crate::domain::{
    Granularity, GranularityKind, KeyedPoolCurrent, PerDay, PerHour, PerMinute, PoolAlgoData,
    PoolCurrent, ProfitabilityRecord, RigProfile,
};
use crate::repository::{paths, DatabaseAdaptor, ListOptions};
use crate::rx::{combine_latest2, combine_latest3, Feed, SharedFeeds};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

/// Source of the current time for retention cut-offs.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at one instant.
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Keeps the records whose `"{pool} - {algo}"` label contains `filter`
/// (case-insensitive) and rescales their amounts for `profile`.
pub fn scale_snapshot(
    records: &[PoolCurrent],
    filter: Option<&str>,
    profile: &RigProfile,
) -> Vec<KeyedPoolCurrent> {
    let needle = filter
        .map(str::to_lowercase)
        .filter(|needle| !needle.is_empty());
    records
        .iter()
        .filter(|record| match &needle {
            Some(needle) => record.display_name().to_lowercase().contains(needle.as_str()),
            None => true,
        })
        .map(|record| {
            let mut current = record.clone();
            current.amount = record.amount.scaled(profile.multiplier(record.algo));
            KeyedPoolCurrent {
                key: record.key(),
                current,
            }
        })
        .collect()
}

/// Cache key of a time series: the coin names coin records, the algorithm the rest.
pub fn timeseries_key(current: &PoolCurrent, granularity: Granularity) -> String {
    format!("{} - {} - {}", current.pool, current.target(), granularity)
}

/// Converts records into chart points, dropping those older than the
/// granularity's retention window.
pub fn build_series<R: ProfitabilityRecord>(
    current: &PoolCurrent,
    granularity: Granularity,
    records: &[R],
    multiplier: f64,
    now: DateTime<Utc>,
) -> PoolAlgoData {
    let cutoff = now - granularity.retention();
    let newest = records.iter().fold(None::<&R>, |newest, record| match newest {
        Some(best) if best.timestamp() >= record.timestamp() => Some(best),
        _ => Some(record),
    });

    PoolAlgoData {
        key: current.key(),
        algo: current.algo.to_string(),
        pool: current.pool.to_string(),
        name: current.display_name(),
        series: records
            .iter()
            .map(|record| record.to_point(multiplier))
            .filter(|point| point.name >= cutoff)
            .collect(),
        most_recent: newest.map(|record| record.to_point(multiplier)),
    }
}

/// Profitability snapshots and per-key time series, with one backend watch
/// per distinct location no matter how many consumers there are.
#[derive(Clone)]
pub struct MetricsService {
    adaptor: DatabaseAdaptor,
    latest: SharedFeeds<(), Vec<PoolCurrent>>,
    timeseries: SharedFeeds<String, PoolAlgoData>,
    clock: Arc<dyn Clock>,
}

impl MetricsService {
    pub fn new(adaptor: DatabaseAdaptor) -> Self {
        Self::with_clock(adaptor, Arc::new(SystemClock))
    }

    pub fn with_clock(adaptor: DatabaseAdaptor, clock: Arc<dyn Clock>) -> Self {
        Self {
            adaptor,
            latest: SharedFeeds::new(),
            timeseries: SharedFeeds::new(),
            clock,
        }
    }

    fn latest(&self) -> Feed<Vec<PoolCurrent>> {
        let adaptor = self.adaptor.clone();
        self.latest.share((), move || {
            adaptor.list(&paths::latest(), ListOptions::default())
        })
    }

    pub fn profitability_stats(
        &self,
        filter: Feed<Option<String>>,
        profile: Feed<RigProfile>,
    ) -> Feed<Vec<KeyedPoolCurrent>> {
        combine_latest3(self.latest(), filter, profile, |records, filter, profile| {
            scale_snapshot(records, filter.as_deref(), profile)
        })
    }

    /// Shared time series for `current` at `granularity`. The profile feed of
    /// the request that starts the series is the one it keeps using.
    pub fn timeseries(
        &self,
        current: &PoolCurrent,
        profile: Feed<RigProfile>,
        granularity: Granularity,
    ) -> Feed<PoolAlgoData> {
        match granularity {
            Granularity::PerMinute => self.watch_profitability::<PerMinute>(current, profile),
            Granularity::PerHour => self.watch_profitability::<PerHour>(current, profile),
            Granularity::PerDay => self.watch_profitability::<PerDay>(current, profile),
        }
    }

    /// Number of time series with a live producer.
    pub fn live_series(&self) -> usize {
        self.timeseries.len()
    }

    fn watch_profitability<G: GranularityKind>(
        &self,
        current: &PoolCurrent,
        profile: Feed<RigProfile>,
    ) -> Feed<PoolAlgoData> {
        let key = timeseries_key(current, G::GRANULARITY);
        let adaptor = self.adaptor.clone();
        let clock = self.clock.clone();
        let current = current.clone();
        debug!(key = %key, "time series requested");
        self.timeseries.share(key, move || {
            let path = paths::profitability::<G>(current.pool, current.target(), current.algo);
            let options = ListOptions::last(G::GRANULARITY.sample_limit()).by_priority();
            let records = adaptor.list(&path, options);
            let algo = current.algo;
            let multiplier = profile.map(move |profile| profile.multiplier(algo));
            combine_latest2(records, multiplier, move |records, multiplier| {
                build_series(&current, G::GRANULARITY, records, *multiplier, clock.now())
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Algorithm, DigitalCurrency, DigitalCurrencyAmount, Pool, PoolAlgoRecord};
    use crate::repository::Repository;
    use chrono::TimeZone;
    use serde_json::json;

    const NOW: i64 = 1_510_000_000;

    fn record(pool: Pool, algo: Algorithm, amount: f64) -> PoolCurrent {
        PoolCurrent {
            pool,
            algo,
            coin: None,
            amount: DigitalCurrencyAmount::new(DigitalCurrency::BTC, amount),
            timestamp: NOW,
            pool_worker_proportion: None,
        }
    }

    fn setup(tree: serde_json::Value) -> MetricsService {
        let repository = Repository::from_tree(tree);
        let clock = FixedClock(Utc.timestamp_opt(NOW, 0).unwrap());
        MetricsService::with_clock(repository.adaptor, Arc::new(clock))
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_scale_snapshot_filters_and_rescales() {
        let records = vec![
            record(Pool::Nicehash, Algorithm::X11, 0.001),
            record(Pool::Ahashpool, Algorithm::Equihash, 0.002),
        ];
        let profile = RigProfile::new("rig").with_hashrate(Algorithm::X11, 10.0);

        let all = scale_snapshot(&records, None, &profile);
        assert_eq!(all.len(), 2);
        assert!((all[0].current.amount.amount - 0.01).abs() < 1e-12);
        assert_eq!(all[1].current.amount.amount, 0.0);
        assert_eq!(all[0].key, "nicehash/x11");

        let filtered = scale_snapshot(&records, Some("AHASH"), &profile);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].current.pool, Pool::Ahashpool);

        assert_eq!(scale_snapshot(&records, Some(""), &profile).len(), 2);
    }

    #[test]
    fn test_timeseries_key_prefers_coin() {
        let mut current = record(Pool::Nanopool, Algorithm::Equihash, 0.0);
        current.coin = Some(DigitalCurrency::ZEC);
        assert_eq!(
            timeseries_key(&current, Granularity::PerHour),
            "nanopool - ZEC - per-hour"
        );
        let algo = record(Pool::Nicehash, Algorithm::X11, 0.0);
        assert_eq!(
            timeseries_key(&algo, Granularity::PerMinute),
            "nicehash - x11 - per-minute"
        );
    }

    #[test]
    fn test_build_series_retention_and_most_recent_ties() {
        let current = record(Pool::Nicehash, Algorithm::X11, 0.0);
        let now = Utc.timestamp_opt(NOW, 0).unwrap();
        let at = |offset: i64, amount: f64| PoolAlgoRecord {
            amount: DigitalCurrencyAmount::new(DigitalCurrency::BTC, amount),
            timestamp: NOW - offset,
        };
        let records = vec![at(121 * 60, 1.0), at(120 * 60, 2.0), at(0, 3.0), at(0, 4.0)];

        let data = build_series(&current, Granularity::PerMinute, &records, 2.0, now);
        let values: Vec<f64> = data.series.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![4.0, 6.0, 8.0]);
        assert_eq!(data.most_recent.map(|p| p.value), Some(6.0));
        assert_eq!(data.name, "nicehash - x11");
        assert_eq!(data.key, "nicehash/x11");

        let empty = build_series::<PoolAlgoRecord>(&current, Granularity::PerMinute, &[], 1.0, now);
        assert!(empty.series.is_empty());
        assert_eq!(empty.most_recent, None);
    }

    #[tokio::test]
    async fn test_profitability_stats_reacts_to_filter_and_profile() {
        let service = setup(json!({"v2": {"pool": {"latest": {
            "a": {"pool": "nicehash", "algo": "x11", "amount": {"currency": "BTC", "amount": 0.001}, "timestamp": NOW},
            "b": {"pool": "ahashpool", "algo": "x11", "amount": {"currency": "BTC", "amount": 0.002}, "timestamp": NOW},
        }}}}));
        let filter = crate::rx::Subject::new(None::<String>);
        let profile = crate::rx::Subject::new(RigProfile::identity());

        let mut stats = service.profitability_stats(filter.feed(), profile.feed());
        assert_eq!(stats.next().await.unwrap().unwrap().len(), 2);

        filter.next(Some("nicehash".to_string()));
        let narrowed = stats.next().await.unwrap().unwrap();
        assert_eq!(narrowed.len(), 1);
        assert!((narrowed[0].current.amount.amount - 0.001).abs() < 1e-12);

        profile.next(RigProfile::new("rig").with_hashrate(Algorithm::X11, 3.0));
        let rescaled = stats.next().await.unwrap().unwrap();
        assert!((rescaled[0].current.amount.amount - 0.003).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_latest_is_watched_once() {
        let service = setup(json!({}));
        let a = service.profitability_stats(Feed::constant(None), Feed::constant(RigProfile::identity()));
        let b = service.profitability_stats(Feed::constant(None), Feed::constant(RigProfile::identity()));
        settle().await;
        assert_eq!(service.adaptor.database().live_watches(), 1);

        drop((a, b));
        settle().await;
        assert_eq!(service.adaptor.database().live_watches(), 0);
    }

    #[tokio::test]
    async fn test_equal_keys_share_one_series() {
        let service = setup(json!({"v2": {"pool": {"algo": {"nicehash": {"x11": {"profitability": {"per-minute": {
            "1": {"amount": {"currency": "BTC", "amount": 0.5}, "timestamp": NOW},
        }}}}}}}}));
        let current = record(Pool::Nicehash, Algorithm::X11, 0.0);
        let profile = || Feed::constant(RigProfile::identity());

        let mut first = service.timeseries(&current, profile(), Granularity::PerMinute);
        let second = service.timeseries(&current, profile(), Granularity::PerMinute);
        let hourly = service.timeseries(&current, profile(), Granularity::PerHour);
        assert!(first.same_source(&second));
        assert!(!first.same_source(&hourly));
        assert_eq!(service.live_series(), 2);

        let data = first.next().await.unwrap().unwrap();
        assert_eq!(data.series.len(), 1);
        assert_eq!(data.most_recent.unwrap().value, 0.5);

        drop((first, second, hourly));
        settle().await;
        assert_eq!(service.live_series(), 0);

        let fresh = service.timeseries(&current, profile(), Granularity::PerMinute);
        assert_eq!(service.live_series(), 1);
        drop(fresh);
    }
}
