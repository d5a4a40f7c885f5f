use super::currency::DigitalCurrencyAmount;
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Raw per-minute profitability sample.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PoolAlgoRecord {
    #[serde(default)]
    pub amount: DigitalCurrencyAmount,
    #[serde(default)]
    pub timestamp: i64,
}

/// Hourly or daily aggregate of raw samples.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PoolAlgoRollupRecord {
    #[serde(default)]
    pub min: DigitalCurrencyAmount,
    #[serde(default)]
    pub max: DigitalCurrencyAmount,
    #[serde(default)]
    pub sum: DigitalCurrencyAmount,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub timestamp: i64,
}

impl PoolAlgoRollupRecord {
    /// Mean of the bucket; zero for an empty bucket.
    pub fn average(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.sum.amount / self.count as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Granularity {
    PerMinute,
    PerHour,
    PerDay,
}

impl Granularity {
    pub const ALL: &'static [Granularity] = &[
        Granularity::PerMinute,
        Granularity::PerHour,
        Granularity::PerDay,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::PerMinute => "per-minute",
            Granularity::PerHour => "per-hour",
            Granularity::PerDay => "per-day",
        }
    }

    /// How many of the most recent records a chart asks for.
    pub fn sample_limit(&self) -> usize {
        match self {
            Granularity::PerMinute => 120,
            Granularity::PerHour => 72,
            Granularity::PerDay => 30,
        }
    }

    /// Age beyond which a point is dropped from the chart.
    pub fn retention(&self) -> Duration {
        let samples = self.sample_limit() as i64;
        match self {
            Granularity::PerMinute => Duration::minutes(samples),
            Granularity::PerHour => Duration::hours(samples),
            Granularity::PerDay => Duration::days(samples),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Granularity::ALL
            .iter()
            .copied()
            .find(|g| g.as_str() == s)
            .ok_or_else(|| format!("unknown granularity: {s}"))
    }
}

/// One chart point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeseriesPoint {
    pub name: DateTime<Utc>,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

/// A record type stored under a profitability granularity.
pub trait ProfitabilityRecord: DeserializeOwned + Clone + PartialEq + Send + Sync + 'static {
    fn timestamp(&self) -> i64;

    fn to_point(&self, multiplier: f64) -> TimeseriesPoint;
}

fn timestamp_to_datetime(seconds: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(seconds, 0).unwrap_or_default()
}

impl ProfitabilityRecord for PoolAlgoRecord {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }

    fn to_point(&self, multiplier: f64) -> TimeseriesPoint {
        TimeseriesPoint {
            name: timestamp_to_datetime(self.timestamp),
            value: self.amount.amount * multiplier,
            min: None,
            max: None,
        }
    }
}

impl ProfitabilityRecord for PoolAlgoRollupRecord {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }

    fn to_point(&self, multiplier: f64) -> TimeseriesPoint {
        TimeseriesPoint {
            name: timestamp_to_datetime(self.timestamp),
            value: self.average() * multiplier,
            min: Some(self.min.amount * multiplier),
            max: Some(self.max.amount * multiplier),
        }
    }
}

/// Type-level granularity; ties a profitability subtree to its record type.
pub trait GranularityKind: Send + Sync + 'static {
    type Record: ProfitabilityRecord;
    const GRANULARITY: Granularity;
}

pub struct PerMinute;
pub struct PerHour;
pub struct PerDay;

impl GranularityKind for PerMinute {
    type Record = PoolAlgoRecord;
    const GRANULARITY: Granularity = Granularity::PerMinute;
}

impl GranularityKind for PerHour {
    type Record = PoolAlgoRollupRecord;
    const GRANULARITY: Granularity = Granularity::PerHour;
}

impl GranularityKind for PerDay {
    type Record = PoolAlgoRollupRecord;
    const GRANULARITY: Granularity = Granularity::PerDay;
}

/// Time series for one pool-current key, ready for charting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolAlgoData {
    pub key: String,
    pub algo: String,
    pub pool: String,
    pub name: String,
    pub series: Vec<TimeseriesPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub most_recent: Option<TimeseriesPoint>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::currency::DigitalCurrency;

    #[test]
    fn test_rollup_average_guards_empty_bucket() {
        let mut rollup = PoolAlgoRollupRecord {
            sum: DigitalCurrencyAmount::new(DigitalCurrency::BTC, 0.6),
            count: 3,
            ..Default::default()
        };
        assert!((rollup.average() - 0.2).abs() < 1e-12);

        rollup.count = 0;
        assert_eq!(rollup.average(), 0.0);
    }

    #[test]
    fn test_rollup_point_scales_min_max() {
        let rollup = PoolAlgoRollupRecord {
            min: DigitalCurrencyAmount::new(DigitalCurrency::BTC, 1.0),
            max: DigitalCurrencyAmount::new(DigitalCurrency::BTC, 3.0),
            sum: DigitalCurrencyAmount::new(DigitalCurrency::BTC, 4.0),
            count: 2,
            timestamp: 60,
        };
        let point = rollup.to_point(10.0);
        assert_eq!(point.value, 20.0);
        assert_eq!(point.min, Some(10.0));
        assert_eq!(point.max, Some(30.0));
        assert_eq!(point.name.timestamp(), 60);
    }

    #[test]
    fn test_granularity_windows() {
        assert_eq!(Granularity::PerMinute.retention(), Duration::minutes(120));
        assert_eq!(Granularity::PerHour.retention(), Duration::hours(72));
        assert_eq!(Granularity::PerDay.retention(), Duration::days(30));
        assert_eq!("per-hour".parse::<Granularity>(), Ok(Granularity::PerHour));
    }
}
