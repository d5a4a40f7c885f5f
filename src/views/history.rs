use crate::domain::{Granularity, PoolAlgoData, PoolCurrent, RigProfile};
use crate::rx::{combine_all, combine_latest2, Feed};
use crate::services::{pause_when_invisible, MetricsService, VisibilitySignal};
use anyhow::Result;
use csv::Writer;

/// A chart series with its highlight state.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub data: PoolAlgoData,
    pub highlighted: bool,
}

/// History charts for the rows shown in the table.
#[derive(Clone)]
pub struct HistoryPanel {
    metrics: MetricsService,
    visibility: VisibilitySignal,
}

impl HistoryPanel {
    pub fn new(metrics: MetricsService, visibility: VisibilitySignal) -> Self {
        Self { metrics, visibility }
    }

    /// One series per current row at `granularity`, in row order.
    pub fn series(
        &self,
        rows: Feed<Vec<PoolCurrent>>,
        profile: Feed<RigProfile>,
        granularity: Granularity,
    ) -> Feed<Vec<PoolAlgoData>> {
        let metrics = self.metrics.clone();
        pause_when_invisible(&self.visibility, move || {
            let metrics = metrics.clone();
            let profile = profile.clone();
            rows.clone().switch_map(move |rows| {
                combine_all(
                    rows.iter()
                        .map(|row| metrics.timeseries(row, profile.clone(), granularity))
                        .collect(),
                )
            })
        })
    }

    /// Marks the series whose key is in the highlight set.
    pub fn with_highlight(
        series: Feed<Vec<PoolAlgoData>>,
        highlight: Feed<Vec<String>>,
    ) -> Feed<Vec<ChartSeries>> {
        combine_latest2(series, highlight, |series, highlight| {
            series
                .iter()
                .map(|data| ChartSeries {
                    highlighted: highlight.contains(&data.key),
                    data: data.clone(),
                })
                .collect()
        })
    }
}

/// Writes every point of every series as CSV.
pub fn export_csv<W: std::io::Write>(series: &[PoolAlgoData], writer: W) -> Result<()> {
    let mut wtr = Writer::from_writer(writer);

    wtr.write_record(["key", "name", "timestamp", "value", "min", "max"])?;
    for data in series {
        for point in &data.series {
            wtr.write_record([
                data.key.clone(),
                data.name.clone(),
                point.name.to_rfc3339(),
                point.value.to_string(),
                point.min.map(|v| v.to_string()).unwrap_or_default(),
                point.max.map(|v| v.to_string()).unwrap_or_default(),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TimeseriesPoint;
    use chrono::{TimeZone, Utc};

    fn data(key: &str, values: &[f64]) -> PoolAlgoData {
        PoolAlgoData {
            key: key.to_string(),
            algo: "x11".to_string(),
            pool: "nicehash".to_string(),
            name: "nicehash - x11".to_string(),
            series: values
                .iter()
                .enumerate()
                .map(|(i, value)| TimeseriesPoint {
                    name: Utc.timestamp_opt(60 * i as i64, 0).unwrap(),
                    value: *value,
                    min: None,
                    max: None,
                })
                .collect(),
            most_recent: None,
        }
    }

    #[test]
    fn test_export_csv() {
        let mut out = Vec::new();
        export_csv(&[data("nicehash/x11", &[1.5, 2.0])], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "key,name,timestamp,value,min,max");
        assert_eq!(lines[1], "nicehash/x11,nicehash - x11,1970-01-01T00:00:00+00:00,1.5,,");
        assert_eq!(lines.len(), 3);
    }

    #[tokio::test]
    async fn test_highlight_marks_matching_keys() {
        let series = Feed::constant(vec![data("a", &[]), data("b", &[])]);
        let highlight = Feed::constant(vec!["b".to_string()]);
        let marked = HistoryPanel::with_highlight(series, highlight)
            .first()
            .await
            .unwrap()
            .unwrap();
        assert!(!marked[0].highlighted);
        assert!(marked[1].highlighted);
    }
}
