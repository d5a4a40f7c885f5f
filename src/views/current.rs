use crate::domain::{
    format_amount, Algorithm, Bookmark, DigitalCurrency, DigitalCurrencyAmount, KeyedPoolCurrent,
    Pool, PoolCurrent, RigProfile,
};
use crate::services::{
    pause_when_invisible, BookmarksService, Clock, MetricsService, SystemClock, VisibilitySignal,
};
use crate::rx::{combine_latest2, combine_latest3, interval, Feed, SharedFeeds, Subject};
use anyhow::Result;
use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const RESULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// A snapshot record joined with the bookmark that pins it, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct BookmarkedCurrent {
    pub current: KeyedPoolCurrent,
    pub bookmark: Option<Bookmark>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub key: String,
    pub name: String,
    pub pool: Pool,
    pub algo: Algorithm,
    pub coin: Option<DigitalCurrency>,
    pub amount: DigitalCurrencyAmount,
    pub age: String,
    pub pool_worker_proportion: Option<f64>,
    pub bookmark: Option<Bookmark>,
}

impl TableRow {
    pub fn value(&self) -> f64 {
        self.amount.amount
    }

    pub fn formatted_value(&self) -> String {
        format_amount(Some(&self.amount))
    }
}

/// Bookmarked records first, then by descending amount. A zero or missing
/// amount sorts as -1. Equal keys keep their input order.
pub fn join_bookmarks(results: &[KeyedPoolCurrent], bookmarks: &[Bookmark]) -> Vec<BookmarkedCurrent> {
    let mut joined: Vec<BookmarkedCurrent> = results
        .iter()
        .map(|result| BookmarkedCurrent {
            bookmark: bookmarks
                .iter()
                .find(|bookmark| bookmark.matches(&result.current))
                .copied(),
            current: result.clone(),
        })
        .collect();
    joined.sort_by_key(|row| {
        let amount = row.current.current.amount.amount;
        let amount = if amount == 0.0 || amount.is_nan() { -1.0 } else { amount };
        (row.bookmark.is_none(), OrderedFloat(-amount))
    });
    joined
}

fn plural(count: i64, one: &str, many: &str) -> String {
    if count <= 1 {
        one.to_string()
    } else {
        format!("{count} {many}")
    }
}

/// Humanized distance from `now`, e.g. "a few seconds ago" or "in 3 hours".
pub fn relative_age(timestamp: i64, now: DateTime<Utc>) -> String {
    let delta = now.timestamp() - timestamp;
    let elapsed = delta.unsigned_abs() as f64;

    let seconds = elapsed.round() as i64;
    let minutes = (elapsed / 60.0).round() as i64;
    let hours = (elapsed / 3_600.0).round() as i64;
    let days = (elapsed / 86_400.0).round() as i64;
    let months = (elapsed / 86_400.0 / 30.436_875).round() as i64;
    let years = (elapsed / 86_400.0 / 365.242_5).round() as i64;

    let phrase = if seconds < 45 {
        "a few seconds".to_string()
    } else if minutes < 45 {
        plural(minutes, "a minute", "minutes")
    } else if hours < 22 {
        plural(hours, "an hour", "hours")
    } else if days < 26 {
        plural(days, "a day", "days")
    } else if months < 11 {
        plural(months, "a month", "months")
    } else {
        plural(years, "a year", "years")
    };

    if delta < 0 {
        format!("in {phrase}")
    } else {
        format!("{phrase} ago")
    }
}

pub fn to_rows(data: &[BookmarkedCurrent], now: DateTime<Utc>) -> Vec<TableRow> {
    data.iter()
        .map(|row| {
            let current = &row.current.current;
            TableRow {
                key: row.current.key.clone(),
                name: current.display_name(),
                pool: current.pool,
                algo: current.algo,
                coin: current.coin,
                amount: current.amount,
                age: relative_age(current.timestamp, now),
                pool_worker_proportion: current.pool_worker_proportion,
                bookmark: row.bookmark,
            }
        })
        .collect()
}

fn page_of<T: Clone>(items: &[T], page: usize, size: usize) -> Vec<T> {
    items
        .iter()
        .skip(page.saturating_mul(size))
        .take(size)
        .cloned()
        .collect()
}

#[derive(Debug, Clone)]
pub struct TableOptions {
    pub page_size: usize,
    pub filter_debounce: Duration,
    pub age_refresh: Duration,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            page_size: 10,
            filter_debounce: Duration::from_millis(500),
            age_refresh: Duration::from_secs(10),
        }
    }
}

#[derive(Clone)]
struct TableSource {
    metrics: MetricsService,
    bookmarks: BookmarksService,
    filter: Feed<Option<String>>,
    profile: Feed<RigProfile>,
    clock: Arc<dyn Clock>,
    options: TableOptions,
    joined: SharedFeeds<(), Vec<BookmarkedCurrent>>,
    rows: SharedFeeds<(), Vec<TableRow>>,
}

impl TableSource {
    fn joined(&self) -> Feed<Vec<BookmarkedCurrent>> {
        let source = self.clone();
        self.joined.share((), move || {
            let stats = source.metrics.profitability_stats(
                source.filter.clone().debounce(source.options.filter_debounce),
                source.profile.clone(),
            );
            combine_latest2(stats, source.bookmarks.pool_coins_or_algos(), |results, bookmarks| {
                join_bookmarks(results, bookmarks)
            })
        })
    }

    fn rows(&self) -> Feed<Vec<TableRow>> {
        let source = self.clone();
        self.rows.share((), move || {
            let clock = source.clock.clone();
            combine_latest2(source.joined(), interval(source.options.age_refresh), move |data, _| {
                to_rows(data, clock.now())
            })
            .debounce(RESULT_DEBOUNCE)
        })
    }
}

/// The live profitability table: joined with bookmarks, sorted, aged and paged.
pub struct CurrentTable {
    source: TableSource,
    bookmarks: BookmarksService,
    visibility: VisibilitySignal,
    page: Subject<usize>,
    page_size: Subject<usize>,
    highlight: Subject<Vec<String>>,
}

impl CurrentTable {
    pub fn new(
        metrics: MetricsService,
        bookmarks: BookmarksService,
        visibility: VisibilitySignal,
        filter: Feed<Option<String>>,
        profile: Feed<RigProfile>,
        options: TableOptions,
    ) -> Self {
        let page_size = Subject::new(options.page_size);
        Self {
            source: TableSource {
                metrics,
                bookmarks: bookmarks.clone(),
                filter,
                profile,
                clock: Arc::new(SystemClock),
                options,
                joined: SharedFeeds::new(),
                rows: SharedFeeds::new(),
            },
            bookmarks,
            visibility,
            page: Subject::new(0),
            page_size,
            highlight: Subject::new(Vec::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.source.clock = clock;
        self
    }

    /// Rows on the current page; paused while the dashboard is hidden.
    pub fn page_rows(&self) -> Feed<Vec<TableRow>> {
        let source = self.source.clone();
        let (page, size) = (self.page.clone(), self.page_size.clone());
        pause_when_invisible(&self.visibility, move || {
            combine_latest3(source.rows(), page.feed(), size.feed(), |rows, page, size| {
                page_of(rows, *page, *size)
            })
        })
    }

    /// Records on the current page, for the history charts.
    pub fn page_currents(&self) -> Feed<Vec<PoolCurrent>> {
        let source = self.source.clone();
        let (page, size) = (self.page.clone(), self.page_size.clone());
        pause_when_invisible(&self.visibility, move || {
            combine_latest3(source.joined(), page.feed(), size.feed(), |data, page, size| {
                page_of(data, *page, *size)
                    .into_iter()
                    .map(|row| row.current.current)
                    .collect()
            })
        })
    }

    /// Number of rows across all pages.
    pub fn page_total(&self) -> Feed<usize> {
        self.source.rows().map(|rows| rows.len())
    }

    pub fn set_page(&self, page: usize) {
        self.page.next(page);
    }

    pub fn set_page_size(&self, size: usize) {
        self.page_size.next(size.max(1));
    }

    /// Removes the row's bookmark, or pins the row when it has none.
    pub async fn toggle_bookmark(&self, row: &TableRow) -> Result<()> {
        if let Some(bookmark) = row.bookmark {
            return self.bookmarks.remove_pool_coin_or_algo(bookmark).await;
        }

        let bookmark = if row.pool.is_coin_focused() {
            row.coin.map(|coin| Bookmark::Coin {
                pool: row.pool,
                coin,
            })
        } else {
            Some(Bookmark::Algo {
                pool: row.pool,
                algo: row.algo,
            })
        };
        match bookmark {
            Some(bookmark) => {
                self.bookmarks.add_pool_coin_or_algo(bookmark).await?;
            }
            None => debug!(key = %row.key, "row cannot be bookmarked"),
        }
        Ok(())
    }

    pub fn highlight(&self, row: &TableRow) {
        self.highlight.next(vec![row.key.clone()]);
    }

    pub fn unhighlight(&self) {
        self.highlight.next(Vec::new());
    }

    pub fn highlighted(&self) -> Feed<Vec<String>> {
        self.highlight.feed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn keyed(pool: Pool, algo: Algorithm, coin: Option<DigitalCurrency>, amount: f64) -> KeyedPoolCurrent {
        let current = PoolCurrent {
            pool,
            algo,
            coin,
            amount: DigitalCurrencyAmount::new(DigitalCurrency::BTC, amount),
            timestamp: 0,
            pool_worker_proportion: None,
        };
        KeyedPoolCurrent {
            key: current.key(),
            current,
        }
    }

    #[test]
    fn test_bookmarked_rows_sort_first_then_by_amount() {
        let results = vec![
            keyed(Pool::Nicehash, Algorithm::X11, None, 0.002),
            keyed(Pool::Nicehash, Algorithm::Scrypt, None, 0.0),
            keyed(Pool::Ahashpool, Algorithm::X11, None, 0.005),
            keyed(Pool::Nanopool, Algorithm::Equihash, Some(DigitalCurrency::ZEC), 0.001),
        ];
        let bookmarks = vec![Bookmark::Coin {
            pool: Pool::Nanopool,
            coin: DigitalCurrency::ZEC,
        }];

        let joined = join_bookmarks(&results, &bookmarks);
        let keys: Vec<&str> = joined.iter().map(|row| row.current.key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["nanopool/ZEC", "ahashpool/x11", "nicehash/x11", "nicehash/scrypt"]
        );
        assert!(joined[0].bookmark.is_some());
        assert!(joined[1].bookmark.is_none());
    }

    #[rstest]
    #[case(0, "a few seconds ago")]
    #[case(44, "a few seconds ago")]
    #[case(45, "a minute ago")]
    #[case(5 * 60, "5 minutes ago")]
    #[case(50 * 60, "an hour ago")]
    #[case(3 * 3_600, "3 hours ago")]
    #[case(23 * 3_600, "a day ago")]
    #[case(4 * 86_400, "4 days ago")]
    #[case(40 * 86_400, "a month ago")]
    #[case(400 * 86_400, "a year ago")]
    #[case(-120, "in 2 minutes")]
    fn test_relative_age(#[case] seconds_ago: i64, #[case] expected: &str) {
        let now = Utc.timestamp_opt(1_510_000_000, 0).unwrap();
        assert_eq!(relative_age(1_510_000_000 - seconds_ago, now), expected);
    }

    #[test]
    fn test_page_of() {
        let items: Vec<u32> = (0..25).collect();
        assert_eq!(page_of(&items, 0, 10).len(), 10);
        assert_eq!(page_of(&items, 2, 10), vec![20, 21, 22, 23, 24]);
        assert!(page_of(&items, 3, 10).is_empty());
    }
}
