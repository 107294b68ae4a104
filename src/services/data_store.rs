use crate::error::{Error, Result};
use crate::models::{Candle, TimeSeries, WindowDescriptor};
use crate::services::csv_parser::parse_candles_from_path;
use crate::utils::get_cache_ttl_seconds;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Time source for cache expiry
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Anything that can produce the full candle sequence
pub trait CandleSource: Send + Sync {
    fn load(&self) -> Result<TimeSeries>;

    /// Short description for logs
    fn describe(&self) -> String;
}

/// Candle CSV on local disk
#[derive(Debug, Clone)]
pub struct CsvFileSource {
    path: PathBuf,
}

impl CsvFileSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl CandleSource for CsvFileSource {
    fn load(&self) -> Result<TimeSeries> {
        if !self.path.exists() {
            return Err(Error::DataLoad(format!("dataset not found: {}", self.path.display())));
        }
        let report = parse_candles_from_path(&self.path).map_err(|e| match e {
            Error::DataLoad(msg) => Error::DataLoad(msg),
            other => Error::DataLoad(format!("{}: {}", self.path.display(), other)),
        })?;

        if report.dropped_rows > 0 || report.duplicate_rows > 0 {
            warn!(
                dropped = report.dropped_rows,
                duplicates = report.duplicate_rows,
                "Discarded invalid or duplicate rows from {}",
                self.path.display()
            );
        }
        Ok(report.candles)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// One cache epoch: an immutable candle snapshot and when it was built
struct CacheEpoch {
    candles: Arc<TimeSeries>,
    loaded_at: DateTime<Utc>,
}

/// Dataset summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetStats {
    pub records: usize,
    pub first_date: Option<DateTime<Utc>>,
    pub last_date: Option<DateTime<Utc>>,
    pub years: Vec<i32>,
    pub max_high: Option<f64>,
    pub min_low: Option<f64>,
}

// Shared data store for passing between threads
pub type SharedDataStore = Arc<DataStore>;

/// In-memory candle store with TTL-based refresh
///
/// The snapshot is rebuilt off to the side and swapped in whole, so readers
/// always hold either the previous or the new sequence. Two requests racing
/// on a stale cache may both reload; the later swap wins.
pub struct DataStore {
    source: Box<dyn CandleSource>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    cache: RwLock<Option<Arc<CacheEpoch>>>,
}

impl DataStore {
    /// Create a store over the configured dataset file
    pub fn new(data_file: PathBuf) -> Self {
        let ttl_seconds = get_cache_ttl_seconds();
        info!(
            "Initializing DataStore with data_file={}, ttl={}s",
            data_file.display(),
            ttl_seconds
        );
        Self::with_source(
            Box::new(CsvFileSource::new(data_file)),
            Arc::new(SystemClock),
            ttl_seconds,
        )
    }

    pub fn with_source(source: Box<dyn CandleSource>, clock: Arc<dyn Clock>, ttl_seconds: i64) -> Self {
        Self {
            source,
            clock,
            ttl: Duration::seconds(ttl_seconds),
            cache: RwLock::new(None),
        }
    }

    fn is_fresh(&self, epoch: &CacheEpoch) -> bool {
        self.clock.now().signed_duration_since(epoch.loaded_at) < self.ttl
    }

    /// Current candle snapshot, reloading when the epoch has expired
    pub async fn snapshot(&self) -> Result<Arc<TimeSeries>> {
        {
            let cache = self.cache.read().await;
            if let Some(epoch) = cache.as_ref() {
                if self.is_fresh(epoch) {
                    return Ok(epoch.candles.clone());
                }
            }
        }

        let load_start = std::time::Instant::now();
        let candles = self.source.load()?;
        let epoch = Arc::new(CacheEpoch {
            candles: Arc::new(candles),
            loaded_at: self.clock.now(),
        });

        info!(
            records = epoch.candles.len(),
            "Loaded candle cache from {} in {:.2}ms",
            self.source.describe(),
            load_start.elapsed().as_secs_f64() * 1000.0
        );

        let candles = epoch.candles.clone();
        *self.cache.write().await = Some(epoch);
        Ok(candles)
    }

    /// Candles selected by a window descriptor
    pub async fn query(&self, window: WindowDescriptor) -> Result<Vec<Candle>> {
        let snapshot = self.snapshot().await?;
        select_window(&snapshot, window)
    }

    /// The final `n` candles
    pub async fn last_days(&self, n: usize) -> Result<Vec<Candle>> {
        let snapshot = self.snapshot().await?;
        last_days(&snapshot, n)
    }

    /// Every candle in calendar year `year` (possibly empty)
    pub async fn by_year(&self, year: i32) -> Result<Vec<Candle>> {
        let snapshot = self.snapshot().await?;
        Ok(by_year(&snapshot, year))
    }

    pub async fn stats(&self) -> Result<DatasetStats> {
        let snapshot = self.snapshot().await?;
        Ok(dataset_stats(&snapshot))
    }

    /// Force the next access to reload
    pub async fn invalidate(&self) {
        debug!("Invalidating candle cache");
        *self.cache.write().await = None;
    }

    /// Whether the next snapshot will be served without reloading
    pub async fn is_warm(&self) -> bool {
        let cache = self.cache.read().await;
        cache.as_ref().map_or(false, |epoch| self.is_fresh(epoch))
    }

    /// Age of the current epoch in seconds, `None` before the first load
    pub async fn cache_age_seconds(&self) -> Option<i64> {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .map(|epoch| self.clock.now().signed_duration_since(epoch.loaded_at).num_seconds())
    }
}

/// Apply a window descriptor to a candle slice
pub fn select_window(candles: &[Candle], window: WindowDescriptor) -> Result<Vec<Candle>> {
    match window {
        WindowDescriptor::Days(n) => last_days(candles, n),
        WindowDescriptor::CalendarYear(year) => Ok(by_year(candles, year)),
    }
}

/// The final `n` candles; fails when that selection is empty
pub fn last_days(candles: &[Candle], n: usize) -> Result<Vec<Candle>> {
    let take = n.min(candles.len());
    if take == 0 {
        return Err(Error::insufficient("last days window", n.max(1), candles.len()));
    }
    Ok(candles[candles.len() - take..].to_vec())
}

/// Every candle whose open time falls in `year`
pub fn by_year(candles: &[Candle], year: i32) -> Vec<Candle> {
    candles.iter().filter(|c| c.year() == year).cloned().collect()
}

pub fn dataset_stats(candles: &[Candle]) -> DatasetStats {
    let years: BTreeSet<i32> = candles.iter().map(Candle::year).collect();
    DatasetStats {
        records: candles.len(),
        first_date: candles.first().map(|c| c.time),
        last_date: candles.last().map(|c| c.time),
        years: years.into_iter().collect(),
        max_high: candles.iter().map(|c| c.high).reduce(f64::max),
        min_low: candles.iter().map(|c| c.low).reduce(f64::min),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Clock that only moves when told to
    pub struct ManualClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        pub fn new(start: DateTime<Utc>) -> Self {
            Self { now: Mutex::new(start) }
        }

        pub fn advance(&self, by: Duration) {
            let mut now = self.now.lock().unwrap();
            *now = *now + by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }

    /// In-memory source that counts how often it is loaded
    pub struct MemorySource {
        pub candles: Mutex<TimeSeries>,
        pub loads: Arc<AtomicUsize>,
    }

    impl MemorySource {
        pub fn new(candles: TimeSeries) -> Self {
            Self {
                candles: Mutex::new(candles),
                loads: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl CandleSource for MemorySource {
        fn load(&self) -> Result<TimeSeries> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(self.candles.lock().unwrap().clone())
        }

        fn describe(&self) -> String {
            "memory".to_string()
        }
    }

    /// One candle per day starting at `start`, close = `closes[i]`
    pub fn daily_candles(start: DateTime<Utc>, closes: &[f64]) -> TimeSeries {
        closes
            .iter()
            .enumerate()
            .map(|(i, close)| {
                Candle::new(start + Duration::days(i as i64), *close, close + 1.0, close - 1.0, *close, 100.0 + i as f64)
            })
            .collect()
    }

    pub fn jan_first(year: i32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap()
    }

    /// Store over an in-memory series with a system clock and long TTL
    pub fn memory_store(candles: TimeSeries) -> DataStore {
        DataStore::with_source(Box::new(MemorySource::new(candles)), Arc::new(SystemClock), 3600)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use std::io::Write;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_load_is_memoized_until_ttl_expires() {
        let source = MemorySource::new(daily_candles(jan_first(2023), &[1.0, 2.0, 3.0]));
        let loads = source.loads.clone();
        let clock = Arc::new(ManualClock::new(jan_first(2024)));
        let store = DataStore::with_source(Box::new(source), clock.clone(), 300);

        assert_eq!(store.cache_age_seconds().await, None);
        store.snapshot().await.unwrap();
        store.last_days(2).await.unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        clock.advance(Duration::seconds(299));
        store.stats().await.unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(store.cache_age_seconds().await, Some(299));

        clock.advance(Duration::seconds(1));
        store.stats().await.unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
        assert_eq!(store.cache_age_seconds().await, Some(0));
    }

    #[tokio::test]
    async fn test_refresh_replaces_snapshot_wholesale() {
        let source = MemorySource::new(daily_candles(jan_first(2023), &[1.0, 2.0]));
        let clock = Arc::new(ManualClock::new(jan_first(2024)));
        let store = DataStore::with_source(Box::new(source), clock.clone(), 60);

        let before = store.snapshot().await.unwrap();
        assert_eq!(before.len(), 2);

        store.invalidate().await;
        let after = store.snapshot().await.unwrap();
        // Old readers keep their own copy
        assert_eq!(before.len(), 2);
        assert!(!Arc::ptr_eq(&before, &after));
    }

    #[tokio::test]
    async fn test_concurrent_reads_on_stale_cache_see_complete_series() {
        let closes: Vec<f64> = (0..365).map(|i| 20.0 + (i % 17) as f64).collect();
        let source = MemorySource::new(daily_candles(jan_first(2023), &closes));
        let loads = source.loads.clone();
        let clock = Arc::new(ManualClock::new(jan_first(2024)));
        let store = DataStore::with_source(Box::new(source), clock.clone(), 60);

        store.snapshot().await.unwrap();
        clock.advance(Duration::seconds(61));

        let (first, second) = tokio::join!(store.snapshot(), store.snapshot());
        for series in [first.unwrap(), second.unwrap()] {
            assert_eq!(series.len(), 365);
            assert!(series.windows(2).all(|pair| pair[0].time < pair[1].time));
            assert_eq!(series.last().map(|c| c.close), closes.last().copied());
        }
        assert!(loads.load(Ordering::SeqCst) >= 2);
        assert_eq!(store.cache_age_seconds().await, Some(0));
    }

    #[tokio::test]
    async fn test_last_days() {
        let store = memory_store(daily_candles(jan_first(2023), &[1.0, 2.0, 3.0, 4.0]));

        let last_two = store.last_days(2).await.unwrap();
        assert_eq!(last_two.iter().map(|c| c.close).collect::<Vec<_>>(), vec![3.0, 4.0]);

        // More than available returns everything
        assert_eq!(store.last_days(10).await.unwrap().len(), 4);

        assert!(matches!(
            store.last_days(0).await,
            Err(Error::InsufficientData { .. })
        ));
    }

    #[tokio::test]
    async fn test_last_days_on_empty_dataset() {
        let store = memory_store(Vec::new());
        assert!(matches!(
            store.last_days(5).await,
            Err(Error::InsufficientData { available: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_by_year_and_query() {
        let mut candles = daily_candles(jan_first(2022), &[1.0; 365]);
        candles.extend(daily_candles(jan_first(2023), &[2.0; 10]));
        let store = memory_store(candles);

        assert_eq!(store.by_year(2022).await.unwrap().len(), 365);
        assert_eq!(store.by_year(2023).await.unwrap().len(), 10);
        assert!(store.by_year(2019).await.unwrap().is_empty());

        let window = store.query(WindowDescriptor::CalendarYear(2023)).await.unwrap();
        assert!(window.iter().all(|c| c.close == 2.0));
        assert_eq!(store.query(WindowDescriptor::Days(7)).await.unwrap().len(), 7);
    }

    #[tokio::test]
    async fn test_stats() {
        let mut candles = daily_candles(jan_first(2022), &[5.0, 9.0]);
        candles.extend(daily_candles(jan_first(2023), &[3.0]));
        let store = memory_store(candles);

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.records, 3);
        assert_eq!(stats.years, vec![2022, 2023]);
        assert_eq!(stats.first_date, Some(jan_first(2022)));
        assert_eq!(stats.last_date, Some(jan_first(2023)));
        assert_eq!(stats.max_high, Some(10.0));
        assert_eq!(stats.min_low, Some(2.0));
    }

    #[tokio::test]
    async fn test_missing_file_is_fatal_load_error() {
        let store = DataStore::with_source(
            Box::new(CsvFileSource::new(PathBuf::from("/no/such/dataset.csv"))),
            Arc::new(SystemClock),
            300,
        );
        assert!(matches!(store.snapshot().await, Err(Error::DataLoad(_))));
        // Not cached: still failing on the next call
        assert!(matches!(store.stats().await, Err(Error::DataLoad(_))));
    }

    #[tokio::test]
    async fn test_loads_csv_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Open time,Open,High,Low,Close,Volume,Number of trades,Taker buy base asset volume,Taker buy quote asset volume").unwrap();
        writeln!(file, "2023-01-02,2,3,1,2.5,10,5,4,10").unwrap();
        writeln!(file, "2023-01-01,1,2,0.5,1.5,20,6,8,12").unwrap();
        writeln!(file, "2023-01-03,2,3,1,,10,5,4,10").unwrap();

        let store = DataStore::with_source(
            Box::new(CsvFileSource::new(file.path().to_path_buf())),
            Arc::new(SystemClock),
            300,
        );
        let candles = store.snapshot().await.unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].close, 1.5);
        assert_eq!(candles[1].trade_count, 5);
    }
}
