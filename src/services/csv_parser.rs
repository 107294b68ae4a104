use crate::constants::csv_column;
use crate::error::{Error, Result};
use crate::models::{Candle, TimeSeries};
use crate::utils::parse_timestamp;
use csv::{ReaderBuilder, StringRecord, Trim};
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Parsed dataset plus what was discarded on the way
#[derive(Debug, Clone)]
pub struct ParseReport {
    pub candles: TimeSeries,
    /// Rows without a usable open time or close
    pub dropped_rows: usize,
    /// Rows sharing an open time with a later row (the later one is kept)
    pub duplicate_rows: usize,
}

/// Column positions resolved from the header row
#[derive(Debug, Clone, Copy)]
struct ColumnMap {
    time: usize,
    open: Option<usize>,
    high: Option<usize>,
    low: Option<usize>,
    close: usize,
    volume: Option<usize>,
    trade_count: Option<usize>,
    taker_buy_volume: Option<usize>,
    taker_buy_quote_volume: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let names: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
        let find = |name: &str| names.iter().position(|h| h == name);

        let time = find(csv_column::OPEN_TIME)
            .ok_or_else(|| Error::Parse(format!("missing '{}' column", csv_column::OPEN_TIME)))?;
        let close = find(csv_column::CLOSE)
            .ok_or_else(|| Error::Parse(format!("missing '{}' column", csv_column::CLOSE)))?;

        Ok(Self {
            time,
            open: find(csv_column::OPEN),
            high: find(csv_column::HIGH),
            low: find(csv_column::LOW),
            close,
            volume: find(csv_column::VOLUME),
            trade_count: find(csv_column::TRADE_COUNT),
            taker_buy_volume: find(csv_column::TAKER_BUY_BASE_VOLUME),
            taker_buy_quote_volume: find(csv_column::TAKER_BUY_QUOTE_VOLUME),
        })
    }
}

fn number_or_zero(record: &StringRecord, column: Option<usize>) -> f64 {
    column
        .and_then(|idx| record.get(idx))
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

fn count_or_zero(record: &StringRecord, column: Option<usize>) -> u64 {
    let Some(raw) = column.and_then(|idx| record.get(idx)) else {
        return 0;
    };
    raw.parse::<u64>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0).map(|v| v as u64))
        .unwrap_or(0)
}

/// Build one candle, or `None` when the row has no usable time or close
fn parse_record(record: &StringRecord, columns: &ColumnMap) -> Option<Candle> {
    let time = record.get(columns.time).and_then(|s| parse_timestamp(s).ok())?;
    let close = record
        .get(columns.close)
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())?;

    Some(Candle {
        time,
        open: number_or_zero(record, columns.open),
        high: number_or_zero(record, columns.high),
        low: number_or_zero(record, columns.low),
        close,
        volume: number_or_zero(record, columns.volume),
        trade_count: count_or_zero(record, columns.trade_count),
        taker_buy_volume: number_or_zero(record, columns.taker_buy_volume),
        taker_buy_quote_volume: number_or_zero(record, columns.taker_buy_quote_volume),
    })
}

/// Sort ascending by time and collapse duplicate timestamps (last row wins)
fn normalize(mut candles: TimeSeries) -> (TimeSeries, usize) {
    candles.sort_by_key(|c| c.time);

    let mut unique: TimeSeries = Vec::with_capacity(candles.len());
    let mut duplicates = 0;
    for candle in candles {
        match unique.last_mut() {
            Some(prev) if prev.time == candle.time => {
                *prev = candle;
                duplicates += 1;
            }
            _ => unique.push(candle),
        }
    }
    (unique, duplicates)
}

/// Parse a candle CSV from any reader
pub fn parse_candles<R: Read>(reader: R) -> Result<ParseReport> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let columns = ColumnMap::from_headers(&headers)?;

    let mut candles = Vec::new();
    let mut dropped_rows = 0;
    for result in reader.records() {
        let parsed = match result {
            Ok(record) => parse_record(&record, &columns),
            Err(e) => {
                debug!("Skipping unreadable CSV row: {}", e);
                None
            }
        };
        match parsed {
            Some(candle) => candles.push(candle),
            None => dropped_rows += 1,
        }
    }

    let (candles, duplicate_rows) = normalize(candles);
    Ok(ParseReport {
        candles,
        dropped_rows,
        duplicate_rows,
    })
}

/// Parse a candle CSV file
pub fn parse_candles_from_path(path: &Path) -> Result<ParseReport> {
    let file = std::fs::File::open(path)
        .map_err(|e| Error::DataLoad(format!("cannot open {}: {}", path.display(), e)))?;
    parse_candles(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    const HEADER: &str = "Open time,Open,High,Low,Close,Volume,Close time,Quote asset volume,Number of trades,Taker buy base asset volume,Taker buy quote asset volume,Ignore";

    #[test]
    fn test_parse_full_rows() {
        let csv = format!(
            "{}\n2023-01-02,10.0,11.0,9.5,10.5,1000.0,2023-01-02 23:59:59,10500,42,400.0,4200.0,0\n2023-01-01,9.0,10.0,8.5,10.0,800.0,2023-01-01 23:59:59,8000,30,300.0,3000.0,0\n",
            HEADER
        );
        let report = parse_candles(csv.as_bytes()).unwrap();

        assert_eq!(report.candles.len(), 2);
        assert_eq!(report.dropped_rows, 0);
        // Sorted ascending
        assert_eq!(report.candles[0].time.day(), 1);
        assert_eq!(report.candles[1].close, 10.5);
        assert_eq!(report.candles[1].trade_count, 42);
        assert_eq!(report.candles[1].taker_buy_volume, 400.0);
        assert_eq!(report.candles[1].taker_buy_quote_volume, 4200.0);
    }

    #[test]
    fn test_drops_rows_without_time_or_close() {
        let csv = format!(
            "{}\n,1,1,1,1,1,,,1,1,1,0\n2023-01-01,1,1,1,abc,1,,,1,1,1,0\nnot-a-date,1,1,1,1,1,,,1,1,1,0\n2023-01-02,1,2,0.5,1.5,7,,,3,1,1,0\n",
            HEADER
        );
        let report = parse_candles(csv.as_bytes()).unwrap();
        assert_eq!(report.candles.len(), 1);
        assert_eq!(report.dropped_rows, 3);
    }

    #[test]
    fn test_unparseable_numbers_default_to_zero() {
        let csv = format!("{}\n2023-01-01,x,,n/a,5.0,bad,,,?,,,0\n", HEADER);
        let report = parse_candles(csv.as_bytes()).unwrap();
        let candle = &report.candles[0];
        assert_eq!(candle.open, 0.0);
        assert_eq!(candle.high, 0.0);
        assert_eq!(candle.low, 0.0);
        assert_eq!(candle.close, 5.0);
        assert_eq!(candle.volume, 0.0);
        assert_eq!(candle.trade_count, 0);
    }

    #[test]
    fn test_duplicate_timestamps_keep_last() {
        let csv = "Open time,Close\n2023-01-01,1.0\n2023-01-02,2.0\n2023-01-01,3.0\n";
        let report = parse_candles(csv.as_bytes()).unwrap();
        assert_eq!(report.candles.len(), 2);
        assert_eq!(report.duplicate_rows, 1);
        assert_eq!(report.candles[0].close, 3.0);
        assert!(report.candles.windows(2).all(|w| w[0].time < w[1].time));
    }

    #[test]
    fn test_missing_required_columns() {
        let result = parse_candles("Open,High,Low\n1,2,3\n".as_bytes());
        assert!(matches!(result, Err(Error::Parse(_))));
    }

    #[test]
    fn test_missing_file_is_data_load_error() {
        let result = parse_candles_from_path(Path::new("/definitely/not/here.csv"));
        assert!(matches!(result, Err(Error::DataLoad(_))));
    }
}
