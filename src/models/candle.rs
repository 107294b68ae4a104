use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

/// One daily candle from the exchange kline export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Open time of the candle (day resolution)
    pub time: DateTime<Utc>,

    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,

    /// Base asset volume
    pub volume: f64,

    /// Number of trades in the period
    pub trade_count: u64,

    /// Taker buy base asset volume
    pub taker_buy_volume: f64,

    /// Taker buy quote asset volume
    pub taker_buy_quote_volume: f64,
}

impl Candle {
    /// Create a candle with only OHLCV set
    pub fn new(time: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
            volume,
            trade_count: 0,
            taker_buy_volume: 0.0,
            taker_buy_quote_volume: 0.0,
        }
    }

    /// Calendar year of the open time
    pub fn year(&self) -> i32 {
        self.time.year()
    }
}

/// Closing prices of a candle slice, in order
pub fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

/// Volumes of a candle slice, in order
pub fn volumes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.volume).collect()
}
