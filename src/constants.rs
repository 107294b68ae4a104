//! Dataset layout, indicator defaults and interpretation thresholds
//!
//! ## Dataset Format
//!
//! Daily candles exported from the exchange kline endpoint. Columns are
//! located by header name, so extra columns (`Close time`,
//! `Quote asset volume`, `Ignore`) are tolerated in any position.

/// Header names for the candle CSV (matched case-insensitively)
pub mod csv_column {
    pub const OPEN_TIME: &str = "open time";
    pub const OPEN: &str = "open";
    pub const HIGH: &str = "high";
    pub const LOW: &str = "low";
    pub const CLOSE: &str = "close";
    pub const VOLUME: &str = "volume";
    pub const TRADE_COUNT: &str = "number of trades";
    pub const TAKER_BUY_BASE_VOLUME: &str = "taker buy base asset volume";
    pub const TAKER_BUY_QUOTE_VOLUME: &str = "taker buy quote asset volume";
}

/// Default dataset location, relative to the working directory
pub const DEFAULT_DATA_FILE: &str = "data/sol_1d_data_2020_to_2025.csv";

/// Cache TTL for the in-memory candle snapshot (5 minutes)
pub const DEFAULT_CACHE_TTL_SECONDS: i64 = 300;

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 3000;

/// `Cache-Control: max-age` advertised on query responses
pub const RESPONSE_CACHE_MAX_AGE: u32 = 300;

/// Prompt limits
pub const MAX_PROMPT_CHARS: usize = 500;
pub const DEFAULT_USER_ID: &str = "anonymous";

/// Confidence gates
///
/// The orchestrator admits a parse at 0.2; the clarification helper asks
/// back below 0.3. Both values are observable and kept separate.
pub const ORCHESTRATOR_MIN_CONFIDENCE: f64 = 0.2;
pub const CLARIFICATION_THRESHOLD: f64 = 0.3;

/// Confidence assigned when no lexicon entry matches
pub const FALLBACK_CONFIDENCE: f64 = 0.2;

/// Base confidence of a matching lexicon entry and the bonus per keyword hit
pub const BASE_CONFIDENCE: f64 = 0.5;
pub const KEYWORD_BONUS: f64 = 0.1;

/// Window used when the text names no period
pub const DEFAULT_WINDOW_DAYS: usize = 30;

/// Day conversions for `<n> <unit>` windows
pub const DAYS_PER_WEEK: usize = 7;
pub const DAYS_PER_MONTH: usize = 30;
pub const DAYS_PER_YEAR: usize = 365;

/// Indicator default periods
pub const RSI_PERIOD: usize = 14;
pub const SMA_PERIOD: usize = 20;
pub const SMA_LONG_PERIOD: usize = 50;
pub const EMA_PERIOD: usize = 12;
pub const VOLATILITY_PERIOD: usize = 20;
pub const MACD_FAST_PERIOD: usize = 12;
pub const MACD_SLOW_PERIOD: usize = 26;
pub const MACD_SIGNAL_PERIOD: usize = 9;
pub const BOLLINGER_PERIOD: usize = 20;
pub const BOLLINGER_K: f64 = 2.0;
pub const ATR_PERIOD: usize = 14;

/// Trading days used to annualize daily volatility
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// RSI interpretation bands
pub const RSI_OVERBOUGHT: f64 = 70.0;
pub const RSI_OVERSOLD: f64 = 30.0;

/// Annualized volatility bands
pub const VOLATILITY_HIGH: f64 = 0.5;
pub const VOLATILITY_MEDIUM: f64 = 0.3;

/// Absolute Pearson coefficient above which a correlation is called strong / moderate
pub const CORRELATION_STRONG: f64 = 0.7;
pub const CORRELATION_MODERATE: f64 = 0.4;

/// Candles fed to the dashboard aggregate when the caller names no window
pub const DEFAULT_DASHBOARD_DAYS: usize = 90;
