//! Technical indicators over daily candle data
//!
//! # Series Convention
//! Every series-valued indicator returns an [`IndicatorSeries`] aligned
//! index-for-index with its input. Positions inside the warm-up span (not
//! enough history yet) are `None`, never `0.0`, so callers can tell "no
//! value" apart from a genuine zero.
//!
//! # Minimum Lengths
//! | Indicator  | Minimum input       |
//! |------------|---------------------|
//! | SMA        | `period`            |
//! | EMA        | `period`            |
//! | RSI        | `period + 1`        |
//! | Volatility | `period + 1`        |
//! | MACD       | slow period (26)    |
//! | Bollinger  | `period`            |
//! | ATR        | `period`            |
//!
//! Shorter inputs fail with [`AppError::InsufficientData`].

use crate::constants::{
    ATR_PERIOD, BOLLINGER_K, BOLLINGER_PERIOD, EMA_PERIOD, MACD_FAST_PERIOD, MACD_SIGNAL_PERIOD,
    MACD_SLOW_PERIOD, RSI_PERIOD, SMA_LONG_PERIOD, SMA_PERIOD, TRADING_DAYS_PER_YEAR,
    VOLATILITY_PERIOD,
};
use crate::error::{AppError, Result};
use crate::models::candle::{closes, Candle};
use serde::Serialize;

/// Indicator values aligned with the input; `None` marks warm-up positions
pub type IndicatorSeries = Vec<Option<f64>>;

fn require_period(indicator: &str, period: usize) -> Result<()> {
    if period == 0 {
        return Err(AppError::InvalidInput(format!("{} period must be at least 1", indicator)));
    }
    Ok(())
}

/// `period + 1` closes, the history RSI and volatility need
fn with_seed(indicator: &str, period: usize, available: usize) -> Result<usize> {
    let required = period
        .checked_add(1)
        .ok_or_else(|| AppError::insufficient(indicator, usize::MAX, available))?;
    require_len(indicator, required, available)?;
    Ok(required)
}

fn require_len(indicator: &str, required: usize, available: usize) -> Result<()> {
    if available < required {
        return Err(AppError::insufficient(indicator, required, available));
    }
    Ok(())
}

/// Calculate Simple Moving Average for a given period
///
/// # Arguments
/// * `closes` - Slice of closing prices
/// * `period` - Period for the moving average (e.g., 20, 50)
///
/// # Returns
/// * Series with the first `period - 1` entries absent
pub fn calculate_sma(closes: &[f64], period: usize) -> Result<IndicatorSeries> {
    require_period("SMA", period)?;
    require_len("SMA", period, closes.len())?;

    let mut ma_values = vec![None; closes.len()];
    for i in (period - 1)..closes.len() {
        let start_idx = i + 1 - period;
        let sum: f64 = closes[start_idx..=i].iter().sum();
        ma_values[i] = Some(sum / period as f64);
    }

    Ok(ma_values)
}

/// Raw EMA recurrence, seeded with the first price (no warm-up gap)
fn ema_values(prices: &[f64], period: usize) -> Vec<f64> {
    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut values = Vec::with_capacity(prices.len());
    let mut prev = match prices.first() {
        Some(first) => *first,
        None => return values,
    };
    values.push(prev);
    for price in &prices[1..] {
        prev = price * multiplier + prev * (1.0 - multiplier);
        values.push(prev);
    }
    values
}

/// Calculate Exponential Moving Average
///
/// Multiplier is `2 / (period + 1)`; the first value is the first price, so
/// unlike SMA every position holds a value.
pub fn calculate_ema(prices: &[f64], period: usize) -> Result<IndicatorSeries> {
    require_period("EMA", period)?;
    require_len("EMA", period, prices.len())?;
    Ok(ema_values(prices, period).into_iter().map(Some).collect())
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    // avg_loss == 0 maps rs to 100, which yields ~99.01 rather than 100
    let rs = if avg_loss == 0.0 { 100.0 } else { avg_gain / avg_loss };
    100.0 - 100.0 / (1.0 + rs)
}

/// Calculate Relative Strength Index with Wilder smoothing
///
/// # Arguments
/// * `closes` - Closing prices, at least `period + 1` of them
/// * `period` - Lookback, 14 by convention
///
/// # Returns
/// * Series with the first `period` entries absent, values in [0, 100]
pub fn calculate_rsi(closes: &[f64], period: usize) -> Result<IndicatorSeries> {
    require_period("RSI", period)?;
    with_seed("RSI", period, closes.len())?;

    let (gains, losses): (Vec<f64>, Vec<f64>) = closes
        .windows(2)
        .map(|pair| {
            let delta = pair[1] - pair[0];
            if delta > 0.0 {
                (delta, 0.0)
            } else {
                (0.0, -delta)
            }
        })
        .unzip();

    let p = period as f64;
    let mut avg_gain = gains[..period].iter().sum::<f64>() / p;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / p;

    let mut values = vec![None; closes.len()];
    values[period] = Some(rsi_from_averages(avg_gain, avg_loss));

    for i in period..gains.len() {
        avg_gain = (avg_gain * (p - 1.0) + gains[i]) / p;
        avg_loss = (avg_loss * (p - 1.0) + losses[i]) / p;
        values[i + 1] = Some(rsi_from_averages(avg_gain, avg_loss));
    }

    Ok(values)
}

/// Calculate annualized volatility of the trailing window
///
/// Takes the last `period + 1` closes, computes log returns, their
/// population standard deviation, and scales by √252.
pub fn calculate_volatility(closes: &[f64], period: usize) -> Result<f64> {
    require_period("Volatility", period)?;
    let required = with_seed("Volatility", period, closes.len())?;

    let window = &closes[closes.len() - required..];
    if window.iter().any(|c| !c.is_finite() || *c <= 0.0) {
        return Err(AppError::Calculation(
            "volatility requires strictly positive closing prices".to_string(),
        ));
    }

    let returns: Vec<f64> = window.windows(2).map(|pair| (pair[1] / pair[0]).ln()).collect();
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;

    Ok(variance.sqrt() * TRADING_DAYS_PER_YEAR.sqrt())
}

/// MACD line, signal line and histogram
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacdSeries {
    pub macd: IndicatorSeries,
    pub signal: IndicatorSeries,
    pub histogram: IndicatorSeries,
}

/// Calculate MACD with the standard 12/26/9 periods
pub fn calculate_macd(closes: &[f64]) -> Result<MacdSeries> {
    calculate_macd_with(closes, MACD_FAST_PERIOD, MACD_SLOW_PERIOD, MACD_SIGNAL_PERIOD)
}

/// Calculate MACD with custom periods
///
/// `histogram = macd - signal`, with an absent signal counted as 0.
pub fn calculate_macd_with(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> Result<MacdSeries> {
    require_period("MACD", fast)?;
    require_period("MACD", slow)?;
    require_period("MACD", signal_period)?;
    require_len("MACD", slow.max(fast), closes.len())?;

    let fast_ema = calculate_ema(closes, fast)?;
    let slow_ema = calculate_ema(closes, slow)?;

    let macd: IndicatorSeries = fast_ema
        .iter()
        .zip(slow_ema.iter())
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => Some(f - s),
            _ => None,
        })
        .collect();

    let macd_values: Vec<f64> = macd.iter().flatten().copied().collect();
    let signal_values = ema_values(&macd_values, signal_period);
    // Re-align the signal with positions that have a MACD value
    let mut signal = vec![None; macd.len()];
    let mut next = signal_values.into_iter();
    for (slot, value) in signal.iter_mut().zip(macd.iter()) {
        if value.is_some() {
            *slot = next.next();
        }
    }

    let histogram = macd
        .iter()
        .zip(signal.iter())
        .map(|(m, s)| m.map(|m| m - s.unwrap_or(0.0)))
        .collect();

    Ok(MacdSeries {
        macd,
        signal,
        histogram,
    })
}

/// Bollinger envelope around an SMA
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BollingerBands {
    pub upper: IndicatorSeries,
    pub middle: IndicatorSeries,
    pub lower: IndicatorSeries,
    pub bandwidth: IndicatorSeries,
}

/// Calculate Bollinger Bands
///
/// # Arguments
/// * `closes` - Closing prices
/// * `period` - SMA / standard deviation window (20)
/// * `k` - Band width in standard deviations (2.0)
pub fn calculate_bollinger_bands(closes: &[f64], period: usize, k: f64) -> Result<BollingerBands> {
    let middle = calculate_sma(closes, period)?;
    let len = closes.len();

    let mut upper = vec![None; len];
    let mut lower = vec![None; len];
    let mut bandwidth = vec![None; len];

    for (i, mid) in middle.iter().enumerate() {
        let Some(mean) = *mid else { continue };
        let window = &closes[i + 1 - period..=i];
        let variance = window.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / period as f64;
        let std = variance.sqrt();

        let up = mean + k * std;
        let low = mean - k * std;
        upper[i] = Some(up);
        lower[i] = Some(low);
        bandwidth[i] = Some(up - low);
    }

    Ok(BollingerBands {
        upper,
        middle,
        lower,
        bandwidth,
    })
}

/// True range per candle; the first candle uses its own close as previous close
pub fn true_ranges(candles: &[Candle]) -> Vec<f64> {
    candles
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let prev_close = if i == 0 { c.close } else { candles[i - 1].close };
            (c.high - c.low)
                .max((c.high - prev_close).abs())
                .max((c.low - prev_close).abs())
        })
        .collect()
}

/// Calculate Average True Range as an EMA of true ranges
pub fn calculate_atr(candles: &[Candle], period: usize) -> Result<IndicatorSeries> {
    require_period("ATR", period)?;
    require_len("ATR", period, candles.len())?;
    calculate_ema(&true_ranges(candles), period)
}

/// Every indicator with its default period, for dashboard callers
///
/// An indicator whose minimum length is not met is absent instead of
/// failing the whole snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct IndicatorSnapshot {
    pub records: usize,
    pub rsi_14: Option<IndicatorSeries>,
    pub sma_20: Option<IndicatorSeries>,
    pub sma_50: Option<IndicatorSeries>,
    pub ema_12: Option<IndicatorSeries>,
    pub volatility_20: Option<f64>,
    pub macd: Option<MacdSeries>,
    pub bollinger_20: Option<BollingerBands>,
    pub atr_14: Option<IndicatorSeries>,
}

pub fn compute_all(candles: &[Candle]) -> IndicatorSnapshot {
    let closes = closes(candles);
    IndicatorSnapshot {
        records: candles.len(),
        rsi_14: calculate_rsi(&closes, RSI_PERIOD).ok(),
        sma_20: calculate_sma(&closes, SMA_PERIOD).ok(),
        sma_50: calculate_sma(&closes, SMA_LONG_PERIOD).ok(),
        ema_12: calculate_ema(&closes, EMA_PERIOD).ok(),
        volatility_20: calculate_volatility(&closes, VOLATILITY_PERIOD).ok(),
        macd: calculate_macd(&closes).ok(),
        bollinger_20: calculate_bollinger_bands(&closes, BOLLINGER_PERIOD, BOLLINGER_K).ok(),
        atr_14: calculate_atr(candles, ATR_PERIOD).ok(),
    }
}

/// Calculate MA score: ((close - ma) / ma) * 100
///
/// Returns the percentage difference between close price and moving average.
pub fn calculate_ma_score(close: f64, ma: f64) -> f64 {
    if ma == 0.0 {
        0.0
    } else {
        ((close - ma) / ma) * 100.0
    }
}

/// Percentage change from `previous` to `current`; 0 when `previous` is 0
pub fn percent_change(previous: f64, current: f64) -> f64 {
    if previous == 0.0 {
        0.0
    } else {
        (current - previous) / previous * 100.0
    }
}

/// Arithmetic mean, `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Pearson correlation coefficient of two equal-length series
///
/// `None` when lengths differ, fewer than two points, or either side has
/// zero variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let mean_x = mean(xs)?;
    let mean_y = mean(ys)?;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}

/// Last defined value of a series
pub fn latest(series: &[Option<f64>]) -> Option<f64> {
    series.iter().rev().find_map(|v| *v)
}

/// Defined values of a series, in order
pub fn defined(series: &[Option<f64>]) -> Vec<f64> {
    series.iter().flatten().copied().collect()
}
