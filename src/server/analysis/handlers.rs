//! Per-intent analysis handlers
//!
//! Each handler is a pure function from the selected candles to one
//! [`AnalysisOutcome`]. Handlers never see the store or the raw request.

use crate::constants::{
    BOLLINGER_K, BOLLINGER_PERIOD, CORRELATION_MODERATE, CORRELATION_STRONG, EMA_PERIOD,
    RSI_OVERBOUGHT, RSI_OVERSOLD, RSI_PERIOD, SMA_PERIOD, VOLATILITY_HIGH, VOLATILITY_MEDIUM,
    VOLATILITY_PERIOD,
};
use crate::error::{Error, Result};
use crate::models::indicators::{
    calculate_bollinger_bands, calculate_ema, calculate_ma_score, calculate_macd, calculate_rsi,
    calculate_sma, calculate_volatility, defined, latest, mean, pearson, percent_change,
};
use crate::models::{
    closes, volumes, AnalysisOutcome, AnalysisResult, BandPosition, BollingerSummary, Candle,
    ChartKind, ChartPoint, CorrelationStrength, CorrelationSummary, IndicatorSeries, Intent,
    MacdSummary, MovingAverageSummary, NamedSeries, PeriodSummary, PriceComparison, PriceSummary,
    RsiSignal, RsiSummary, Summary, Trend, VolatilityLevel, VolatilitySummary, Visualization,
    VolumeSummary, WindowDescriptor,
};
use crate::utils::format_date;
use std::collections::BTreeMap;

/// What a handler needs besides the candles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub window: WindowDescriptor,
    /// Indicator period taken from the question, replacing the metric default
    pub period_override: Option<usize>,
}

impl AnalysisRequest {
    fn period_or(&self, default: usize) -> usize {
        self.period_override.unwrap_or(default)
    }
}

/// First integer literal in `text`, skipping the number consumed as a calendar year
///
/// Literals too large for `usize` saturate to `usize::MAX`, which no
/// indicator can satisfy.
pub fn period_hint(text: &str, window: WindowDescriptor) -> Option<usize> {
    let year = match window {
        WindowDescriptor::CalendarYear(year) => Some(year),
        WindowDescriptor::Days(_) => None,
    };
    text.split(|c: char| !c.is_ascii_digit())
        .filter(|token| !token.is_empty())
        // Tokens are pure ASCII digits, so parsing only fails on overflow
        .map(|token| token.parse::<usize>().unwrap_or(usize::MAX))
        .find(|n| year.map_or(true, |y| *n as i64 != y as i64))
}

/// Route an intent to its handler
pub fn dispatch(intent: Intent, candles: &[Candle], request: &AnalysisRequest) -> Result<AnalysisOutcome> {
    match intent {
        Intent::Price => price(candles, request),
        Intent::Volume => volume(candles, request),
        Intent::Rsi => rsi(candles, request),
        Intent::Sma => moving_average(Intent::Sma, candles, request),
        Intent::Ema => moving_average(Intent::Ema, candles, request),
        Intent::Volatility => volatility(candles, request),
        Intent::Macd => macd(candles, request),
        Intent::Bollinger => bollinger(candles, request),
        Intent::Comparison => moving_average(Intent::Comparison, candles, request),
        Intent::Correlation => correlation(candles, request),
        Intent::Explore => period_summary(candles, request),
    }
}

fn require_candles(candles: &[Candle]) -> Result<(&Candle, &Candle)> {
    match (candles.first(), candles.last()) {
        (Some(first), Some(last)) => Ok((first, last)),
        _ => Err(Error::insufficient("analysis window", 1, 0)),
    }
}

fn min_max_mean(values: &[f64]) -> Option<(f64, f64, f64)> {
    let min = values.iter().copied().reduce(f64::min)?;
    let max = values.iter().copied().reduce(f64::max)?;
    Some((min, max, mean(values)?))
}

fn latest_value(series: &[Option<f64>], what: &str) -> Result<f64> {
    latest(series).ok_or_else(|| Error::Calculation(format!("{} produced no values", what)))
}

fn as_series(values: &[f64]) -> IndicatorSeries {
    values.iter().copied().map(Some).collect()
}

/// Per-date chart rows with the given named fields
fn chart_points(candles: &[Candle], fields: &[(&'static str, &IndicatorSeries)]) -> Vec<ChartPoint> {
    candles
        .iter()
        .enumerate()
        .map(|(i, candle)| ChartPoint {
            date: format_date(&candle.time),
            values: fields
                .iter()
                .map(|(name, series)| (*name, series.get(i).copied().flatten()))
                .collect::<BTreeMap<_, _>>(),
        })
        .collect()
}

fn price(candles: &[Candle], request: &AnalysisRequest) -> Result<AnalysisOutcome> {
    let (first, last) = require_candles(candles)?;
    let closes = closes(candles);
    let (min, max, avg) = min_max_mean(&closes).ok_or_else(|| Error::insufficient("price", 1, 0))?;
    let change_percent = percent_change(first.close, last.close);

    let message = format!(
        "El precio de SOL en {} pasó de ${:.2} a ${:.2} ({:+.2}%). Mínimo ${:.2}, máximo ${:.2}, promedio ${:.2}.",
        request.window.describe(),
        first.close,
        last.close,
        change_percent,
        min,
        max,
        avg
    );

    let close_series = as_series(&closes);
    Ok(AnalysisOutcome {
        message,
        visualization: Some(Visualization {
            kind: ChartKind::Line,
            title: format!("Precio de cierre de SOL ({})", request.window.label()),
            data: chart_points(candles, &[("close", &close_series)]),
        }),
        analysis: AnalysisResult {
            metric: Intent::Price,
            label: "close".to_string(),
            period: None,
            series: vec![NamedSeries {
                name: "close",
                values: close_series,
            }],
            summary: Summary::Price(PriceSummary {
                current: last.close,
                first: first.close,
                min,
                max,
                mean: avg,
                change_percent,
            }),
            comparison: None,
        },
    })
}

fn volume(candles: &[Candle], request: &AnalysisRequest) -> Result<AnalysisOutcome> {
    let (_, last) = require_candles(candles)?;
    let volumes = volumes(candles);
    let total: f64 = volumes.iter().sum();
    let average = total / volumes.len() as f64;
    let (min, max, _) = min_max_mean(&volumes).ok_or_else(|| Error::insufficient("volume", 1, 0))?;
    let total_trades: u64 = candles.iter().map(|c| c.trade_count).sum();
    let taker_buy: f64 = candles.iter().map(|c| c.taker_buy_volume).sum();
    let taker_buy_percent = if total > 0.0 { taker_buy / total * 100.0 } else { 0.0 };

    let message = format!(
        "En {} se negociaron {:.2} SOL en total, con un promedio diario de {:.2} SOL. El día de mayor volumen movió {:.2} SOL.",
        request.window.describe(),
        total,
        average,
        max
    );

    let volume_series = as_series(&volumes);
    Ok(AnalysisOutcome {
        message,
        visualization: Some(Visualization {
            kind: ChartKind::Bar,
            title: format!("Volumen diario de SOL ({})", request.window.label()),
            data: chart_points(candles, &[("volume", &volume_series)]),
        }),
        analysis: AnalysisResult {
            metric: Intent::Volume,
            label: "volume".to_string(),
            period: None,
            series: vec![NamedSeries {
                name: "volume",
                values: volume_series,
            }],
            summary: Summary::Volume(VolumeSummary {
                total,
                average,
                max,
                min,
                current: last.volume,
                total_trades,
                taker_buy_percent,
            }),
            comparison: None,
        },
    })
}

fn rsi_signal(value: f64) -> RsiSignal {
    if value > RSI_OVERBOUGHT {
        RsiSignal::Overbought
    } else if value < RSI_OVERSOLD {
        RsiSignal::Oversold
    } else {
        RsiSignal::Neutral
    }
}

fn rsi(candles: &[Candle], request: &AnalysisRequest) -> Result<AnalysisOutcome> {
    let period = request.period_or(RSI_PERIOD);
    let values = calculate_rsi(&closes(candles), period)?;
    let current = latest_value(&values, "RSI")?;
    let (min, max, avg) = min_max_mean(&defined(&values))
        .ok_or_else(|| Error::Calculation("RSI produced no values".to_string()))?;
    let signal = rsi_signal(current);

    let reading = match signal {
        RsiSignal::Overbought => "zona de sobrecompra",
        RsiSignal::Oversold => "zona de sobreventa",
        RsiSignal::Neutral => "zona neutral",
    };
    let message = format!(
        "El RSI({}) de SOL en {} es {:.2}, en {}. Rango del periodo: {:.2} a {:.2}.",
        period,
        request.window.describe(),
        current,
        reading,
        min,
        max
    );

    Ok(AnalysisOutcome {
        message,
        visualization: Some(Visualization {
            kind: ChartKind::Line,
            title: format!("RSI({}) de SOL", period),
            data: chart_points(candles, &[("rsi", &values)]),
        }),
        analysis: AnalysisResult {
            metric: Intent::Rsi,
            label: format!("rsi_{}", period),
            period: Some(period),
            series: vec![NamedSeries { name: "rsi", values }],
            summary: Summary::Rsi(RsiSummary {
                current,
                min,
                max,
                mean: avg,
                signal,
            }),
            comparison: None,
        },
    })
}

/// SMA, EMA and price-vs-average comparison share one shape
fn moving_average(metric: Intent, candles: &[Candle], request: &AnalysisRequest) -> Result<AnalysisOutcome> {
    let (_, last) = require_candles(candles)?;
    let closes = closes(candles);
    let (name, period, values) = match metric {
        Intent::Ema => {
            let period = request.period_or(EMA_PERIOD);
            ("ema", period, calculate_ema(&closes, period)?)
        }
        _ => {
            let period = request.period_or(SMA_PERIOD);
            ("sma", period, calculate_sma(&closes, period)?)
        }
    };

    let current = latest_value(&values, name)?;
    let (min, max, avg) = min_max_mean(&defined(&values))
        .ok_or_else(|| Error::Calculation(format!("{} produced no values", name)))?;
    let difference_percent = calculate_ma_score(last.close, current);
    let trend = Trend::from_difference(last.close - current);

    let position = match trend {
        Trend::Alcista => "por encima",
        Trend::Bajista => "por debajo",
        Trend::Lateral => "justo en",
    };
    let message = format!(
        "La {}({}) de SOL en {} está en ${:.2}. El último cierre (${:.2}) está {} de la media ({:+.2}%), tendencia {}.",
        name.to_uppercase(),
        period,
        request.window.describe(),
        current,
        last.close,
        position,
        difference_percent,
        trend_label(trend)
    );

    let close_series = as_series(&closes);
    Ok(AnalysisOutcome {
        message,
        visualization: Some(Visualization {
            kind: ChartKind::Line,
            title: format!("Precio vs {}({})", name.to_uppercase(), period),
            data: chart_points(candles, &[("close", &close_series), (name, &values)]),
        }),
        analysis: AnalysisResult {
            metric,
            label: format!("{}_{}", name, period),
            period: Some(period),
            series: vec![NamedSeries { name, values }],
            summary: Summary::MovingAverage(MovingAverageSummary {
                current,
                min,
                max,
                mean: avg,
                latest_close: last.close,
            }),
            comparison: Some(PriceComparison {
                kind: "vs_price",
                current_price: last.close,
                indicator_value: current,
                difference_percent,
                trend,
            }),
        },
    })
}

fn trend_label(trend: Trend) -> &'static str {
    match trend {
        Trend::Alcista => "alcista",
        Trend::Bajista => "bajista",
        Trend::Lateral => "lateral",
    }
}

fn volatility_level(annualized: f64) -> VolatilityLevel {
    if annualized > VOLATILITY_HIGH {
        VolatilityLevel::High
    } else if annualized > VOLATILITY_MEDIUM {
        VolatilityLevel::Medium
    } else {
        VolatilityLevel::Low
    }
}

fn volatility(candles: &[Candle], request: &AnalysisRequest) -> Result<AnalysisOutcome> {
    let period = request.period_or(VOLATILITY_PERIOD);
    let closes = closes(candles);
    let annualized = calculate_volatility(&closes, period)?;
    let level = volatility_level(annualized);

    let level_text = match level {
        VolatilityLevel::High => "alta",
        VolatilityLevel::Medium => "media",
        VolatilityLevel::Low => "baja",
    };
    let message = format!(
        "La volatilidad anualizada de SOL ({} días) en {} es {:.2}%, considerada {}.",
        period,
        request.window.describe(),
        annualized * 100.0,
        level_text
    );

    let close_series = as_series(&closes);
    Ok(AnalysisOutcome {
        message,
        visualization: Some(Visualization {
            kind: ChartKind::Line,
            title: format!("Precio de cierre de SOL ({})", request.window.label()),
            data: chart_points(candles, &[("close", &close_series)]),
        }),
        analysis: AnalysisResult {
            metric: Intent::Volatility,
            label: format!("volatility_{}", period),
            period: Some(period),
            series: Vec::new(),
            summary: Summary::Volatility(VolatilitySummary {
                annualized,
                percent: annualized * 100.0,
                level,
            }),
            comparison: None,
        },
    })
}

fn macd(candles: &[Candle], request: &AnalysisRequest) -> Result<AnalysisOutcome> {
    let series = calculate_macd(&closes(candles))?;
    let macd = latest_value(&series.macd, "MACD")?;
    let signal = latest_value(&series.signal, "MACD signal")?;
    let histogram = latest_value(&series.histogram, "MACD histogram")?;
    let trend = Trend::from_difference(histogram);

    let reading = match trend {
        Trend::Alcista => "por encima de la señal (impulso alcista)",
        Trend::Bajista => "por debajo de la señal (impulso bajista)",
        Trend::Lateral => "igual a la señal",
    };
    let message = format!(
        "El MACD de SOL en {} es {:.4} con señal {:.4}; el MACD está {} con histograma {:+.4}.",
        request.window.describe(),
        macd,
        signal,
        reading,
        histogram
    );

    Ok(AnalysisOutcome {
        message,
        visualization: Some(Visualization {
            kind: ChartKind::Line,
            title: "MACD (12, 26, 9) de SOL".to_string(),
            data: chart_points(
                candles,
                &[
                    ("macd", &series.macd),
                    ("signal", &series.signal),
                    ("histogram", &series.histogram),
                ],
            ),
        }),
        analysis: AnalysisResult {
            metric: Intent::Macd,
            label: "macd_12_26_9".to_string(),
            period: None,
            series: vec![
                NamedSeries {
                    name: "macd",
                    values: series.macd,
                },
                NamedSeries {
                    name: "signal",
                    values: series.signal,
                },
                NamedSeries {
                    name: "histogram",
                    values: series.histogram,
                },
            ],
            summary: Summary::Macd(MacdSummary {
                macd,
                signal,
                histogram,
                trend,
            }),
            comparison: None,
        },
    })
}

fn bollinger(candles: &[Candle], request: &AnalysisRequest) -> Result<AnalysisOutcome> {
    let (_, last) = require_candles(candles)?;
    let period = request.period_or(BOLLINGER_PERIOD);
    let closes = closes(candles);
    let bands = calculate_bollinger_bands(&closes, period, BOLLINGER_K)?;

    let upper = latest_value(&bands.upper, "Bollinger upper band")?;
    let middle = latest_value(&bands.middle, "Bollinger middle band")?;
    let lower = latest_value(&bands.lower, "Bollinger lower band")?;
    let bandwidth = latest_value(&bands.bandwidth, "Bollinger bandwidth")?;

    let position = if last.close > upper {
        BandPosition::AboveUpper
    } else if last.close < lower {
        BandPosition::BelowLower
    } else {
        BandPosition::Inside
    };
    let reading = match position {
        BandPosition::AboveUpper => "por encima de la banda superior",
        BandPosition::BelowLower => "por debajo de la banda inferior",
        BandPosition::Inside => "dentro de las bandas",
    };
    let message = format!(
        "Bandas de Bollinger({}, {}) de SOL en {}: superior ${:.2}, media ${:.2}, inferior ${:.2}. El último cierre (${:.2}) está {}.",
        period,
        BOLLINGER_K,
        request.window.describe(),
        upper,
        middle,
        lower,
        last.close,
        reading
    );

    let close_series = as_series(&closes);
    Ok(AnalysisOutcome {
        message,
        visualization: Some(Visualization {
            kind: ChartKind::Line,
            title: format!("Bandas de Bollinger({}) de SOL", period),
            data: chart_points(
                candles,
                &[
                    ("close", &close_series),
                    ("upper", &bands.upper),
                    ("middle", &bands.middle),
                    ("lower", &bands.lower),
                ],
            ),
        }),
        analysis: AnalysisResult {
            metric: Intent::Bollinger,
            label: format!("bollinger_{}", period),
            period: Some(period),
            series: vec![
                NamedSeries {
                    name: "upper",
                    values: bands.upper,
                },
                NamedSeries {
                    name: "middle",
                    values: bands.middle,
                },
                NamedSeries {
                    name: "lower",
                    values: bands.lower,
                },
            ],
            summary: Summary::Bollinger(BollingerSummary {
                upper,
                middle,
                lower,
                bandwidth,
                latest_close: last.close,
                position,
            }),
            comparison: None,
        },
    })
}

fn correlation_strength(coefficient: Option<f64>) -> CorrelationStrength {
    match coefficient.map(f64::abs) {
        None => CorrelationStrength::Undefined,
        Some(r) if r >= CORRELATION_STRONG => CorrelationStrength::Strong,
        Some(r) if r >= CORRELATION_MODERATE => CorrelationStrength::Moderate,
        Some(_) => CorrelationStrength::Weak,
    }
}

fn correlation(candles: &[Candle], request: &AnalysisRequest) -> Result<AnalysisOutcome> {
    require_candles(candles)?;
    let closes = closes(candles);
    let volumes = volumes(candles);
    let coefficient = pearson(&closes, &volumes);
    let strength = correlation_strength(coefficient);

    let message = match coefficient {
        Some(r) => {
            let strength_text = match strength {
                CorrelationStrength::Strong => "fuerte",
                CorrelationStrength::Moderate => "moderada",
                _ => "débil",
            };
            let direction = if r >= 0.0 { "positiva" } else { "negativa" };
            format!(
                "La correlación entre precio y volumen de SOL en {} es {:.3}: una relación {} {}.",
                request.window.describe(),
                r,
                strength_text,
                direction
            )
        }
        None => format!(
            "No se puede calcular la correlación entre precio y volumen en {}: alguna de las series no varía.",
            request.window.describe()
        ),
    };

    let close_series = as_series(&closes);
    let volume_series = as_series(&volumes);
    Ok(AnalysisOutcome {
        message,
        visualization: Some(Visualization {
            kind: ChartKind::Scatter,
            title: "Precio vs volumen de SOL".to_string(),
            data: chart_points(candles, &[("close", &close_series), ("volume", &volume_series)]),
        }),
        analysis: AnalysisResult {
            metric: Intent::Correlation,
            label: "close_volume_pearson".to_string(),
            period: None,
            series: Vec::new(),
            summary: Summary::Correlation(CorrelationSummary {
                coefficient,
                strength,
                observations: candles.len(),
            }),
            comparison: None,
        },
    })
}

fn period_summary(candles: &[Candle], request: &AnalysisRequest) -> Result<AnalysisOutcome> {
    let (first, last) = require_candles(candles)?;
    let high = candles.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
    let low = candles.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    let average_volume = mean(&volumes(candles)).unwrap_or(0.0);
    let change_percent = percent_change(first.close, last.close);

    let message = format!(
        "Resumen de SOL en {}: el precio pasó de ${:.2} a ${:.2} ({:+.2}%), con máximo ${:.2} y mínimo ${:.2}. Volumen promedio diario: {:.2} SOL.",
        request.window.describe(),
        first.close,
        last.close,
        change_percent,
        high,
        low,
        average_volume
    );

    let close_series = as_series(&closes(candles));
    Ok(AnalysisOutcome {
        message,
        visualization: Some(Visualization {
            kind: ChartKind::Line,
            title: format!("SOL ({})", request.window.label()),
            data: chart_points(candles, &[("close", &close_series)]),
        }),
        analysis: AnalysisResult {
            metric: Intent::Explore,
            label: "period_summary".to_string(),
            period: None,
            series: Vec::new(),
            summary: Summary::Period(PeriodSummary {
                first_price: first.close,
                last_price: last.close,
                change_percent,
                high,
                low,
                average_volume,
                days: candles.len(),
            }),
            comparison: None,
        },
    })
}
