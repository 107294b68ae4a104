use super::indicators::IndicatorSeries;
use super::Intent;
use serde::Serialize;
use std::collections::BTreeMap;

/// Direction of price relative to a reference (indicator value or prior close)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Alcista,
    Bajista,
    Lateral,
}

impl Trend {
    pub fn from_difference(difference: f64) -> Self {
        if difference > 0.0 {
            Trend::Alcista
        } else if difference < 0.0 {
            Trend::Bajista
        } else {
            Trend::Lateral
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RsiSignal {
    Overbought,
    Oversold,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VolatilityLevel {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BandPosition {
    AboveUpper,
    BelowLower,
    Inside,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationStrength {
    Strong,
    Moderate,
    Weak,
    Undefined,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSummary {
    pub current: f64,
    pub first: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub change_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolumeSummary {
    pub total: f64,
    pub average: f64,
    pub max: f64,
    pub min: f64,
    pub current: f64,
    pub total_trades: u64,
    /// Share of volume bought by takers, in percent
    pub taker_buy_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RsiSummary {
    pub current: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub signal: RsiSignal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovingAverageSummary {
    pub current: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub latest_close: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolatilitySummary {
    pub annualized: f64,
    pub percent: f64,
    pub level: VolatilityLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacdSummary {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
    pub trend: Trend,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BollingerSummary {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    pub bandwidth: f64,
    pub latest_close: f64,
    pub position: BandPosition,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationSummary {
    pub coefficient: Option<f64>,
    pub strength: CorrelationStrength,
    pub observations: usize,
}

/// Generic first/last summary for intents without a dedicated analysis
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodSummary {
    pub first_price: f64,
    pub last_price: f64,
    pub change_percent: f64,
    pub high: f64,
    pub low: f64,
    pub average_volume: f64,
    pub days: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Summary {
    Price(PriceSummary),
    Volume(VolumeSummary),
    Rsi(RsiSummary),
    MovingAverage(MovingAverageSummary),
    Volatility(VolatilitySummary),
    Macd(MacdSummary),
    Bollinger(BollingerSummary),
    Correlation(CorrelationSummary),
    Period(PeriodSummary),
}

/// Latest close measured against an indicator value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceComparison {
    /// Always "vs_price"
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub current_price: f64,
    pub indicator_value: f64,
    pub difference_percent: f64,
    pub trend: Trend,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedSeries {
    pub name: &'static str,
    pub values: IndicatorSeries,
}

/// Computed answer for one question
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub metric: Intent,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub series: Vec<NamedSeries>,
    pub summary: Summary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<PriceComparison>,
}

/// One chart row: a date plus the plotted fields for that date
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub date: String,
    #[serde(flatten)]
    pub values: BTreeMap<&'static str, Option<f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Line,
    Bar,
    Scatter,
}

/// Chart-ready projection of an analysis
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Visualization {
    #[serde(rename = "type")]
    pub kind: ChartKind,
    pub title: String,
    pub data: Vec<ChartPoint>,
}

/// What a per-intent handler hands back to the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    pub message: String,
    pub visualization: Option<Visualization>,
    pub analysis: AnalysisResult,
}
