mod analysis;
mod candle;
mod envelope;
mod intent;
mod window;
pub mod indicators;

pub use analysis::{
    AnalysisOutcome, AnalysisResult, BandPosition, BollingerSummary, ChartKind, ChartPoint,
    CorrelationStrength, CorrelationSummary, MacdSummary, MovingAverageSummary, NamedSeries,
    PeriodSummary, PriceComparison, PriceSummary, RsiSignal, RsiSummary, Summary, Trend,
    VolatilityLevel, VolatilitySummary, Visualization, VolumeSummary,
};
pub use candle::{closes, volumes, Candle};
pub use envelope::{ErrorBody, ErrorCode, ResponseEnvelope, SuccessBody, SuccessMetadata};
pub use indicators::IndicatorSeries;
pub use intent::{Intent, ParsedQuery};
pub use window::WindowDescriptor;

/// Candle sequence for the whole dataset, ascending by time
pub type TimeSeries = Vec<Candle>;
