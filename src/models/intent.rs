use super::WindowDescriptor;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a question asks about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Price,
    Volume,
    Rsi,
    Sma,
    Ema,
    Volatility,
    Macd,
    Bollinger,
    Comparison,
    Correlation,
    /// Fallback when nothing specific was recognized
    Explore,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Price => "price",
            Intent::Volume => "volume",
            Intent::Rsi => "rsi",
            Intent::Sma => "sma",
            Intent::Ema => "ema",
            Intent::Volatility => "volatility",
            Intent::Macd => "macd",
            Intent::Bollinger => "bollinger",
            Intent::Comparison => "comparison",
            Intent::Correlation => "correlation",
            Intent::Explore => "explore",
        }
    }

    /// Spanish display name used in messages
    pub fn display_name(&self) -> &'static str {
        match self {
            Intent::Price => "precio",
            Intent::Volume => "volumen",
            Intent::Rsi => "RSI",
            Intent::Sma => "media móvil simple",
            Intent::Ema => "media móvil exponencial",
            Intent::Volatility => "volatilidad",
            Intent::Macd => "MACD",
            Intent::Bollinger => "bandas de Bollinger",
            Intent::Comparison => "comparación precio vs media",
            Intent::Correlation => "correlación volumen/precio",
            Intent::Explore => "resumen general",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of resolving a free-text question
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedQuery {
    pub intent: Intent,
    /// Same as `intent` when a lexicon entry matched, absent for the explore fallback
    pub metric: Option<Intent>,
    pub window: WindowDescriptor,
    /// Heuristic match strength in [0, 1]
    pub confidence: f64,
    pub raw_text: String,
}
