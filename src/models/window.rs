use serde::{Deserialize, Serialize};
use std::fmt;

/// Time window a question refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum WindowDescriptor {
    /// The last `n` candles of the dataset
    Days(usize),
    /// Every candle whose open time falls in the given year
    CalendarYear(i32),
}

impl WindowDescriptor {
    /// Short label used in response metadata ("30d", "2023")
    pub fn label(&self) -> String {
        match self {
            WindowDescriptor::Days(n) => format!("{}d", n),
            WindowDescriptor::CalendarYear(year) => year.to_string(),
        }
    }

    /// Human-readable Spanish description ("los últimos 30 días", "el año 2023")
    pub fn describe(&self) -> String {
        match self {
            WindowDescriptor::Days(1) => "el último día".to_string(),
            WindowDescriptor::Days(n) => format!("los últimos {} días", n),
            WindowDescriptor::CalendarYear(year) => format!("el año {}", year),
        }
    }
}

impl fmt::Display for WindowDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}
