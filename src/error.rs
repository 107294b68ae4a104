use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An indicator or window needs more history than is available
    #[error("Insufficient data for {context}: need at least {required} values, got {available}")]
    InsufficientData {
        context: String,
        required: usize,
        available: usize,
    },

    /// The requested window resolved to zero candles
    #[error("No data: {0}")]
    NoData(String),

    /// The backing dataset could not be loaded
    #[error("Data load error: {0}")]
    DataLoad(String),

    #[error("Calculation error: {0}")]
    Calculation(String),
}

impl AppError {
    pub fn insufficient(context: impl Into<String>, required: usize, available: usize) -> Self {
        AppError::InsufficientData {
            context: context.into(),
            required,
            available,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::Io(format!("CSV error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

// Alias for convenience
pub type Error = AppError;
