use super::{AnalysisResult, Intent, Visualization, WindowDescriptor};
use chrono::Utc;
use serde::Serialize;

/// Wire-level error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    MethodNotAllowed,
    MissingPrompt,
    InvalidPrompt,
    PromptTooLong,
    DataLoadError,
    NoData,
    CalculationError,
    InternalServerError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            ErrorCode::MissingPrompt => "MISSING_PROMPT",
            ErrorCode::InvalidPrompt => "INVALID_PROMPT",
            ErrorCode::PromptTooLong => "PROMPT_TOO_LONG",
            ErrorCode::DataLoadError => "DATA_LOAD_ERROR",
            ErrorCode::NoData => "NO_DATA",
            ErrorCode::CalculationError => "CALCULATION_ERROR",
            ErrorCode::InternalServerError => "INTERNAL_SERVER_ERROR",
        }
    }

    /// HTTP status paired with each code
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCode::MissingPrompt | ErrorCode::InvalidPrompt | ErrorCode::PromptTooLong => 400,
            ErrorCode::MethodNotAllowed => 405,
            ErrorCode::NoData => 404,
            ErrorCode::DataLoadError | ErrorCode::CalculationError | ErrorCode::InternalServerError => 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuccessBody {
    pub message: String,
    pub visualization: Option<Visualization>,
    pub analysis: Option<AnalysisResult>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessMetadata {
    pub timestamp: String,
    pub records_analyzed: usize,
    pub parse_confidence: f64,
    pub intent: Intent,
    pub period: WindowDescriptor,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorMetadata {
    pub timestamp: String,
}

/// Uniform response shape for the query endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ResponseEnvelope {
    Success {
        response: SuccessBody,
        metadata: SuccessMetadata,
    },
    Error {
        error: ErrorBody,
        metadata: ErrorMetadata,
    },
}

impl ResponseEnvelope {
    pub fn success(response: SuccessBody, metadata: SuccessMetadata) -> Self {
        ResponseEnvelope::Success { response, metadata }
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ResponseEnvelope::Error {
            error: ErrorBody {
                code,
                message: message.into(),
            },
            metadata: ErrorMetadata {
                timestamp: Utc::now().to_rfc3339(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ResponseEnvelope::Success { .. })
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            ResponseEnvelope::Error { error, .. } => Some(error.code),
            ResponseEnvelope::Success { .. } => None,
        }
    }

    pub fn http_status(&self) -> u16 {
        self.error_code().map_or(200, |code| code.http_status())
    }
}
