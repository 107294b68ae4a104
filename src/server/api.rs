use crate::constants::{DEFAULT_DASHBOARD_DAYS, RESPONSE_CACHE_MAX_AGE};
use crate::error::Error;
use crate::models::indicators::{compute_all, IndicatorSnapshot};
use crate::models::{ErrorCode, ResponseEnvelope};
use crate::server::AppState;
use crate::services::api_logging::{determine_data_source, write_api_log_entry, ApiPerformanceMetrics};
use crate::services::data_store::DatasetStats;
use crate::services::SharedDataStore;
use crate::utils::format_date;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{
        header::{ACCESS_CONTROL_ALLOW_ORIGIN, CACHE_CONTROL, CONTENT_TYPE},
        Method, StatusCode,
    },
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

/// Body of POST /api/query
#[derive(Debug, Default, Deserialize)]
pub struct QueryRequest {
    pub prompt: Option<String>,
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

/// An empty body counts as a request without a prompt
fn parse_query_request(body: &[u8]) -> Result<QueryRequest, ResponseEnvelope> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(QueryRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| {
        debug!("Rejecting malformed query body: {}", e);
        ResponseEnvelope::error(
            ErrorCode::InvalidPrompt,
            format!("Cuerpo JSON inválido: {}", e),
        )
    })
}

fn cache_control_value() -> String {
    format!("public, max-age={}", RESPONSE_CACHE_MAX_AGE)
}

/// Serialize an envelope with its status and headers; also returns the body size
fn envelope_response(envelope: &ResponseEnvelope) -> (Response, usize) {
    let status = StatusCode::from_u16(envelope.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    match serde_json::to_vec(envelope) {
        Ok(body) => {
            let size = body.len();
            let headers = [
                (CONTENT_TYPE, "application/json".to_string()),
                (CACHE_CONTROL, cache_control_value()),
                (ACCESS_CONTROL_ALLOW_ORIGIN, "*".to_string()),
            ];
            ((status, headers, body).into_response(), size)
        }
        Err(e) => {
            error!("Failed to serialize response envelope: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR.into_response(), 0)
        }
    }
}

/// POST /api/query - Answer a free-text question about the dataset
///
/// Body: `{"prompt": "RSI últimos 14 días", "userId": "optional"}`
#[instrument(skip(app_state, body))]
pub async fn query_handler(State(app_state): State<AppState>, body: Bytes) -> Response {
    let mut metrics = ApiPerformanceMetrics::new(Utc::now(), "/api/query");
    metrics.data_source = determine_data_source(app_state.data.is_warm().await);

    let envelope = match parse_query_request(&body) {
        Ok(request) => {
            app_state
                .orchestrator
                .handle(request.prompt.as_deref(), request.user_id.as_deref())
                .await
        }
        Err(envelope) => envelope,
    };

    match &envelope {
        ResponseEnvelope::Success { metadata, .. } => {
            metrics.intent = metadata.intent.to_string();
            metrics.records_analyzed = metadata.records_analyzed;
        }
        ResponseEnvelope::Error { error, .. } => metrics.fail(error.code.as_str()),
    }

    let (response, size) = envelope_response(&envelope);
    metrics.response_size_bytes = size;
    metrics.complete();
    write_api_log_entry(&metrics);

    response
}

/// OPTIONS /api/query - Empty 200 for clients that probe without CORS headers
pub async fn preflight_handler() -> impl IntoResponse {
    (StatusCode::OK, [(ACCESS_CONTROL_ALLOW_ORIGIN, "*")])
}

/// Any other method on /api/query
pub async fn method_not_allowed_handler(method: Method) -> Response {
    warn!(%method, "Method not allowed on /api/query");
    let envelope = ResponseEnvelope::error(
        ErrorCode::MethodNotAllowed,
        format!("Método {} no permitido, usa POST", method),
    );
    envelope_response(&envelope).0
}

/// Health payload
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub uptime_secs: i64,
    pub cache_age_secs: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset: Option<DatasetStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// GET /health - Dataset coverage, cache age and uptime
#[instrument(skip(app_state))]
pub async fn health_handler(State(app_state): State<AppState>) -> impl IntoResponse {
    debug!("Received request for health stats");

    let stats = app_state.data.stats().await;
    let cache_age_secs = app_state.data.cache_age_seconds().await;
    let now = Utc::now();
    let uptime_secs = now.signed_duration_since(app_state.started_at).num_seconds();

    // No request log for /health (too noisy)
    match stats {
        Ok(stats) => {
            info!(records = stats.records, cache_age_secs, "Returning health stats");
            (
                StatusCode::OK,
                Json(HealthResponse {
                    status: "healthy",
                    timestamp: now.to_rfc3339(),
                    uptime_secs,
                    cache_age_secs,
                    dataset: Some(stats),
                    error: None,
                }),
            )
        }
        Err(e) => {
            warn!("Health check could not read dataset: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "degraded",
                    timestamp: now.to_rfc3339(),
                    uptime_secs,
                    cache_age_secs,
                    dataset: None,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

/// Query parameters for /api/indicators
#[derive(Debug, Deserialize)]
pub struct IndicatorsQuery {
    /// Number of trailing candles (default: 90)
    pub days: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct IndicatorsResponse {
    pub days: usize,
    pub first_date: Option<String>,
    pub last_date: Option<String>,
    pub indicators: IndicatorSnapshot,
}

/// GET /api/indicators - Every indicator over the last N candles
///
/// Examples:
/// - /api/indicators (last 90 candles)
/// - /api/indicators?days=365
#[instrument(skip(data))]
pub async fn indicators_handler(
    State(data): State<SharedDataStore>,
    Query(params): Query<IndicatorsQuery>,
) -> Response {
    let days = params.days.unwrap_or(DEFAULT_DASHBOARD_DAYS);

    match data.last_days(days).await {
        Ok(candles) => {
            let indicators = compute_all(&candles);
            debug!(records = indicators.records, "Computed indicator snapshot");
            let headers = [(CACHE_CONTROL, cache_control_value())];
            let body = IndicatorsResponse {
                days,
                first_date: candles.first().map(|c| format_date(&c.time)),
                last_date: candles.last().map(|c| format_date(&c.time)),
                indicators,
            };
            (StatusCode::OK, headers, Json(body)).into_response()
        }
        Err(e) => {
            let code = match &e {
                Error::DataLoad(_) => ErrorCode::DataLoadError,
                Error::InsufficientData { .. } => ErrorCode::NoData,
                _ => ErrorCode::InternalServerError,
            };
            warn!(days, "Indicator request failed: {}", e);
            envelope_response(&ResponseEnvelope::error(code, e.to_string())).0
        }
    }
}
