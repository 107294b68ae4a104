//! Question answering over the candle store
//!
//! [`QueryOrchestrator`] validates a prompt, resolves it with the
//! [`IntentParser`], selects the candle window from one store snapshot and
//! hands the slice to a pure per-intent handler. It is the only place where
//! [`AppError`](crate::error::AppError) variants become wire error codes.

pub mod handlers;

use crate::constants::{DEFAULT_USER_ID, MAX_PROMPT_CHARS, ORCHESTRATOR_MIN_CONFIDENCE};
use crate::error::Error;
use crate::models::{
    Candle, ErrorCode, ParsedQuery, ResponseEnvelope, SuccessBody, SuccessMetadata,
    WindowDescriptor,
};
use crate::services::data_store::{by_year, SharedDataStore};
use crate::services::intent_parser::IntentParser;
use chrono::Utc;
use handlers::{dispatch, period_hint, AnalysisRequest};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

pub type SharedOrchestrator = Arc<QueryOrchestrator>;

pub struct QueryOrchestrator {
    store: SharedDataStore,
    parser: IntentParser,
}

impl QueryOrchestrator {
    pub fn new(store: SharedDataStore) -> Self {
        Self {
            store,
            parser: IntentParser::new(),
        }
    }

    /// Answer one question
    #[instrument(skip_all, fields(user = user_id.unwrap_or(DEFAULT_USER_ID)))]
    pub async fn handle(&self, prompt: Option<&str>, user_id: Option<&str>) -> ResponseEnvelope {
        let prompt = match validate_prompt(prompt) {
            Ok(prompt) => prompt,
            Err(envelope) => return envelope,
        };

        let parsed = self.parser.parse(prompt);
        info!(
            intent = %parsed.intent,
            window = %parsed.window,
            confidence = parsed.confidence,
            "Resolved question"
        );

        if !self.parser.is_valid(&parsed, ORCHESTRATOR_MIN_CONFIDENCE) {
            return self.clarification(&parsed);
        }

        let snapshot = match self.store.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(Error::DataLoad(msg)) => {
                error!("Failed to load dataset: {}", msg);
                return ResponseEnvelope::error(
                    ErrorCode::DataLoadError,
                    format!("No se pudieron cargar los datos históricos: {}", msg),
                );
            }
            Err(e) => {
                error!("Unexpected error while loading dataset: {}", e);
                return internal_error();
            }
        };

        let candles = match select_candles(&snapshot, parsed.window) {
            Ok(candles) => candles,
            Err(Error::NoData(msg)) => {
                info!(window = %parsed.window, "No candles for window");
                return ResponseEnvelope::error(ErrorCode::NoData, msg);
            }
            Err(e) => {
                error!("Unexpected error while selecting window: {}", e);
                return internal_error();
            }
        };

        let request = AnalysisRequest {
            window: parsed.window,
            period_override: period_hint(&parsed.raw_text, parsed.window),
        };
        debug!(records = candles.len(), ?request.period_override, "Dispatching analysis");

        match dispatch(parsed.intent, &candles, &request) {
            Ok(outcome) => {
                let mut suggestions = Vec::new();
                if self.parser.needs_clarification(&parsed) {
                    suggestions.push(self.parser.ask_for_clarification(&parsed));
                }
                suggestions.extend(self.parser.suggest_follow_up(&parsed));

                ResponseEnvelope::success(
                    SuccessBody {
                        message: outcome.message,
                        visualization: outcome.visualization,
                        analysis: Some(outcome.analysis),
                        suggestions,
                    },
                    metadata(&parsed, candles.len()),
                )
            }
            Err(e @ (Error::InsufficientData { .. } | Error::Calculation(_) | Error::InvalidInput(_))) => {
                warn!(intent = %parsed.intent, "Analysis failed: {}", e);
                ResponseEnvelope::error(
                    ErrorCode::CalculationError,
                    format!("No se pudo calcular {}: {}", parsed.intent.display_name(), e),
                )
            }
            Err(e) => {
                error!(intent = %parsed.intent, "Unexpected analysis error: {}", e);
                internal_error()
            }
        }
    }

    /// Successful response asking the user to rephrase
    fn clarification(&self, parsed: &ParsedQuery) -> ResponseEnvelope {
        debug!(confidence = parsed.confidence, "Confidence below threshold, asking for clarification");
        ResponseEnvelope::success(
            SuccessBody {
                message: self.parser.ask_for_clarification(parsed),
                visualization: None,
                analysis: None,
                suggestions: self.parser.suggest_follow_up(parsed),
            },
            metadata(parsed, 0),
        )
    }
}

fn validate_prompt(prompt: Option<&str>) -> Result<&str, ResponseEnvelope> {
    let Some(prompt) = prompt else {
        return Err(ResponseEnvelope::error(
            ErrorCode::MissingPrompt,
            "El campo 'prompt' es obligatorio",
        ));
    };
    if prompt.trim().is_empty() {
        return Err(ResponseEnvelope::error(
            ErrorCode::InvalidPrompt,
            "La pregunta no puede estar vacía",
        ));
    }
    if prompt.chars().count() > MAX_PROMPT_CHARS {
        return Err(ResponseEnvelope::error(
            ErrorCode::PromptTooLong,
            format!("La pregunta supera el máximo de {} caracteres", MAX_PROMPT_CHARS),
        ));
    }
    Ok(prompt)
}

/// Candles for a window; a window the history cannot fill is [`Error::NoData`]
fn select_candles(snapshot: &[Candle], window: WindowDescriptor) -> Result<Vec<Candle>, Error> {
    match window {
        WindowDescriptor::Days(n) if n == 0 || n > snapshot.len() => Err(Error::NoData(format!(
            "No hay suficientes datos para {}: el historial tiene {} días",
            window.describe(),
            snapshot.len()
        ))),
        WindowDescriptor::Days(n) => Ok(snapshot[snapshot.len() - n..].to_vec()),
        WindowDescriptor::CalendarYear(year) => {
            let candles = by_year(snapshot, year);
            if candles.is_empty() {
                Err(Error::NoData(format!(
                    "No hay datos disponibles para el año {}",
                    year
                )))
            } else {
                Ok(candles)
            }
        }
    }
}

fn metadata(parsed: &ParsedQuery, records_analyzed: usize) -> SuccessMetadata {
    SuccessMetadata {
        timestamp: Utc::now().to_rfc3339(),
        records_analyzed,
        parse_confidence: parsed.confidence,
        intent: parsed.intent,
        period: parsed.window,
    }
}

fn internal_error() -> ResponseEnvelope {
    ResponseEnvelope::error(
        ErrorCode::InternalServerError,
        "Error interno al procesar la consulta",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Intent;
    use crate::services::data_store::test_support::{daily_candles, jan_first, memory_store};
    use crate::services::data_store::{CsvFileSource, DataStore, SystemClock};
    use std::path::PathBuf;

    fn orchestrator(candles: Vec<Candle>) -> QueryOrchestrator {
        QueryOrchestrator::new(Arc::new(memory_store(candles)))
    }

    fn rising(n: usize) -> Vec<Candle> {
        let closes: Vec<f64> = (0..n).map(|i| 10.0 + i as f64).collect();
        daily_candles(jan_first(2023), &closes)
    }

    #[tokio::test]
    async fn test_prompt_validation() {
        let orch = orchestrator(rising(30));

        let missing = orch.handle(None, None).await;
        assert_eq!(missing.error_code(), Some(ErrorCode::MissingPrompt));
        assert_eq!(missing.http_status(), 400);

        let blank = orch.handle(Some("   "), None).await;
        assert_eq!(blank.error_code(), Some(ErrorCode::InvalidPrompt));

        let too_long = "a".repeat(501);
        let long = orch.handle(Some(&too_long), None).await;
        assert_eq!(long.error_code(), Some(ErrorCode::PromptTooLong));

        let at_limit = "precio ".repeat(71) + "sol";
        assert!(at_limit.chars().count() <= 500);
        assert!(orch.handle(Some(&at_limit), None).await.is_success());
    }

    #[tokio::test]
    async fn test_volume_in_2023() {
        let mut candles = daily_candles(jan_first(2022), &[1.0; 365]);
        // Whole-number volumes keep the sum exact in f64
        let volumes: Vec<f64> = (0..365).map(|i| 1_000.0 + ((i * 37) % 101) as f64 * 10.0).collect();
        let mut year = daily_candles(jan_first(2023), &[2.0; 365]);
        for (candle, volume) in year.iter_mut().zip(&volumes) {
            candle.volume = *volume;
        }
        candles.extend(year);
        candles.extend(daily_candles(jan_first(2024), &[3.0; 10]));
        let orch = orchestrator(candles);

        let envelope = orch.handle(Some("volumen en 2023"), Some("tester")).await;
        assert!(envelope.is_success());

        let total: f64 = volumes.iter().sum();
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["response"]["analysis"]["summary"]["total"], total);
        assert_eq!(json["response"]["analysis"]["summary"]["average"], total / 365.0);
        assert_eq!(json["metadata"]["recordsAnalyzed"], 365);
        assert_eq!(json["metadata"]["intent"], "volume");
        assert_eq!(json["metadata"]["period"]["type"], "calendar_year");
        assert_eq!(json["metadata"]["period"]["value"], 2023);
    }

    #[tokio::test]
    async fn test_sma_against_rising_price() {
        let orch = orchestrator(rising(30));

        let envelope = orch.handle(Some("sma 20 del último mes"), None).await;
        let json = serde_json::to_value(&envelope).unwrap();

        assert_eq!(json["status"], "success");
        assert_eq!(json["metadata"]["intent"], "sma");
        assert_eq!(json["metadata"]["recordsAnalyzed"], 30);
        assert_eq!(json["response"]["analysis"]["label"], "sma_20");
        assert_eq!(json["response"]["analysis"]["comparison"]["type"], "vs_price");
        assert_eq!(json["response"]["analysis"]["comparison"]["trend"], "alcista");
        assert_eq!(json["response"]["visualization"]["data"].as_array().unwrap().len(), 30);
    }

    #[tokio::test]
    async fn test_window_beyond_history_is_no_data() {
        let orch = orchestrator(rising(30));
        let envelope = orch.handle(Some("precio últimos 400 días"), None).await;
        assert_eq!(envelope.error_code(), Some(ErrorCode::NoData));
        assert_eq!(envelope.http_status(), 404);
    }

    #[tokio::test]
    async fn test_year_without_candles_is_no_data() {
        let orch = orchestrator(rising(30));
        let envelope = orch.handle(Some("precio en 2021"), None).await;
        assert_eq!(envelope.error_code(), Some(ErrorCode::NoData));
    }

    #[tokio::test]
    async fn test_period_literal_applies_to_indicator() {
        // 14 days of candles cannot feed a 14-period RSI
        let orch = orchestrator(rising(30));
        let envelope = orch.handle(Some("RSI últimos 14 días"), None).await;
        assert_eq!(envelope.error_code(), Some(ErrorCode::CalculationError));
        assert_eq!(envelope.http_status(), 500);

        let envelope = orch.handle(Some("RSI 10 de los últimos 20 días"), None).await;
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["response"]["analysis"]["label"], "rsi_10");
        assert_eq!(json["metadata"]["recordsAnalyzed"], 20);
    }

    #[tokio::test]
    async fn test_oversized_period_literal_is_calculation_error() {
        let orch = orchestrator(rising(400));
        for prompt in ["rsi 18446744073709551615", "volatilidad 99999999999999999999999 de 30 días"] {
            let envelope = orch.handle(Some(prompt), None).await;
            assert_eq!(envelope.error_code(), Some(ErrorCode::CalculationError), "{}", prompt);
        }
    }

    #[tokio::test]
    async fn test_conjunction_is_not_a_year_unit() {
        let orch = orchestrator(rising(400));
        let envelope = orch.handle(Some("compara sma 20 y 50 días"), None).await;
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["metadata"]["recordsAnalyzed"], 50);
    }

    #[test]
    fn test_unfillable_window_is_no_data_error() {
        let candles = rising(30);
        assert!(matches!(
            select_candles(&candles, WindowDescriptor::Days(31)),
            Err(Error::NoData(_))
        ));
        assert!(matches!(
            select_candles(&candles, WindowDescriptor::CalendarYear(2020)),
            Err(Error::NoData(_))
        ));
        assert_eq!(select_candles(&candles, WindowDescriptor::Days(30)).unwrap().len(), 30);
    }

    #[tokio::test]
    async fn test_rsi_with_default_window() {
        let orch = orchestrator(rising(40));
        let envelope = orch.handle(Some("¿cómo está el rsi?"), None).await;
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["response"]["analysis"]["period"], 14);
        assert_eq!(json["response"]["analysis"]["summary"]["signal"], "overbought");
        assert_eq!(json["metadata"]["period"]["value"], 30);
    }

    #[tokio::test]
    async fn test_explore_fallback_adds_clarification() {
        let orch = orchestrator(rising(40));
        let envelope = orch.handle(Some("hola"), None).await;
        let json = serde_json::to_value(&envelope).unwrap();

        assert_eq!(json["status"], "success");
        assert_eq!(json["metadata"]["intent"], "explore");
        assert_eq!(json["metadata"]["parseConfidence"], 0.2);
        assert_eq!(json["response"]["analysis"]["label"], "period_summary");
        let first_suggestion = json["response"]["suggestions"][0].as_str().unwrap();
        assert!(first_suggestion.contains("hola"));
    }

    #[tokio::test]
    async fn test_low_confidence_clarification_response() {
        let orch = orchestrator(rising(5));
        let parsed = ParsedQuery {
            intent: Intent::Explore,
            metric: None,
            window: WindowDescriptor::Days(30),
            confidence: 0.1,
            raw_text: "???".to_string(),
        };
        let envelope = orch.clarification(&parsed);
        assert!(envelope.is_success());

        let json = serde_json::to_value(&envelope).unwrap();
        assert!(json["response"]["analysis"].is_null());
        assert!(json["response"]["visualization"].is_null());
        assert_eq!(json["metadata"]["recordsAnalyzed"], 0);
    }

    #[tokio::test]
    async fn test_missing_dataset_is_data_load_error() {
        let store = DataStore::with_source(
            Box::new(CsvFileSource::new(PathBuf::from("/no/such/file.csv"))),
            Arc::new(SystemClock),
            300,
        );
        let orch = QueryOrchestrator::new(Arc::new(store));
        let envelope = orch.handle(Some("precio"), None).await;
        assert_eq!(envelope.error_code(), Some(ErrorCode::DataLoadError));
        assert_eq!(envelope.http_status(), 500);
    }

    #[tokio::test]
    async fn test_empty_dataset_is_no_data() {
        let orch = orchestrator(Vec::new());
        let envelope = orch.handle(Some("precio"), None).await;
        assert_eq!(envelope.error_code(), Some(ErrorCode::NoData));
    }
}
