pub mod analysis;
pub mod api;

use crate::services::SharedDataStore;
use analysis::{QueryOrchestrator, SharedOrchestrator};
use axum::{
    extract::FromRef,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub data: SharedDataStore,
    pub orchestrator: SharedOrchestrator,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(data: SharedDataStore) -> Self {
        Self {
            orchestrator: Arc::new(QueryOrchestrator::new(data.clone())),
            data,
            started_at: Utc::now(),
        }
    }
}

// FromRef implementations to extract specific state components
impl FromRef<AppState> for SharedDataStore {
    fn from_ref(app_state: &AppState) -> SharedDataStore {
        app_state.data.clone()
    }
}

/// Routes plus CORS, without binding a socket
pub fn router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route(
            "/api/query",
            post(api::query_handler)
                .options(api::preflight_handler)
                .fallback(api::method_not_allowed_handler),
        )
        .route("/api/indicators", get(api::indicators_handler))
        .route("/health", get(api::health_handler))
        .layer(cors)
        .with_state(app_state)
}

/// Start the axum server
pub async fn serve(shared_data: SharedDataStore, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    tracing::info!("Starting solquery server");

    let app = router(AppState::new(shared_data));

    tracing::info!("Registering routes:");
    tracing::info!("  POST /api/query  {{\"prompt\": \"RSI últimos 14 días\"}}");
    tracing::info!("  GET  /api/indicators?days=90");
    tracing::info!("  GET  /health");

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "Server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
