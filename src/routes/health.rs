use axum::{extract::State, routing::get, Json, Router};
use crate::db::health_check;
use crate::models::{AppState, HealthResponse};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(get_health))
        .with_state(state)
}

async fn get_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match health_check(&state.pool).await {
        Ok(_) => "connected",
        Err(_) => "unavailable",
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        database: database.to_string(),
        index_loaded: state.pipeline.retriever().is_loaded().await,
    })
}
