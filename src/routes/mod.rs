//! API Routes
//!
//! - `/api/chat` - Ask a question, answer stored in the chat history
//! - `/api/chats` - Chat list and per-chat messages
//! - `/api/history` - Clear the whole history
//! - `/api/health` - Health check

pub mod chat;
pub mod health;
pub mod history;

use crate::middleware::apply_cors;
use crate::models::AppState;
use crate::types::AppError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");
    let origins = state.config.server.cors_allowed_origins.clone();

    let api_router = Router::new()
        .merge(chat::router(state.clone()))
        .merge(history::router(state.clone()))
        .merge(health::router(state));

    apply_cors(api_router, &origins).layer(TraceLayer::new_for_http())
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }

        let body = Json(serde_json::json!({
            "error": status.canonical_reason().unwrap_or("Error"),
            "details": self.to_string(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::agents::MedicalPipeline;
    use crate::config::Config;
    use crate::db::create_memory_pool;
    use crate::embeddings::retriever::tests::KeywordEmbedder;
    use crate::embeddings::Retriever;
    use crate::tools::tests::FakeTool;
    use crate::tools::{ToolKind, ToolRegistry};
    use axum::body::Body;
    use axum::http::{Method, Request};
    use std::sync::Arc;
    use tower::ServiceExt;

    pub(crate) async fn test_state() -> AppState {
        let config = Config::default();
        let registry = ToolRegistry::new()
            .with_tool(FakeTool::ok(ToolKind::Rag, &["Disease: Gout\nTreatments: colchicine"]))
            .with_tool(FakeTool::ok(ToolKind::Pubmed, &[]))
            .with_tool(FakeTool::ok(ToolKind::Research, &[]))
            .with_tool(FakeTool::ok(ToolKind::Websearch, &[]));
        let retriever = Arc::new(Retriever::new(
            Arc::new(KeywordEmbedder::new()),
            std::env::temp_dir().join("medbot-route-tests-no-index").join("index.json"),
        ));
        let pipeline = MedicalPipeline::from_parts(registry, None, &config, retriever).unwrap();

        AppState {
            pool: create_memory_pool().await.unwrap(),
            config,
            pipeline: Arc::new(pipeline),
        }
    }

    pub(crate) async fn send(
        state: &AppState,
        method: Method,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = create_router(state.clone())
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };
        (status, json)
    }

    #[test]
    fn test_error_status_mapping() {
        let response = AppError::InvalidRequest("empty".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let response = AppError::NotFound("chat".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let response = AppError::Internal("boom".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
