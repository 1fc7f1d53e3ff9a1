use axum::{
    extract::State,
    routing::post,
    Json, Router,
};
use crate::db::DatabaseOperations;
use crate::models::{AppState, ChatRequest, ChatResponse};
use crate::types::AppError;
use std::time::Instant;
use tracing::info;
use validator::Validate;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(post_chat))
        .with_state(state)
}

pub async fn post_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    request
        .validate()
        .map_err(|e| AppError::InvalidRequest(e.to_string()))?;
    let question = request.message.trim();
    if question.is_empty() {
        return Err(AppError::InvalidRequest("message must not be blank".to_string()));
    }

    let start = Instant::now();
    info!(chat_id = ?request.chat_id, message_len = question.len(), "Received chat request");

    let existing = match request.chat_id {
        Some(id) => Some(
            DatabaseOperations::get_chat(&state.pool, id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Chat {} not found", id)))?,
        ),
        None => None,
    };

    // Nothing is stored unless the pipeline produced an answer
    let result = state.pipeline.answer(question).await?;
    let tool = result
        .tool
        .map(|t| t.to_string())
        .unwrap_or_else(|| "rag".to_string());

    let (chat, message) =
        DatabaseOperations::record_exchange(&state.pool, existing, question, &result.final_answer, &tool).await?;

    let response_time_ms = start.elapsed().as_millis() as u64;
    info!(message_id = %message.id, tool = %tool, response_time_ms, "Chat response sent");

    Ok(Json(ChatResponse {
        chat_id: chat.id,
        message_id: message.id,
        answer: result.final_answer,
        tool,
        response_time_ms,
    }))
}
