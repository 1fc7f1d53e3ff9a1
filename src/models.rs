use crate::agents::MedicalPipeline;
use crate::config::Config;
use sqlx::SqlitePool;
use std::sync::Arc;
use validator::Validate;

/// Longest accepted chat message, in characters
pub const MAX_MESSAGE_LEN: u64 = 4000;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    pub pipeline: Arc<MedicalPipeline>,
}

// Stored rows
// Note: FromRow is needed for runtime query_as (no DATABASE_URL at compile time)

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
pub struct Chat {
    pub id: uuid::Uuid,
    pub title: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: uuid::Uuid,
    pub chat_id: uuid::Uuid,
    pub role: String,
    pub content: String,
    /// Route that produced an assistant answer
    pub tool: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

// API Request/Response types

#[derive(Debug, serde::Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(length(min = 1, max = MAX_MESSAGE_LEN))]
    pub message: String,
    /// Continue an existing chat; a new one is created when absent
    pub chat_id: Option<uuid::Uuid>,
}

#[derive(Debug, serde::Serialize)]
pub struct ChatResponse {
    pub chat_id: uuid::Uuid,
    pub message_id: uuid::Uuid,
    pub answer: String,
    pub tool: String,
    pub response_time_ms: u64,
}

#[derive(Debug, serde::Serialize)]
pub struct ClearHistoryResponse {
    pub chats_deleted: u64,
    pub messages_deleted: u64,
}

#[derive(Debug, serde::Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub database: String,
    pub index_loaded: bool,
}
