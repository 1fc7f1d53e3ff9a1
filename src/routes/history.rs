use axum::{
    extract::{Path, State},
    routing::{delete, get},
    Json, Router,
};
use crate::db::DatabaseOperations;
use crate::models::{AppState, Chat, ClearHistoryResponse, Message};
use crate::types::AppError;
use tracing::info;
use uuid::Uuid;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chats", get(list_chats))
        .route("/api/chats/{id}/messages", get(get_messages))
        .route("/api/history", delete(clear_history))
        .with_state(state)
}

async fn list_chats(State(state): State<AppState>) -> Result<Json<Vec<Chat>>, AppError> {
    Ok(Json(DatabaseOperations::list_chats(&state.pool).await?))
}

async fn get_messages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Message>>, AppError> {
    if DatabaseOperations::get_chat(&state.pool, id).await?.is_none() {
        return Err(AppError::NotFound(format!("Chat {} not found", id)));
    }
    Ok(Json(DatabaseOperations::get_messages(&state.pool, id).await?))
}

async fn clear_history(State(state): State<AppState>) -> Result<Json<ClearHistoryResponse>, AppError> {
    let (chats_deleted, messages_deleted) = DatabaseOperations::clear_all(&state.pool).await?;
    info!(chats_deleted, messages_deleted, "Chat history cleared");
    Ok(Json(ClearHistoryResponse {
        chats_deleted,
        messages_deleted,
    }))
}

#[cfg(test)]
mod tests {
    use crate::db::{DatabaseOperations, ROLE_USER};
    use crate::routes::tests::{send, test_state};
    use axum::http::{Method, StatusCode};

    #[tokio::test]
    async fn test_list_and_messages() {
        let state = test_state().await;
        let chat = DatabaseOperations::create_chat(&state.pool, "Migraine").await.unwrap();
        DatabaseOperations::add_message(&state.pool, chat.id, ROLE_USER, "migraine triggers?", None)
            .await
            .unwrap();

        let (status, body) = send(&state, Method::GET, "/api/chats", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["title"], "Migraine");

        let uri = format!("/api/chats/{}/messages", chat.id);
        let (status, body) = send(&state, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["content"], "migraine triggers?");
        assert_eq!(body[0]["role"], "user");
    }

    #[tokio::test]
    async fn test_unknown_chat_is_404() {
        let state = test_state().await;
        let uri = format!("/api/chats/{}/messages", uuid::Uuid::new_v4());
        let (status, body) = send(&state, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["details"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn test_clear_history() {
        let state = test_state().await;
        let chat = DatabaseOperations::create_chat(&state.pool, "a").await.unwrap();
        DatabaseOperations::add_message(&state.pool, chat.id, ROLE_USER, "q", None)
            .await
            .unwrap();

        let (status, body) = send(&state, Method::DELETE, "/api/history", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["chats_deleted"], 1);
        assert_eq!(body["messages_deleted"], 1);
    }
}
