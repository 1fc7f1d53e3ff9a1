use crate::models::{Chat, Message};
use crate::types::AppResult;
use chrono::Utc;
use sqlx::{Executor, Sqlite, SqlitePool};
use uuid::Uuid;

/// Characters of the first question kept as the chat title
pub const TITLE_MAX_CHARS: usize = 60;

pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";

pub struct DatabaseOperations;

impl DatabaseOperations {
    // Chat operations
    pub async fn create_chat<'e, E>(executor: E, title: &str) -> AppResult<Chat>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let chat = Chat {
            id: Uuid::new_v4(),
            title: title.to_string(),
            created_at: Utc::now(),
        };

        sqlx::query("INSERT INTO chats (id, title, created_at) VALUES (?1, ?2, ?3)")
            .bind(chat.id)
            .bind(&chat.title)
            .bind(chat.created_at)
            .execute(executor)
            .await?;

        Ok(chat)
    }

    pub async fn get_chat(pool: &SqlitePool, chat_id: Uuid) -> AppResult<Option<Chat>> {
        let chat = sqlx::query_as::<_, Chat>("SELECT id, title, created_at FROM chats WHERE id = ?1")
            .bind(chat_id)
            .fetch_optional(pool)
            .await?;

        Ok(chat)
    }

    /// Newest first
    pub async fn list_chats(pool: &SqlitePool) -> AppResult<Vec<Chat>> {
        let chats = sqlx::query_as::<_, Chat>("SELECT id, title, created_at FROM chats ORDER BY rowid DESC")
            .fetch_all(pool)
            .await?;

        Ok(chats)
    }

    // Message operations
    pub async fn add_message<'e, E>(
        executor: E,
        chat_id: Uuid,
        role: &str,
        content: &str,
        tool: Option<&str>,
    ) -> AppResult<Message>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let message = Message {
            id: Uuid::new_v4(),
            chat_id,
            role: role.to_string(),
            content: content.to_string(),
            tool: tool.map(str::to_string),
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO messages (id, chat_id, role, content, tool, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(message.id)
        .bind(message.chat_id)
        .bind(&message.role)
        .bind(&message.content)
        .bind(&message.tool)
        .bind(message.created_at)
        .execute(executor)
        .await?;

        Ok(message)
    }

    /// Store a question and its answer together, creating the chat when
    /// `chat` is `None`. Returns the chat and the assistant message.
    pub async fn record_exchange(
        pool: &SqlitePool,
        chat: Option<Chat>,
        question: &str,
        answer: &str,
        tool: &str,
    ) -> AppResult<(Chat, Message)> {
        let mut tx = pool.begin().await?;

        let chat = match chat {
            Some(chat) => chat,
            None => Self::create_chat(&mut *tx, &chat_title(question)).await?,
        };
        Self::add_message(&mut *tx, chat.id, ROLE_USER, question, None).await?;
        let reply = Self::add_message(&mut *tx, chat.id, ROLE_ASSISTANT, answer, Some(tool)).await?;

        tx.commit().await?;
        Ok((chat, reply))
    }

    /// Messages of one chat in the order they were written
    pub async fn get_messages(pool: &SqlitePool, chat_id: Uuid) -> AppResult<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, chat_id, role, content, tool, created_at
            FROM messages
            WHERE chat_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(chat_id)
        .fetch_all(pool)
        .await?;

        Ok(messages)
    }

    /// Delete every message and chat; returns (chats, messages) deleted
    pub async fn clear_all(pool: &SqlitePool) -> AppResult<(u64, u64)> {
        let mut tx = pool.begin().await?;
        let messages = sqlx::query("DELETE FROM messages").execute(&mut *tx).await?.rows_affected();
        let chats = sqlx::query("DELETE FROM chats").execute(&mut *tx).await?.rows_affected();
        tx.commit().await?;

        Ok((chats, messages))
    }
}

/// Chat title derived from its first question
pub fn chat_title(question: &str) -> String {
    question.trim().chars().take(TITLE_MAX_CHARS).collect()
}
