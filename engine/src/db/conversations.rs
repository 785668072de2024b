/// Conversation transcript persistence
///
/// A conversation is one row keyed by `(user_id, session_id)` plus an
/// append-only list of message rows. Messages are stored as the JSON the
/// client receives, so a transcript reads back exactly as it was streamed.
use anyhow::{Context, Result};
use sdk::types::{AgentConfig, Conversation, ConversationMessage, ConversationPage};
use sqlx::{Row, SqlitePool};
use tracing::{debug, warn};

use super::now_millis;

/// Largest page the listing endpoint will return
pub const MAX_PAGE_SIZE: i64 = 100;

/// Conversation repository for database operations
#[derive(Clone)]
pub struct ConversationRepository {
    pool: SqlitePool,
}

/// Fields used only when the first message creates the conversation
#[derive(Debug, Clone, Default)]
pub struct NewConversation {
    pub id: Option<String>,
    pub agents: Option<Vec<AgentConfig>>,
    pub run_mode_locally: Option<bool>,
    pub timestamp: String,
}

impl ConversationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a message, creating the conversation on first write.
    ///
    /// `meta` is ignored when the conversation already exists. Returns the
    /// conversation id.
    pub async fn save_message(
        &self,
        user_id: &str,
        session_id: &str,
        message: &ConversationMessage,
        meta: NewConversation,
    ) -> Result<String> {
        let new_id = meta
            .id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let agents = meta
            .agents
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .context("Failed to serialize agents")?;

        sqlx::query(
            "INSERT INTO conversations (id, user_id, session_id, agents, run_mode_locally, timestamp, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(user_id, session_id) DO NOTHING",
        )
        .bind(&new_id)
        .bind(user_id)
        .bind(session_id)
        .bind(agents)
        .bind(meta.run_mode_locally)
        .bind(&meta.timestamp)
        .bind(now_millis())
        .execute(&self.pool)
        .await
        .context("Failed to create conversation")?;

        let conversation_id: String =
            sqlx::query_scalar("SELECT id FROM conversations WHERE user_id = ? AND session_id = ?")
                .bind(user_id)
                .bind(session_id)
                .fetch_one(&self.pool)
                .await
                .context("Failed to look up conversation")?;

        let body = serde_json::to_string(message).context("Failed to serialize message")?;
        sqlx::query("INSERT INTO conversation_messages (conversation_id, body) VALUES (?, ?)")
            .bind(&conversation_id)
            .bind(body)
            .execute(&self.pool)
            .await
            .context("Failed to append message")?;

        debug!(session_id, "Appended message to conversation {}", conversation_id);
        Ok(conversation_id)
    }

    /// Load one conversation with its full transcript
    pub async fn get_conversation(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<Option<Conversation>> {
        let row = sqlx::query(
            "SELECT id, user_id, session_id, agents, run_mode_locally, timestamp
             FROM conversations WHERE user_id = ? AND session_id = ?",
        )
        .bind(user_id)
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch conversation")?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    /// One page of conversations, newest first.
    ///
    /// `user_id = None` lists every user. `page` starts at 1; `page_size` is
    /// clamped to `1..=MAX_PAGE_SIZE`.
    pub async fn fetch_user_conversations(
        &self,
        user_id: Option<&str>,
        page: i64,
        page_size: i64,
    ) -> Result<ConversationPage> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        let offset = (page - 1).saturating_mul(page_size);

        let total_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM conversations WHERE (? IS NULL OR user_id = ?)")
                .bind(user_id)
                .bind(user_id)
                .fetch_one(&self.pool)
                .await
                .context("Failed to count conversations")?;

        let rows = sqlx::query(
            "SELECT id, user_id, session_id, agents, run_mode_locally, timestamp
             FROM conversations
             WHERE (? IS NULL OR user_id = ?)
             ORDER BY created_at DESC, rowid DESC
             LIMIT ? OFFSET ?",
        )
        .bind(user_id)
        .bind(user_id)
        .bind(page_size)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list conversations")?;

        let mut conversations = Vec::with_capacity(rows.len());
        for row in rows {
            conversations.push(self.hydrate(row).await?);
        }

        let total_pages = ((total_count + page_size - 1) / page_size).max(1);

        Ok(ConversationPage {
            conversations,
            total_count,
            page,
            total_pages,
        })
    }

    /// Conversations matching the given user and/or session, newest first
    pub async fn fetch_user_conversation(
        &self,
        user_id: Option<&str>,
        session_id: Option<&str>,
    ) -> Result<Vec<Conversation>> {
        let rows = sqlx::query(
            "SELECT id, user_id, session_id, agents, run_mode_locally, timestamp
             FROM conversations
             WHERE (? IS NULL OR user_id = ?) AND (? IS NULL OR session_id = ?)
             ORDER BY created_at DESC, rowid DESC",
        )
        .bind(user_id)
        .bind(user_id)
        .bind(session_id)
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch user conversations")?;

        let mut conversations = Vec::with_capacity(rows.len());
        for row in rows {
            conversations.push(self.hydrate(row).await?);
        }
        Ok(conversations)
    }

    /// Delete a conversation and its messages. Returns false when nothing matched.
    pub async fn delete_user_conversation(&self, user_id: &str, session_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM conversations WHERE user_id = ? AND session_id = ?")
            .bind(user_id)
            .bind(session_id)
            .execute(&self.pool)
            .await
            .context("Failed to delete conversation")?;

        Ok(result.rows_affected() > 0)
    }

    async fn hydrate(&self, row: sqlx::sqlite::SqliteRow) -> Result<Conversation> {
        let id: String = row.get("id");
        let agents: Option<String> = row.get("agents");
        let agents = match agents {
            Some(raw) => match serde_json::from_str::<Vec<AgentConfig>>(&raw) {
                Ok(list) => Some(list),
                Err(e) => {
                    warn!("Conversation {} has unreadable agents: {}", id, e);
                    None
                }
            },
            None => None,
        };

        let messages = self.load_messages(&id).await?;

        Ok(Conversation {
            id,
            user_id: row.get("user_id"),
            session_id: row.get("session_id"),
            messages,
            agents,
            run_mode_locally: row.get("run_mode_locally"),
            timestamp: row.get("timestamp"),
        })
    }

    async fn load_messages(&self, conversation_id: &str) -> Result<Vec<ConversationMessage>> {
        let bodies: Vec<String> = sqlx::query_scalar(
            "SELECT body FROM conversation_messages WHERE conversation_id = ? ORDER BY id ASC",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load conversation messages")?;

        Ok(bodies
            .iter()
            .filter_map(|body| match serde_json::from_str(body) {
                Ok(message) => Some(message),
                Err(e) => {
                    warn!("Skipping unreadable message in {}: {}", conversation_id, e);
                    None
                }
            })
            .collect())
    }
}
