use chrono::{DateTime, Utc};
use sqlx::Row;

use portero_core::{Chat, ChatMode};

use super::{ChatRepository, RepositoryError};
use crate::DbPool;

pub struct SqlChatRepository {
    pool: DbPool,
}

impl SqlChatRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_chat(row: &sqlx::sqlite::SqliteRow) -> Result<Chat, RepositoryError> {
    let jid: String = row.try_get("jid").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let display_name: Option<String> =
        row.try_get("display_name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let mode_str: String =
        row.try_get("mode").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let bot_active: i64 =
        row.try_get("bot_active").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let core_client_id: Option<String> =
        row.try_get("core_client_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at_str: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let mode = ChatMode::parse(&mode_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown chat mode `{mode_str}`")))?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());
    let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    Ok(Chat {
        jid,
        display_name,
        mode,
        bot_active: bot_active != 0,
        core_client_id,
        created_at,
        updated_at,
    })
}

#[async_trait::async_trait]
impl ChatRepository for SqlChatRepository {
    async fn find_by_jid(&self, jid: &str) -> Result<Option<Chat>, RepositoryError> {
        let row = sqlx::query(
            "SELECT jid, display_name, mode, bot_active, core_client_id, created_at, updated_at
             FROM chats WHERE jid = ?",
        )
        .bind(jid)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_chat(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, chat: Chat) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO chats (jid, display_name, mode, bot_active, core_client_id,
                                created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(jid) DO UPDATE SET
                 display_name = excluded.display_name,
                 mode = excluded.mode,
                 bot_active = excluded.bot_active,
                 core_client_id = excluded.core_client_id,
                 updated_at = excluded.updated_at",
        )
        .bind(&chat.jid)
        .bind(&chat.display_name)
        .bind(chat.mode.as_str())
        .bind(chat.bot_active as i64)
        .bind(&chat.core_client_id)
        .bind(chat.created_at.to_rfc3339())
        .bind(chat.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn link_client(
        &self,
        jid: &str,
        core_client_id: &str,
        display_name: Option<&str>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE chats
             SET core_client_id = ?,
                 display_name = COALESCE(?, display_name),
                 updated_at = ?
             WHERE jid = ?",
        )
        .bind(core_client_id)
        .bind(display_name)
        .bind(Utc::now().to_rfc3339())
        .bind(jid)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_mode(
        &self,
        jid: &str,
        mode: ChatMode,
        bot_active: bool,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE chats SET mode = ?, bot_active = ?, updated_at = ? WHERE jid = ?",
        )
        .bind(mode.as_str())
        .bind(bot_active as i64)
        .bind(Utc::now().to_rfc3339())
        .bind(jid)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
