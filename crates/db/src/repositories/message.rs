use chrono::{DateTime, Utc};
use sqlx::Row;

use portero_core::{ContentType, MessageDirection, MessageRecord};

use super::{MessageRepository, RepositoryError};
use crate::DbPool;

pub struct SqlMessageRepository {
    pool: DbPool,
}

impl SqlMessageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<MessageRecord, RepositoryError> {
    let jid: String = row.try_get("jid").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let direction_str: String =
        row.try_get("direction").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let content_type_str: String =
        row.try_get("content_type").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let content: String =
        row.try_get("content").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let timestamp_str: String =
        row.try_get("timestamp").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let direction = MessageDirection::parse(&direction_str).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown message direction `{direction_str}`"))
    })?;
    let content_type = ContentType::parse(&content_type_str).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown content type `{content_type_str}`"))
    })?;
    let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    Ok(MessageRecord { jid, direction, content_type, content, timestamp })
}

#[async_trait::async_trait]
impl MessageRepository for SqlMessageRepository {
    async fn append(&self, record: MessageRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO messages (jid, direction, content_type, content, timestamp)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&record.jid)
        .bind(record.direction.as_str())
        .bind(record.content_type.as_str())
        .bind(&record.content)
        .bind(record.timestamp.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_recent(
        &self,
        jid: &str,
        limit: u32,
    ) -> Result<Vec<MessageRecord>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT jid, direction, content_type, content, timestamp
             FROM messages WHERE jid = ?
             ORDER BY timestamp DESC, id DESC
             LIMIT ?",
        )
        .bind(jid)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_message).collect::<Result<Vec<_>, _>>()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use portero_core::config::DatabaseConfig;
    use portero_core::{MessageDirection, MessageRecord};

    use super::SqlMessageRepository;
    use crate::migrations::run_pending;
    use crate::repositories::MessageRepository;
    use crate::connect_with_settings;

    async fn repository() -> SqlMessageRepository {
        let pool = connect_with_settings(&DatabaseConfig::single_connection("sqlite::memory:"))
            .await
            .expect("connect");
        run_pending(&pool).await.expect("run migrations");
        SqlMessageRepository::new(pool)
    }

    #[tokio::test]
    async fn find_recent_returns_most_recent_first_and_honors_limit() {
        let repo = repository().await;
        let jid = "5492804000010@s.whatsapp.net";
        let base = Utc::now();

        for i in 0..4 {
            let mut record =
                MessageRecord::inbound_text(jid.to_string(), format!("message {i}"));
            record.timestamp = base + Duration::seconds(i);
            repo.append(record).await.expect("append message");
        }

        let recent = repo.find_recent(jid, 3).await.expect("find recent");
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].content, "message 3");
        assert_eq!(recent[2].content, "message 1");
    }

    #[tokio::test]
    async fn find_recent_is_scoped_to_the_conversation() {
        let repo = repository().await;

        repo.append(MessageRecord::inbound_text("a@s.whatsapp.net", "hello"))
            .await
            .expect("append");
        repo.append(MessageRecord::outbound_text("b@s.whatsapp.net", "hi"))
            .await
            .expect("append");

        let recent = repo.find_recent("a@s.whatsapp.net", 10).await.expect("find recent");
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].direction, MessageDirection::FromCaller);
    }
}
