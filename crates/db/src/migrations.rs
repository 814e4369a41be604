use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::{run_pending, MIGRATOR};
    use portero_core::config::DatabaseConfig;

    use crate::connect_with_settings;

    async fn count_schema_object(pool: &sqlx::SqlitePool, kind: &str, name: &str) -> i64 {
        sqlx::query(
            "SELECT COUNT(*) AS count FROM sqlite_master WHERE type = ? AND name = ?",
        )
        .bind(kind)
        .bind(name)
        .fetch_one(pool)
        .await
        .expect("query sqlite_master")
        .get::<i64, _>("count")
    }

    #[tokio::test]
    async fn migrations_create_baseline_tables() {
        let pool = connect_with_settings(&DatabaseConfig::single_connection("sqlite::memory:"))
            .await
            .expect("connect");
        run_pending(&pool).await.expect("run migrations");

        assert_eq!(count_schema_object(&pool, "table", "chats").await, 1);
        assert_eq!(count_schema_object(&pool, "table", "messages").await, 1);
        assert_eq!(count_schema_object(&pool, "index", "idx_messages_jid_timestamp").await, 1);
        assert_eq!(count_schema_object(&pool, "index", "idx_chats_core_client_id").await, 1);
    }

    #[tokio::test]
    async fn migrations_are_reversible() {
        let pool = connect_with_settings(&DatabaseConfig::single_connection("sqlite::memory:"))
            .await
            .expect("connect");
        run_pending(&pool).await.expect("run migrations");

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");

        assert_eq!(count_schema_object(&pool, "table", "chats").await, 0);
        assert_eq!(count_schema_object(&pool, "table", "messages").await, 0);
    }
}
