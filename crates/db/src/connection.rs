use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;

use portero_core::config::DatabaseConfig;

pub type DbPool = sqlx::SqlitePool;

/// Connects with the workspace defaults for everything but the url.
pub async fn connect(database_url: &str) -> Result<DbPool, sqlx::Error> {
    let settings = DatabaseConfig { url: database_url.to_string(), ..DatabaseConfig::default() };
    connect_with_settings(&settings).await
}

/// Opens the sqlite pool described by the `[database]` config section.
/// Every connection gets foreign keys, WAL journaling, and a busy
/// timeout so concurrent chat handlers do not trip over the writer.
pub async fn connect_with_settings(settings: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(settings.max_connections.max(1))
        .acquire_timeout(Duration::from_secs(settings.timeout_secs.max(1)))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect(&settings.url)
        .await
}

#[cfg(test)]
mod tests {
    use portero_core::config::DatabaseConfig;

    use super::connect_with_settings;

    #[tokio::test]
    async fn pool_applies_config_and_session_pragmas() {
        let settings = DatabaseConfig::single_connection("sqlite::memory:");
        let pool = connect_with_settings(&settings).await.expect("connect");

        assert_eq!(pool.options().get_max_connections(), 1);

        let foreign_keys: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .expect("pragma query");
        assert_eq!(foreign_keys, 1);

        pool.close().await;
    }
}
