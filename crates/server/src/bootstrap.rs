use std::sync::Arc;

use secrecy::SecretString;
use thiserror::Error;
use tracing::info;

use portero_agent::{standard_registry, ContextBuilder, GeminiModel, Orchestrator};
use portero_core::config::{AppConfig, ConfigError, GatewayMode, LoadOptions};
use portero_db::repositories::{SqlChatRepository, SqlMessageRepository};
use portero_db::{connect_with_settings, migrations, DbPool};
use portero_gateway::{CoreGateway, HttpCoreGateway, SimulatedCoreGateway};
use portero_whatsapp::{InboundRouter, NoopSender, OutboundSender};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub router: Arc<InboundRouter>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("gateway setup failed: {0}")]
    Gateway(String),
    #[error("model setup failed: {0}")]
    Model(String),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(&config.database)
        .await
        .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let gateway = build_gateway(&config)?;
    let model = build_model(&config)?;

    let chats = Arc::new(SqlChatRepository::new(db_pool.clone()));
    let messages = Arc::new(SqlMessageRepository::new(db_pool.clone()));

    let orchestrator = Arc::new(Orchestrator::new(
        model,
        Arc::new(standard_registry(gateway.clone())),
        ContextBuilder::new(messages.clone()),
    ));

    // The outbound transport attaches here once a WhatsApp session
    // library is wired in; replies are dropped until then.
    let sender: Arc<dyn OutboundSender> = Arc::new(NoopSender);

    let router =
        Arc::new(InboundRouter::new(chats, messages, gateway, orchestrator, sender));

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        gateway_mode = ?config.gateway.mode,
        "application components wired"
    );

    Ok(Application { config, db_pool, router })
}

fn build_gateway(config: &AppConfig) -> Result<Arc<dyn CoreGateway>, BootstrapError> {
    match config.gateway.mode {
        GatewayMode::Simulated => Ok(Arc::new(SimulatedCoreGateway::new())),
        GatewayMode::Live => {
            // Validation already guarantees both are present in live mode.
            let base_url = config
                .gateway
                .base_url
                .clone()
                .ok_or_else(|| BootstrapError::Gateway("missing gateway base_url".to_string()))?;
            let api_key = config
                .gateway
                .api_key
                .clone()
                .ok_or_else(|| BootstrapError::Gateway("missing gateway api_key".to_string()))?;

            let gateway =
                HttpCoreGateway::new(base_url, api_key, config.gateway.timeout_secs)
                    .map_err(|e| BootstrapError::Gateway(e.to_string()))?;
            Ok(Arc::new(gateway))
        }
    }
}

fn build_model(config: &AppConfig) -> Result<Arc<GeminiModel>, BootstrapError> {
    let api_key: SecretString = config
        .llm
        .api_key
        .clone()
        .ok_or_else(|| BootstrapError::Model("llm.api_key is not configured".to_string()))?;

    let model = GeminiModel::new(
        config.llm.base_url.clone(),
        config.llm.model.clone(),
        api_key,
        config.llm.timeout_secs,
    )
    .map_err(|e| BootstrapError::Model(e.to_string()))?;

    Ok(Arc::new(model))
}
