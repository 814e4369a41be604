use async_trait::async_trait;
use thiserror::Error;

use portero_core::{Chat, ChatMode, MessageRecord};

pub mod chat;
pub mod memory;
pub mod message;

pub use chat::SqlChatRepository;
pub use memory::{InMemoryChatRepository, InMemoryMessageRepository};
pub use message::SqlMessageRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait ChatRepository: Send + Sync {
    async fn find_by_jid(&self, jid: &str) -> Result<Option<Chat>, RepositoryError>;
    async fn save(&self, chat: Chat) -> Result<(), RepositoryError>;
    async fn link_client(
        &self,
        jid: &str,
        core_client_id: &str,
        display_name: Option<&str>,
    ) -> Result<(), RepositoryError>;
    async fn set_mode(
        &self,
        jid: &str,
        mode: ChatMode,
        bot_active: bool,
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn append(&self, record: MessageRecord) -> Result<(), RepositoryError>;

    /// Most recent first. Callers reverse into chronological order when
    /// assembling a transcript.
    async fn find_recent(
        &self,
        jid: &str,
        limit: u32,
    ) -> Result<Vec<MessageRecord>, RepositoryError>;
}
