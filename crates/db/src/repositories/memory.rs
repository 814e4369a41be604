use std::collections::HashMap;

use tokio::sync::RwLock;

use portero_core::{Chat, ChatMode, MessageRecord};

use super::{ChatRepository, MessageRepository, RepositoryError};

/// Test double backed by process memory. Behavior mirrors the SQL
/// repositories closely enough for orchestrator and router tests.
#[derive(Default)]
pub struct InMemoryChatRepository {
    chats: RwLock<HashMap<String, Chat>>,
}

impl InMemoryChatRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ChatRepository for InMemoryChatRepository {
    async fn find_by_jid(&self, jid: &str) -> Result<Option<Chat>, RepositoryError> {
        Ok(self.chats.read().await.get(jid).cloned())
    }

    async fn save(&self, chat: Chat) -> Result<(), RepositoryError> {
        self.chats.write().await.insert(chat.jid.clone(), chat);
        Ok(())
    }

    async fn link_client(
        &self,
        jid: &str,
        core_client_id: &str,
        display_name: Option<&str>,
    ) -> Result<(), RepositoryError> {
        if let Some(chat) = self.chats.write().await.get_mut(jid) {
            chat.core_client_id = Some(core_client_id.to_string());
            if let Some(name) = display_name {
                chat.display_name = Some(name.to_string());
            }
            chat.updated_at = chrono::Utc::now();
        }
        Ok(())
    }

    async fn set_mode(
        &self,
        jid: &str,
        mode: ChatMode,
        bot_active: bool,
    ) -> Result<(), RepositoryError> {
        if let Some(chat) = self.chats.write().await.get_mut(jid) {
            chat.mode = mode;
            chat.bot_active = bot_active;
            chat.updated_at = chrono::Utc::now();
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryMessageRepository {
    messages: RwLock<Vec<MessageRecord>>,
}

impl InMemoryMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn append(&self, record: MessageRecord) -> Result<(), RepositoryError> {
        self.messages.write().await.push(record);
        Ok(())
    }

    async fn find_recent(
        &self,
        jid: &str,
        limit: u32,
    ) -> Result<Vec<MessageRecord>, RepositoryError> {
        let messages = self.messages.read().await;
        let mut recent: Vec<(usize, &MessageRecord)> = messages
            .iter()
            .enumerate()
            .filter(|(_, record)| record.jid == jid)
            .collect();
        // Same order as the SQL repository: newest first, and on equal
        // timestamps the later-appended record wins.
        recent.sort_by(|(a_seq, a), (b_seq, b)| {
            b.timestamp.cmp(&a.timestamp).then(b_seq.cmp(a_seq))
        });
        Ok(recent.into_iter().take(limit as usize).map(|(_, record)| record.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use portero_core::{Chat, ChatMode, MessageRecord};

    use super::{InMemoryChatRepository, InMemoryMessageRepository};
    use crate::repositories::{ChatRepository, MessageRepository};

    #[tokio::test]
    async fn chat_link_and_mode_updates_apply() {
        let repo = InMemoryChatRepository::new();
        let chat = Chat::new("memory@s.whatsapp.net".to_string());
        repo.save(chat.clone()).await.expect("save");

        repo.link_client(&chat.jid, "client_002", Some("María González"))
            .await
            .expect("link");
        repo.set_mode(&chat.jid, ChatMode::Human, false).await.expect("set mode");

        let loaded = repo.find_by_jid(&chat.jid).await.expect("find").expect("exists");
        assert_eq!(loaded.core_client_id.as_deref(), Some("client_002"));
        assert_eq!(loaded.display_name.as_deref(), Some("María González"));
        assert!(!loaded.bot_should_reply());
    }

    #[tokio::test]
    async fn messages_are_filtered_and_limited() {
        let repo = InMemoryMessageRepository::new();
        for i in 0..3 {
            repo.append(MessageRecord::inbound_text(
                "memory@s.whatsapp.net".to_string(),
                format!("turn {i}"),
            ))
            .await
            .expect("append");
        }
        repo.append(MessageRecord::inbound_text("other@s.whatsapp.net", "noise"))
            .await
            .expect("append");

        let recent = repo.find_recent("memory@s.whatsapp.net", 2).await.expect("recent");
        assert_eq!(recent.len(), 2);
        assert!(recent.iter().all(|record| record.jid == "memory@s.whatsapp.net"));
    }

    #[tokio::test]
    async fn equal_timestamps_order_by_insertion_like_the_sql_repository() {
        let repo = InMemoryMessageRepository::new();
        let jid = "memory@s.whatsapp.net";
        let now = chrono::Utc::now();

        let mut first = MessageRecord::inbound_text(jid, "first");
        first.timestamp = now;
        let mut second = MessageRecord::inbound_text(jid, "second");
        second.timestamp = now;
        repo.append(first).await.expect("append");
        repo.append(second).await.expect("append");

        let recent = repo.find_recent(jid, 10).await.expect("recent");
        assert_eq!(recent[0].content, "second");
        assert_eq!(recent[1].content, "first");
    }
}
