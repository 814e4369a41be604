use std::sync::Arc;

use portero_core::{CallerIdentity, MessageDirection};
use portero_db::repositories::{MessageRepository, RepositoryError};

use crate::directive::system_directive;
use crate::llm::{ChatRole, ChatTurn};

pub const DEFAULT_HISTORY_LIMIT: u32 = 10;

/// Assembles the directive and the recent transcript for one session.
pub struct ContextBuilder {
    messages: Arc<dyn MessageRepository>,
    history_limit: u32,
}

#[derive(Debug)]
pub struct PromptContext {
    pub directive: String,
    pub transcript: Vec<ChatTurn>,
}

impl ContextBuilder {
    pub fn new(messages: Arc<dyn MessageRepository>) -> Self {
        Self { messages, history_limit: DEFAULT_HISTORY_LIMIT }
    }

    pub fn with_history_limit(mut self, limit: u32) -> Self {
        self.history_limit = limit.max(1);
        self
    }

    pub async fn build(
        &self,
        jid: &str,
        identity: &CallerIdentity,
    ) -> Result<PromptContext, RepositoryError> {
        let mut recent = self.messages.find_recent(jid, self.history_limit).await?;
        // Storage hands back most recent first; the model wants
        // chronological order.
        recent.reverse();

        let transcript = recent
            .into_iter()
            .filter(|record| record.content_type.is_text() && !record.content.trim().is_empty())
            .map(|record| ChatTurn {
                role: match record.direction {
                    MessageDirection::FromCaller => ChatRole::Caller,
                    MessageDirection::FromBot => ChatRole::Assistant,
                },
                text: record.content,
            })
            .collect();

        Ok(PromptContext { directive: system_directive(identity), transcript })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use portero_core::{CallerIdentity, ContentType, MessageRecord};
    use portero_db::repositories::{InMemoryMessageRepository, MessageRepository};

    use super::ContextBuilder;
    use crate::llm::ChatRole;

    #[tokio::test]
    async fn transcript_is_chronological_and_capped() {
        let messages = Arc::new(InMemoryMessageRepository::new());
        let jid = "5492804000020@s.whatsapp.net";
        let base = Utc::now();

        for i in 0..12 {
            let mut record = MessageRecord::inbound_text(jid, format!("turn {i}"));
            record.timestamp = base + Duration::seconds(i);
            messages.append(record).await.expect("append");
        }

        let builder = ContextBuilder::new(messages);
        let context = builder.build(jid, &CallerIdentity::Guest).await.expect("build");

        assert_eq!(context.transcript.len(), 10);
        assert_eq!(context.transcript[0].text, "turn 2");
        assert_eq!(context.transcript[9].text, "turn 11");
    }

    #[tokio::test]
    async fn media_and_blank_turns_are_dropped() {
        let messages = Arc::new(InMemoryMessageRepository::new());
        let jid = "5492804000021@s.whatsapp.net";
        let base = Utc::now();

        let mut text = MessageRecord::inbound_text(jid, "hola");
        text.timestamp = base;
        messages.append(text).await.expect("append");

        let mut media = MessageRecord::inbound_media(jid, ContentType::Image, "media/abc.jpg");
        media.timestamp = base + Duration::seconds(1);
        messages.append(media).await.expect("append");

        let mut blank = MessageRecord::outbound_text(jid, "   ");
        blank.timestamp = base + Duration::seconds(2);
        messages.append(blank).await.expect("append");

        let builder = ContextBuilder::new(messages);
        let context = builder.build(jid, &CallerIdentity::Guest).await.expect("build");

        assert_eq!(context.transcript.len(), 1);
        assert_eq!(context.transcript[0].role, ChatRole::Caller);
        assert_eq!(context.transcript[0].text, "hola");
    }

    #[tokio::test]
    async fn directive_reflects_caller_identity() {
        let messages = Arc::new(InMemoryMessageRepository::new());
        let builder = ContextBuilder::new(messages);

        let linked = CallerIdentity::Linked {
            client_id: "client_001".to_string(),
            display_name: Some("Juan Pérez".to_string()),
        };
        let context =
            builder.build("x@s.whatsapp.net", &linked).await.expect("build");
        assert!(context.directive.contains("Juan Pérez"));
    }
}
