use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;

use portero_agent::{Orchestrator, RespondRequest};
use portero_core::{Chat, MessageRecord};
use portero_db::repositories::{ChatRepository, MessageRepository, RepositoryError};
use portero_gateway::CoreGateway;

use crate::events::{InboundMessage, OutboundSender};

/// Fixed acknowledgment for media without any text to act on.
pub const MEDIA_ACK_REPLY: &str =
    "He recibido tu archivo. 📎 Si necesitas algo sobre él, contámelo en un mensaje de texto.";

#[derive(Debug, Error)]
pub enum RouterError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("delivery failed: {0}")]
    Delivery(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The bot replied.
    Replied,
    /// A human owns this conversation; the message was stored only.
    HumanTakeover,
    /// Nothing actionable in the message.
    Ignored,
}

/// Serializes handling per conversation and drives one message through
/// persist, identity resolution, the reply gate, and the agent.
pub struct InboundRouter {
    chats: Arc<dyn ChatRepository>,
    messages: Arc<dyn MessageRepository>,
    gateway: Arc<dyn CoreGateway>,
    orchestrator: Arc<Orchestrator>,
    sender: Arc<dyn OutboundSender>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl InboundRouter {
    pub fn new(
        chats: Arc<dyn ChatRepository>,
        messages: Arc<dyn MessageRepository>,
        gateway: Arc<dyn CoreGateway>,
        orchestrator: Arc<Orchestrator>,
        sender: Arc<dyn OutboundSender>,
    ) -> Self {
        Self { chats, messages, gateway, orchestrator, sender, locks: Mutex::new(HashMap::new()) }
    }

    async fn conversation_lock(&self, jid: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(jid.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    pub async fn handle(&self, message: InboundMessage) -> Result<RouteOutcome, RouterError> {
        if message.is_empty() {
            return Ok(RouteOutcome::Ignored);
        }

        // Messages for the same conversation are handled one at a
        // time; different conversations proceed in parallel.
        let lock = self.conversation_lock(&message.jid).await;
        let guard = lock.lock().await;
        let outcome = self.handle_serialized(&message).await;
        drop(guard);
        drop(lock);

        self.evict_idle_lock(&message.jid).await;
        outcome
    }

    async fn evict_idle_lock(&self, jid: &str) {
        let mut locks = self.locks.lock().await;
        // New clones are only handed out under the map lock, so a
        // strong count of 1 means no other handler is in flight.
        if locks.get(jid).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(jid);
        }
    }

    async fn handle_serialized(
        &self,
        message: &InboundMessage,
    ) -> Result<RouteOutcome, RouterError> {
        self.persist_inbound(message).await?;
        let mut chat = self.find_or_create_chat(message).await?;

        // Best effort: a caller the backend already knows is linked on
        // first contact, without the verification flow.
        if chat.core_client_id.is_none() {
            match self.gateway.client_by_jid(&chat.jid).await {
                Ok(Some(client)) => {
                    self.chats.link_client(&chat.jid, &client.id, Some(&client.name)).await?;
                    chat.core_client_id = Some(client.id);
                    chat.display_name = Some(client.name);
                    tracing::info!(
                        event_name = "router.auto_linked",
                        jid = %chat.jid,
                        "caller recognized by backend"
                    );
                }
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(
                        event_name = "router.auto_link_failed",
                        jid = %chat.jid,
                        error = %error,
                        "identity lookup failed, continuing as guest"
                    );
                }
            }
        }

        if !chat.bot_should_reply() {
            tracing::info!(
                event_name = "router.human_takeover",
                jid = %chat.jid,
                "bot is gated off for this conversation"
            );
            return Ok(RouteOutcome::HumanTakeover);
        }

        let Some(text) = message.text.as_deref().filter(|t| !t.trim().is_empty()) else {
            // Media with no caption: acknowledge receipt, nothing more.
            self.deliver(&chat.jid, MEDIA_ACK_REPLY).await?;
            return Ok(RouteOutcome::Replied);
        };

        let request = RespondRequest {
            jid: chat.jid.clone(),
            text: text.to_string(),
            identity: chat.identity(),
        };
        let reply = self.orchestrator.reply_or_apology(&request).await;

        if let Some(link) = &reply.verified_link {
            self.chats
                .link_client(&chat.jid, &link.client_id, link.client_name.as_deref())
                .await?;
            tracing::info!(
                event_name = "router.identity_verified",
                jid = %chat.jid,
                "caller linked after code verification"
            );
        }

        self.deliver(&chat.jid, &reply.text).await?;
        Ok(RouteOutcome::Replied)
    }

    async fn persist_inbound(&self, message: &InboundMessage) -> Result<(), RouterError> {
        if let Some(text) = message.text.as_deref().filter(|t| !t.trim().is_empty()) {
            self.messages.append(MessageRecord::inbound_text(&message.jid, text)).await?;
        }
        if let Some(media) = &message.media_ref {
            self.messages
                .append(MessageRecord::inbound_media(
                    &message.jid,
                    media.content_type,
                    &media.location,
                ))
                .await?;
        }
        Ok(())
    }

    async fn find_or_create_chat(&self, message: &InboundMessage) -> Result<Chat, RouterError> {
        if let Some(chat) = self.chats.find_by_jid(&message.jid).await? {
            return Ok(chat);
        }

        let mut chat = Chat::new(&message.jid);
        chat.display_name = message.sender_display_name.clone();
        self.chats.save(chat.clone()).await?;
        tracing::info!(event_name = "router.chat_created", jid = %chat.jid, "new conversation");
        Ok(chat)
    }

    async fn deliver(&self, jid: &str, text: &str) -> Result<(), RouterError> {
        self.messages.append(MessageRecord::outbound_text(jid, text)).await?;
        self.sender
            .send_text(jid, text)
            .await
            .map_err(|e| RouterError::Delivery(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use portero_agent::{
        standard_registry, ContextBuilder, ModelReply, Orchestrator, ScriptedModel,
    };
    use portero_core::{Chat, ChatMode, ContentType, MessageDirection};
    use portero_db::repositories::{
        ChatRepository, InMemoryChatRepository, InMemoryMessageRepository, MessageRepository,
    };
    use portero_gateway::{CoreGateway, SimulatedCoreGateway};

    use super::{InboundRouter, RouteOutcome, MEDIA_ACK_REPLY};
    use crate::events::{InboundMessage, RecordingSender};

    struct Fixture {
        chats: Arc<InMemoryChatRepository>,
        messages: Arc<InMemoryMessageRepository>,
        gateway: Arc<SimulatedCoreGateway>,
        sender: Arc<RecordingSender>,
        router: InboundRouter,
    }

    fn fixture(replies: Vec<ModelReply>) -> Fixture {
        let chats = Arc::new(InMemoryChatRepository::new());
        let messages = Arc::new(InMemoryMessageRepository::new());
        let gateway = Arc::new(SimulatedCoreGateway::new());
        let sender = Arc::new(RecordingSender::new());

        let orchestrator = Arc::new(Orchestrator::new(
            Arc::new(ScriptedModel::new(replies)),
            Arc::new(standard_registry(gateway.clone())),
            ContextBuilder::new(messages.clone()),
        ));

        let router = InboundRouter::new(
            chats.clone(),
            messages.clone(),
            gateway.clone(),
            orchestrator,
            sender.clone(),
        );

        Fixture { chats, messages, gateway, sender, router }
    }

    #[tokio::test]
    async fn known_caller_is_auto_linked_on_first_message() {
        let fx = fixture(vec![ModelReply::text_reply("¡Hola Juan!")]);
        let jid = "5492804503151@s.whatsapp.net";

        let outcome = fx.router.handle(InboundMessage::text(jid, "hola")).await.expect("handle");
        assert_eq!(outcome, RouteOutcome::Replied);

        let chat = fx.chats.find_by_jid(jid).await.expect("find").expect("exists");
        assert_eq!(chat.core_client_id.as_deref(), Some("client_001"));
        assert_eq!(chat.display_name.as_deref(), Some("Juan Pérez"));

        let sent = fx.sender.sent().await;
        assert_eq!(sent, vec![(jid.to_string(), "¡Hola Juan!".to_string())]);
    }

    #[tokio::test]
    async fn human_mode_stores_the_message_and_stays_silent() {
        let fx = fixture(vec![ModelReply::text_reply("should never be sent")]);
        let jid = "5491100000001@s.whatsapp.net";

        let mut chat = Chat::new(jid);
        chat.mode = ChatMode::Human;
        chat.bot_active = false;
        fx.chats.save(chat).await.expect("save");

        let outcome =
            fx.router.handle(InboundMessage::text(jid, "necesito ayuda")).await.expect("handle");
        assert_eq!(outcome, RouteOutcome::HumanTakeover);

        assert!(fx.sender.sent().await.is_empty());
        let stored = fx.messages.find_recent(jid, 10).await.expect("recent");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].direction, MessageDirection::FromCaller);
    }

    #[tokio::test]
    async fn verified_link_from_the_agent_is_persisted() {
        let jid = "5491100000002@s.whatsapp.net";
        let fx = fixture(vec![
            ModelReply::tool_call("verify_otp", json!({"otp": "123456"})),
            ModelReply::text_reply("¡Identidad verificada, Juan!"),
        ]);
        // Open verification session as if the DNI step already ran.
        fx.gateway.validate_identity("12345678", jid).await.expect("validate");

        let outcome =
            fx.router.handle(InboundMessage::text(jid, "123456")).await.expect("handle");
        assert_eq!(outcome, RouteOutcome::Replied);

        let chat = fx.chats.find_by_jid(jid).await.expect("find").expect("exists");
        assert_eq!(chat.core_client_id.as_deref(), Some("client_001"));
        assert!(chat.identity().is_linked());
    }

    #[tokio::test]
    async fn media_without_text_gets_the_fixed_ack() {
        let fx = fixture(Vec::new());
        let jid = "5491100000003@s.whatsapp.net";

        let outcome = fx
            .router
            .handle(InboundMessage::media(jid, ContentType::Image, "media/recibo.jpg"))
            .await
            .expect("handle");
        assert_eq!(outcome, RouteOutcome::Replied);

        let sent = fx.sender.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, MEDIA_ACK_REPLY);

        // Both the media record and the ack are in history.
        let stored = fx.messages.find_recent(jid, 10).await.expect("recent");
        assert_eq!(stored.len(), 2);
    }

    #[tokio::test]
    async fn empty_message_is_ignored() {
        let fx = fixture(Vec::new());

        let outcome = fx
            .router
            .handle(InboundMessage::text("5491100000004@s.whatsapp.net", "   "))
            .await
            .expect("handle");
        assert_eq!(outcome, RouteOutcome::Ignored);
        assert!(fx.sender.sent().await.is_empty());
    }

    #[tokio::test]
    async fn conversation_lock_is_evicted_once_handling_finishes() {
        let fx = fixture(vec![ModelReply::text_reply("ok")]);
        let jid = "5491100000006@s.whatsapp.net";

        fx.router.handle(InboundMessage::text(jid, "hola")).await.expect("handle");
        assert!(fx.router.locks.lock().await.is_empty());
    }

    #[tokio::test]
    async fn agent_fault_still_produces_an_apology_reply() {
        // Empty script makes the model fail on first contact.
        let fx = fixture(Vec::new());
        let jid = "5491100000005@s.whatsapp.net";

        let outcome = fx.router.handle(InboundMessage::text(jid, "hola")).await.expect("handle");
        assert_eq!(outcome, RouteOutcome::Replied);

        let sent = fx.sender.sent().await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("problema técnico"));
    }
}
