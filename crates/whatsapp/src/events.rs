use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

use portero_core::ContentType;

/// One message as delivered by the WhatsApp transport. Messages sent by
/// the business's own number never reach the router.
#[derive(Clone, Debug)]
pub struct InboundMessage {
    pub jid: String,
    pub text: Option<String>,
    pub media_ref: Option<MediaRef>,
    pub sender_display_name: Option<String>,
}

#[derive(Clone, Debug)]
pub struct MediaRef {
    pub content_type: ContentType,
    pub location: String,
}

impl InboundMessage {
    pub fn text(jid: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            jid: jid.into(),
            text: Some(text.into()),
            media_ref: None,
            sender_display_name: None,
        }
    }

    pub fn media(jid: impl Into<String>, content_type: ContentType, location: impl Into<String>) -> Self {
        Self {
            jid: jid.into(),
            text: None,
            media_ref: Some(MediaRef { content_type, location: location.into() }),
            sender_display_name: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.media_ref.is_none()
            && self.text.as_deref().map_or(true, |text| text.trim().is_empty())
    }
}

#[derive(Debug, Error)]
#[error("message delivery failed: {0}")]
pub struct SendError(pub String);

#[async_trait]
pub trait OutboundSender: Send + Sync {
    async fn send_text(&self, jid: &str, text: &str) -> Result<(), SendError>;
}

/// Sender that drops everything. Used when no transport is attached.
pub struct NoopSender;

#[async_trait]
impl OutboundSender for NoopSender {
    async fn send_text(&self, jid: &str, _text: &str) -> Result<(), SendError> {
        tracing::debug!(event_name = "whatsapp.noop_send", jid = %jid, "outbound reply dropped");
        Ok(())
    }
}

/// Test sender that records every delivery.
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl OutboundSender for RecordingSender {
    async fn send_text(&self, jid: &str, text: &str) -> Result<(), SendError> {
        self.sent.lock().await.push((jid.to_string(), text.to_string()));
        Ok(())
    }
}
