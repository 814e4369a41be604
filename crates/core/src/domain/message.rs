use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageDirection {
    FromCaller,
    FromBot,
}

impl MessageDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FromCaller => "from_caller",
            Self::FromBot => "from_bot",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "from_caller" => Some(Self::FromCaller),
            "from_bot" => Some(Self::FromBot),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Text,
    Image,
    Video,
    Audio,
    Document,
}

impl ContentType {
    /// Only text messages contribute turns to the model transcript.
    /// Media records keep their stored reference until a summarization
    /// pass gives them renderable text.
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Document => "document",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "text" => Some(Self::Text),
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            "audio" => Some(Self::Audio),
            "document" => Some(Self::Document),
            _ => None,
        }
    }
}

/// One inbound or outbound unit of conversation. Append-only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub jid: String,
    pub direction: MessageDirection,
    pub content_type: ContentType,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl MessageRecord {
    pub fn inbound_text(jid: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            jid: jid.into(),
            direction: MessageDirection::FromCaller,
            content_type: ContentType::Text,
            content: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn outbound_text(jid: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            jid: jid.into(),
            direction: MessageDirection::FromBot,
            content_type: ContentType::Text,
            content: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn inbound_media(
        jid: impl Into<String>,
        content_type: ContentType,
        media_ref: impl Into<String>,
    ) -> Self {
        Self {
            jid: jid.into(),
            direction: MessageDirection::FromCaller,
            content_type,
            content: media_ref.into(),
            timestamp: Utc::now(),
        }
    }
}
