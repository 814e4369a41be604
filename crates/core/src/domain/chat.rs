use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who is allowed to answer in this conversation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChatMode {
    Bot,
    Human,
}

impl ChatMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bot => "BOT",
            Self::Human => "HUMAN",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "BOT" => Some(Self::Bot),
            "HUMAN" => Some(Self::Human),
            _ => None,
        }
    }
}

/// Per-conversation record, keyed by the transport address (jid).
///
/// Created on first inbound message from an unseen caller. `mode` and
/// `bot_active` are toggled by operator action; `core_client_id` is set
/// by the auto-link pass or a completed verification handshake and is
/// never cleared by the bot itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub jid: String,
    pub display_name: Option<String>,
    pub mode: ChatMode,
    pub bot_active: bool,
    pub core_client_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Chat {
    pub fn new(jid: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            jid: jid.into(),
            display_name: None,
            mode: ChatMode::Bot,
            bot_active: true,
            core_client_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The orchestration loop runs iff the chat is in bot mode and the
    /// bot has not been switched off for this conversation.
    pub fn bot_should_reply(&self) -> bool {
        self.mode == ChatMode::Bot && self.bot_active
    }

    pub fn identity(&self) -> CallerIdentity {
        match &self.core_client_id {
            Some(client_id) => CallerIdentity::Linked {
                client_id: client_id.clone(),
                display_name: self.display_name.clone(),
            },
            None => CallerIdentity::Guest,
        }
    }
}

/// Identity state fed to the context builder and to tool execution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallerIdentity {
    Guest,
    Linked { client_id: String, display_name: Option<String> },
}

impl CallerIdentity {
    pub fn is_linked(&self) -> bool {
        matches!(self, Self::Linked { .. })
    }

    pub fn client_id(&self) -> Option<&str> {
        match self {
            Self::Linked { client_id, .. } => Some(client_id),
            Self::Guest => None,
        }
    }

    pub fn display_name(&self) -> Option<&str> {
        match self {
            Self::Linked { display_name, .. } => display_name.as_deref(),
            Self::Guest => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CallerIdentity, Chat, ChatMode};

    #[test]
    fn new_chat_starts_as_active_bot_guest() {
        let chat = Chat::new("5492804503151@s.whatsapp.net");

        assert_eq!(chat.mode, ChatMode::Bot);
        assert!(chat.bot_active);
        assert!(chat.core_client_id.is_none());
        assert!(chat.bot_should_reply());
        assert_eq!(chat.identity(), CallerIdentity::Guest);
    }

    #[test]
    fn bot_gate_requires_both_bot_mode_and_active_flag() {
        let mut chat = Chat::new("jid@s.whatsapp.net");

        chat.mode = ChatMode::Human;
        assert!(!chat.bot_should_reply());

        chat.mode = ChatMode::Bot;
        chat.bot_active = false;
        assert!(!chat.bot_should_reply());

        chat.bot_active = true;
        assert!(chat.bot_should_reply());
    }

    #[test]
    fn linked_chat_exposes_client_identity() {
        let mut chat = Chat::new("jid@s.whatsapp.net");
        chat.core_client_id = Some("client_001".to_string());
        chat.display_name = Some("Juan Pérez".to_string());

        let identity = chat.identity();
        assert!(identity.is_linked());
        assert_eq!(identity.client_id(), Some("client_001"));
        assert_eq!(identity.display_name(), Some("Juan Pérez"));
    }

    #[test]
    fn mode_round_trips_through_storage_token() {
        assert_eq!(ChatMode::parse(ChatMode::Bot.as_str()), Some(ChatMode::Bot));
        assert_eq!(ChatMode::parse("human"), Some(ChatMode::Human));
        assert_eq!(ChatMode::parse("robot"), None);
    }
}
