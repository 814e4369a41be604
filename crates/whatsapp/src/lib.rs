//! WhatsApp-facing edge: inbound message events, the outbound sender
//! seam, and the router that serializes work per conversation.

pub mod events;
pub mod router;

pub use events::{InboundMessage, MediaRef, NoopSender, OutboundSender, RecordingSender, SendError};
pub use router::{InboundRouter, RouteOutcome, RouterError};
