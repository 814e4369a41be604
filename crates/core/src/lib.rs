//! Domain types and configuration for the portero bot.
//!
//! This crate holds everything the rest of the workspace agrees on:
//! the per-conversation `Chat` record and its bot-gate invariant, the
//! append-only `MessageRecord`, caller identity state, identity-number
//! normalization, and the application configuration loader.

pub mod config;
pub mod domain;

pub use chrono;

pub use domain::chat::{CallerIdentity, Chat, ChatMode};
pub use domain::identity::{normalize_identity_number, normalize_verification_code};
pub use domain::message::{ContentType, MessageDirection, MessageRecord};
