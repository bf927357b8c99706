//! ksail-messages
//!
//! Centralized messaging for the ksail CLI: message templates, a builder
//! that fills `{placeholders}`, and per-operation categories.

pub mod builder;
pub mod categories;
pub mod macros;
pub mod messages;

pub use messages::MESSAGES;
