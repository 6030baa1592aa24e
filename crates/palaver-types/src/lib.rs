//! Shared domain types for palaver.
//!
//! This crate contains the types used across the palaver bot: conversation
//! messages, user records, inbound transport events, configuration, and the
//! error taxonomy.
//!
//! Zero infrastructure dependencies -- only serde and thiserror.

pub mod config;
pub mod error;
pub mod event;
pub mod llm;
pub mod user;
