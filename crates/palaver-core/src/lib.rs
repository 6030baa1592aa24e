//! Business logic for palaver.
//!
//! This crate defines the "ports" (RPITIT traits) that the infrastructure
//! layer implements -- `SessionStore`, `CompletionBackend`, `Responder` --
//! and the logic composed on top of them: user policy, history lifecycle,
//! the completion pipeline with its single fallback hop, and the session
//! orchestrator that runs one turn end-to-end.
//!
//! It depends only on `palaver-types` -- never on `palaver-infra` or any
//! database/HTTP crate.

pub mod llm;
pub mod session;
pub mod transport;
