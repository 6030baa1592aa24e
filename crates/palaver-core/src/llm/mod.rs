//! Completion backend port and the request/fallback pipeline.

pub mod backend;
pub mod pipeline;

pub use backend::CompletionBackend;
pub use pipeline::{CompletionPipeline, TurnFailure, TurnReply};
