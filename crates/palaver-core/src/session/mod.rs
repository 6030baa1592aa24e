//! Session state: store port, user policy, history lifecycle, orchestrator.

pub mod history;
pub mod orchestrator;
pub mod policy;
pub mod store;

#[cfg(test)]
pub(crate) mod test_store;

pub use orchestrator::{SessionOrchestrator, SessionSettings, TurnOutcome};
pub use store::SessionStore;
