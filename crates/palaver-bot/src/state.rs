//! Application state: wires the store, backends and orchestrator together.

use teloxide::Bot;
use tokio_util::sync::CancellationToken;

use palaver_core::llm::CompletionPipeline;
use palaver_core::session::{SessionOrchestrator, SessionSettings};
use palaver_infra::openai::OpenAiBackend;
use palaver_infra::sqlite::pool::database_url;
use palaver_infra::sqlite::{DatabasePool, SqliteSessionStore};
use palaver_types::config::{BotConfig, MessagesConfig};

use crate::telegram::TelegramResponder;

/// The fully wired orchestrator. One OpenAI client serves as the chat-style
/// primary and a second as the legacy fallback; both carry the same
/// credentials and differ only in which endpoint the pipeline asks them for.
pub type Orchestrator =
    SessionOrchestrator<SqliteSessionStore, OpenAiBackend, OpenAiBackend, TelegramResponder>;

pub struct AppState {
    pub orchestrator: Orchestrator,
    pub messages: MessagesConfig,
    /// Cancelled on shutdown so in-flight completion requests stop cleanly.
    pub cancel: CancellationToken,
}

impl AppState {
    pub async fn init(config: &BotConfig, bot: Bot) -> anyhow::Result<Self> {
        let pool = DatabasePool::new(&database_url(&config.db.path)).await?;
        let store = SqliteSessionStore::new(pool);

        let backend = OpenAiBackend::new(&config.openai);
        let pipeline = CompletionPipeline::new(backend.clone(), backend);

        let orchestrator = SessionOrchestrator::new(
            store,
            pipeline,
            TelegramResponder::new(bot),
            SessionSettings::from(config),
        );

        Ok(Self {
            orchestrator,
            messages: config.messages.clone(),
            cancel: CancellationToken::new(),
        })
    }
}
