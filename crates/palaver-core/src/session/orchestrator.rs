//! Session orchestrator: one incoming utterance end-to-end.
//!
//! Loads user and history, applies the quota/staleness policy, runs the
//! completion pipeline, persists results and talks back over the transport.
//! All turn failures reach the end user as one configured generic notice;
//! the structured detail goes to tracing only.
//!
//! Turns for the same conversation are serialized through a keyed async
//! mutex. User and history updates are still two independent writes, not an
//! atomic pair; a partial failure is tolerated on the next read.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use palaver_types::config::BotConfig;
use palaver_types::error::StoreError;
use palaver_types::event::InboundMessage;

use crate::llm::{CompletionBackend, CompletionPipeline};
use crate::session::{history, policy, store};
use crate::session::store::SessionStore;
use crate::transport::Responder;

/// Settings the orchestrator needs from the configuration.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Quota assigned to users created on first contact.
    pub quota_default: i64,
    /// Idle duration after which a conversation is reset.
    pub stale_after: Duration,
    /// Seed system message for fresh conversations.
    pub system_prompt: String,
    /// Acknowledgement sent when a prompt is accepted.
    pub accepted_notice: String,
    /// Shown when the quota ceiling is reached.
    pub limit_notice: String,
    /// Generic failure notice.
    pub error_notice: String,
}

impl From<&BotConfig> for SessionSettings {
    fn from(config: &BotConfig) -> Self {
        Self {
            quota_default: config.session.quota_default,
            stale_after: Duration::from_secs(config.session.stale_after_secs),
            system_prompt: config.session.system_prompt.clone(),
            accepted_notice: config.messages.accepted.clone(),
            limit_notice: config.messages.limit_reached.clone(),
            error_notice: config.messages.error.clone(),
        }
    }
}

/// How one turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The reply was produced and delivered; state was persisted.
    Replied(String),
    /// The quota short-circuit fired; nothing was sent to the backend.
    LimitReached,
    /// The turn failed; the user saw the generic notice.
    Failed,
}

/// Sequences one incoming utterance end-to-end.
pub struct SessionOrchestrator<S, P, F, R> {
    store: S,
    pipeline: CompletionPipeline<P, F>,
    responder: R,
    settings: SessionSettings,
    /// Per-conversation turn locks. Entries are never removed; the set of
    /// active conversations is small and bounded by the audience.
    locks: DashMap<i64, Arc<Mutex<()>>>,
}

impl<S, P, F, R> SessionOrchestrator<S, P, F, R>
where
    S: SessionStore,
    P: CompletionBackend,
    F: CompletionBackend,
    R: Responder,
{
    pub fn new(
        store: S,
        pipeline: CompletionPipeline<P, F>,
        responder: R,
        settings: SessionSettings,
    ) -> Self {
        Self {
            store,
            pipeline,
            responder,
            settings,
            locks: DashMap::new(),
        }
    }

    fn conversation_lock(&self, conversation_id: i64) -> Arc<Mutex<()>> {
        self.locks
            .entry(conversation_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Deliver a notice, logging delivery failures instead of propagating
    /// them -- a broken transport must not turn into a second failure path.
    async fn notify(&self, conversation_id: i64, text: &str, in_reply_to: Option<i32>) {
        if let Err(err) = self.responder.send(conversation_id, text, in_reply_to).await {
            tracing::error!(conversation_id, error = %err, "Failed to deliver message");
        }
    }

    /// Handle one incoming utterance.
    ///
    /// Turns for the same conversation are serialized; turns for different
    /// conversations run concurrently.
    pub async fn handle(&self, event: &InboundMessage, cancel: &CancellationToken) -> TurnOutcome {
        let lock = self.conversation_lock(event.conversation_id);
        let _guard = lock.lock().await;

        let identity = event.identity();
        tracing::debug!(
            conversation_id = event.conversation_id,
            user_id = identity,
            "Handling new chat message"
        );

        let mut user =
            match store::load_user(&self.store, identity, self.settings.quota_default).await {
                Ok(user) => user,
                Err(err) => {
                    tracing::error!(user_id = identity, error = %err, "Unable to load user");
                    self.notify(event.conversation_id, &self.settings.error_notice, None)
                        .await;
                    return TurnOutcome::Failed;
                }
            };
        if user.chat_id == 0 {
            user.chat_id = event.conversation_id;
        }

        let mut chat_history = match history::load(
            &self.store,
            event.conversation_id,
            &self.settings.system_prompt,
        )
        .await
        {
            Ok(history) => history,
            Err(err) => {
                tracing::error!(
                    conversation_id = event.conversation_id,
                    error = %err,
                    "Unable to load chat history"
                );
                self.notify(event.conversation_id, &self.settings.error_notice, None)
                    .await;
                return TurnOutcome::Failed;
            }
        };

        // Staleness reset is independent of the quota check.
        if policy::is_stale(&user, event.timestamp, self.settings.stale_after) {
            tracing::warn!(
                conversation_id = event.conversation_id,
                user_id = identity,
                "Conversation is new or stale, resetting history"
            );
            chat_history = history::fresh(&self.settings.system_prompt);
        }

        if policy::is_quota_reached(&user) {
            tracing::warn!(user_id = identity, "User has reached the message limit");
            self.notify(event.conversation_id, &self.settings.limit_notice, None)
                .await;
            return TurnOutcome::LimitReached;
        }

        // Let the user know the prompt was accepted before the slow part.
        self.notify(
            event.conversation_id,
            &self.settings.accepted_notice,
            Some(event.message_id),
        )
        .await;

        match self
            .pipeline
            .complete(&event.text, chat_history, cancel)
            .await
        {
            Ok(reply) => {
                user.messages_sent += 1;
                user.last_message_ts = event.timestamp;
                user.chat_id = event.conversation_id;

                if let Err(err) =
                    history::save(&self.store, event.conversation_id, &reply.history).await
                {
                    tracing::error!(
                        conversation_id = event.conversation_id,
                        error = %err,
                        "Unable to save chat history"
                    );
                }
                if let Err(err) = store::save_user(&self.store, &user).await {
                    tracing::error!(user_id = identity, error = %err, "Unable to save user");
                }

                self.notify(event.conversation_id, &reply.text, None).await;
                TurnOutcome::Replied(reply.text)
            }
            Err(failure) => {
                tracing::error!(
                    conversation_id = event.conversation_id,
                    user_id = identity,
                    error = %failure.error,
                    "Unable to get completion"
                );
                self.notify(event.conversation_id, &self.settings.error_notice, None)
                    .await;

                // Best-effort: keep the user message for the next turn.
                if let Err(err) =
                    history::save(&self.store, event.conversation_id, &failure.history).await
                {
                    tracing::warn!(
                        conversation_id = event.conversation_id,
                        error = %err,
                        "Unable to save partial chat history"
                    );
                }
                TurnOutcome::Failed
            }
        }
    }

    /// Reset a conversation to the seed history (the `/new` command).
    pub async fn reset(&self, conversation_id: i64) -> Result<(), StoreError> {
        let lock = self.conversation_lock(conversation_id);
        let _guard = lock.lock().await;

        history::save(
            &self.store,
            conversation_id,
            &history::fresh(&self.settings.system_prompt),
        )
        .await?;
        tracing::debug!(conversation_id, "Conversation reset to seed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::test_store::MemoryStore;
    use palaver_types::error::TransportError;
    use palaver_types::llm::{LlmError, Message, MessageRole};
    use palaver_types::user::User;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PRESET: &str = "You are a helpful assistant.";

    // --- Mocks ---

    #[derive(Clone)]
    enum MockResult {
        Candidates(Vec<&'static str>),
        Server,
        Empty,
    }

    struct MockBackend {
        name: &'static str,
        result: MockResult,
        calls: Arc<AtomicUsize>,
    }

    impl MockBackend {
        fn new(name: &'static str, result: MockResult) -> Self {
            Self {
                name,
                result,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn resolve(&self) -> Result<Vec<String>, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.result {
                MockResult::Candidates(texts) => {
                    Ok(texts.iter().map(|t| t.to_string()).collect())
                }
                MockResult::Server => Err(LlmError::Server("500".to_string())),
                MockResult::Empty => Ok(Vec::new()),
            }
        }
    }

    impl CompletionBackend for MockBackend {
        fn name(&self) -> &str {
            self.name
        }

        async fn chat_complete(&self, _history: &[Message]) -> Result<Vec<String>, LlmError> {
            self.resolve()
        }

        async fn legacy_complete(&self, _prompt: &str) -> Result<Vec<String>, LlmError> {
            self.resolve()
        }
    }

    #[derive(Clone, Default)]
    struct RecordingResponder {
        sent: Arc<StdMutex<Vec<(i64, String, Option<i32>)>>>,
    }

    impl Responder for RecordingResponder {
        async fn send(
            &self,
            conversation_id: i64,
            text: &str,
            in_reply_to: Option<i32>,
        ) -> Result<(), TransportError> {
            self.sent
                .lock()
                .unwrap()
                .push((conversation_id, text.to_string(), in_reply_to));
            Ok(())
        }
    }

    fn settings() -> SessionSettings {
        SessionSettings {
            quota_default: 1000,
            stale_after: Duration::from_secs(3600),
            system_prompt: PRESET.to_string(),
            accepted_notice: "accepted".to_string(),
            limit_notice: "limit reached".to_string(),
            error_notice: "something went wrong".to_string(),
        }
    }

    fn event(text: &str) -> InboundMessage {
        InboundMessage {
            conversation_id: 100,
            sender_id: 42,
            is_private: true,
            text: text.to_string(),
            message_id: 1,
            timestamp: 1_700_000_000,
        }
    }

    type TestOrchestrator =
        SessionOrchestrator<Arc<MemoryStore>, MockBackend, MockBackend, RecordingResponder>;

    fn orchestrator(
        store: Arc<MemoryStore>,
        primary: MockBackend,
        fallback: MockBackend,
        responder: RecordingResponder,
    ) -> TestOrchestrator {
        SessionOrchestrator::new(
            store,
            CompletionPipeline::new(primary, fallback),
            responder,
            settings(),
        )
    }

    impl SessionStore for Arc<MemoryStore> {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
            self.as_ref().get(key).await
        }

        async fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
            self.as_ref().put(key, value).await
        }
    }

    async fn stored_user(store: &MemoryStore, id: i64) -> Option<User> {
        store
            .raw(&format!("user:{id}"))
            .map(|bytes| serde_json::from_slice(&bytes).unwrap())
    }

    async fn stored_history(store: &MemoryStore, conversation_id: i64) -> Option<Vec<Message>> {
        store
            .raw(&format!("chat:{conversation_id}"))
            .map(|bytes| serde_json::from_slice(&bytes).unwrap())
    }

    // --- Scenario tests ---

    #[tokio::test]
    async fn test_first_message_creates_user_and_history() {
        let store = Arc::new(MemoryStore::default());
        let responder = RecordingResponder::default();
        let orch = orchestrator(
            store.clone(),
            MockBackend::new("primary", MockResult::Candidates(vec!["hi!"])),
            MockBackend::new("fallback", MockResult::Server),
            responder.clone(),
        );

        let outcome = orch.handle(&event("hello"), &CancellationToken::new()).await;
        assert_eq!(outcome, TurnOutcome::Replied("hi!".to_string()));

        let user = stored_user(&store, 42).await.unwrap();
        assert_eq!(user.messages_sent, 1);
        assert_eq!(user.last_message_ts, 1_700_000_000);
        assert_eq!(user.chat_id, 100);

        let history = stored_history(&store, 100).await.unwrap();
        let roles: Vec<MessageRole> = history.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![MessageRole::System, MessageRole::User, MessageRole::Assistant]
        );
        assert_eq!(history[1].content, "hello");

        // Acknowledgement replied to the triggering message, reply did not.
        let sent = responder.sent.lock().unwrap();
        assert_eq!(sent[0], (100, "accepted".to_string(), Some(1)));
        assert_eq!(sent[1], (100, "hi!".to_string(), None));
    }

    #[tokio::test]
    async fn test_quota_short_circuit_skips_backend_and_persistence() {
        let store = Arc::new(MemoryStore::default());
        let mut user = User::new(42, 3);
        user.messages_sent = 3;
        user.last_message_ts = 1_700_000_000 - 10;
        store::save_user(&store, &user).await.unwrap();

        let primary = MockBackend::new("primary", MockResult::Candidates(vec!["hi!"]));
        let primary_calls = primary.calls.clone();
        let responder = RecordingResponder::default();
        let orch = orchestrator(
            store.clone(),
            primary,
            MockBackend::new("fallback", MockResult::Server),
            responder.clone(),
        );

        let outcome = orch.handle(&event("hello"), &CancellationToken::new()).await;
        assert_eq!(outcome, TurnOutcome::LimitReached);
        assert_eq!(primary_calls.load(Ordering::SeqCst), 0);

        // Nothing was persisted: count unchanged, no history written.
        assert_eq!(stored_user(&store, 42).await.unwrap().messages_sent, 3);
        assert!(stored_history(&store, 100).await.is_none());

        let sent = responder.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "limit reached");
    }

    #[tokio::test]
    async fn test_stale_conversation_resets_history_before_turn() {
        let store = Arc::new(MemoryStore::default());
        let mut user = User::new(42, 1000);
        user.messages_sent = 5;
        user.last_message_ts = 1_700_000_000 - 7200;
        store::save_user(&store, &user).await.unwrap();

        // A long pre-existing history that must be discarded.
        let old = vec![
            Message::system(PRESET),
            Message::user("old question"),
            Message::assistant("old answer"),
        ];
        history::save(&store, 100, &old).await.unwrap();

        let orch = orchestrator(
            store.clone(),
            MockBackend::new("primary", MockResult::Candidates(vec!["fresh answer"])),
            MockBackend::new("fallback", MockResult::Server),
            RecordingResponder::default(),
        );

        let outcome = orch.handle(&event("new question"), &CancellationToken::new()).await;
        assert_eq!(outcome, TurnOutcome::Replied("fresh answer".to_string()));

        let history = stored_history(&store, 100).await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[1].content, "new question");
    }

    #[tokio::test]
    async fn test_stale_reset_does_not_bypass_quota() {
        let store = Arc::new(MemoryStore::default());
        let mut user = User::new(42, 5);
        user.messages_sent = 5;
        user.last_message_ts = 1_700_000_000 - 7200;
        store::save_user(&store, &user).await.unwrap();

        let primary = MockBackend::new("primary", MockResult::Candidates(vec!["hi!"]));
        let primary_calls = primary.calls.clone();
        let orch = orchestrator(
            store.clone(),
            primary,
            MockBackend::new("fallback", MockResult::Server),
            RecordingResponder::default(),
        );

        let outcome = orch.handle(&event("hello"), &CancellationToken::new()).await;
        assert_eq!(outcome, TurnOutcome::LimitReached);
        assert_eq!(primary_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_group_conversation_shares_identity() {
        let store = Arc::new(MemoryStore::default());
        let orch = orchestrator(
            store.clone(),
            MockBackend::new("primary", MockResult::Candidates(vec!["hi!"])),
            MockBackend::new("fallback", MockResult::Server),
            RecordingResponder::default(),
        );

        let mut group_event = event("hello");
        group_event.is_private = false;
        orch.handle(&group_event, &CancellationToken::new()).await;

        // The user record is keyed by the conversation, not the sender.
        assert!(stored_user(&store, 100).await.is_some());
        assert!(stored_user(&store, 42).await.is_none());
    }

    #[tokio::test]
    async fn test_failed_turn_keeps_quota_and_saves_partial_history() {
        let store = Arc::new(MemoryStore::default());
        let mut user = User::new(42, 1000);
        user.messages_sent = 2;
        user.last_message_ts = 1_700_000_000 - 10;
        store::save_user(&store, &user).await.unwrap();

        let responder = RecordingResponder::default();
        let orch = orchestrator(
            store.clone(),
            MockBackend::new("primary", MockResult::Empty),
            MockBackend::new("fallback", MockResult::Candidates(vec!["unused"])),
            responder.clone(),
        );

        let outcome = orch.handle(&event("hello"), &CancellationToken::new()).await;
        assert_eq!(outcome, TurnOutcome::Failed);

        // Quota untouched.
        assert_eq!(stored_user(&store, 42).await.unwrap().messages_sent, 2);

        // Partial history: user message kept, no assistant message.
        let history = stored_history(&store, 100).await.unwrap();
        let roles: Vec<MessageRole> = history.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![MessageRole::System, MessageRole::User]);

        // The user saw the generic notice, never raw backend detail.
        let sent = responder.sent.lock().unwrap();
        assert_eq!(sent.last().unwrap().1, "something went wrong");
    }

    #[tokio::test]
    async fn test_save_failure_after_success_does_not_fail_turn() {
        let store = Arc::new(MemoryStore::default());
        let responder = RecordingResponder::default();
        let orch = orchestrator(
            store.clone(),
            MockBackend::new("primary", MockResult::Candidates(vec!["hi!"])),
            MockBackend::new("fallback", MockResult::Server),
            responder.clone(),
        );

        *store.fail_puts.lock().unwrap() = Some("disk full".to_string());

        let outcome = orch.handle(&event("hello"), &CancellationToken::new()).await;
        assert_eq!(outcome, TurnOutcome::Replied("hi!".to_string()));
        assert_eq!(responder.sent.lock().unwrap().last().unwrap().1, "hi!");
    }

    #[tokio::test]
    async fn test_malformed_user_record_fails_turn() {
        let store = Arc::new(MemoryStore::default());
        store.put("user:42", b"garbage").await.unwrap();

        let primary = MockBackend::new("primary", MockResult::Candidates(vec!["hi!"]));
        let primary_calls = primary.calls.clone();
        let responder = RecordingResponder::default();
        let orch = orchestrator(
            store.clone(),
            primary,
            MockBackend::new("fallback", MockResult::Server),
            responder.clone(),
        );

        let outcome = orch.handle(&event("hello"), &CancellationToken::new()).await;
        assert_eq!(outcome, TurnOutcome::Failed);
        assert_eq!(primary_calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            responder.sent.lock().unwrap()[0].1,
            "something went wrong"
        );
    }

    #[tokio::test]
    async fn test_concurrent_turns_same_conversation_do_not_lose_updates() {
        let store = Arc::new(MemoryStore::default());
        let orch = Arc::new(orchestrator(
            store.clone(),
            MockBackend::new("primary", MockResult::Candidates(vec!["hi!"])),
            MockBackend::new("fallback", MockResult::Server),
            RecordingResponder::default(),
        ));

        let cancel = CancellationToken::new();
        let first = event("first");
        let second = event("second");
        let (a, b) = tokio::join!(
            orch.handle(&first, &cancel),
            orch.handle(&second, &cancel),
        );
        assert!(matches!(a, TurnOutcome::Replied(_)));
        assert!(matches!(b, TurnOutcome::Replied(_)));

        // Both turns counted; the keyed lock prevented the lost update.
        assert_eq!(stored_user(&store, 42).await.unwrap().messages_sent, 2);
    }

    #[tokio::test]
    async fn test_reset_writes_seed_history() {
        let store = Arc::new(MemoryStore::default());
        let old = vec![Message::system(PRESET), Message::user("old")];
        history::save(&store, 100, &old).await.unwrap();

        let orch = orchestrator(
            store.clone(),
            MockBackend::new("primary", MockResult::Candidates(vec!["hi!"])),
            MockBackend::new("fallback", MockResult::Server),
            RecordingResponder::default(),
        );

        orch.reset(100).await.unwrap();
        let history = stored_history(&store, 100).await.unwrap();
        assert_eq!(history, history::fresh(PRESET));
    }

    #[tokio::test]
    async fn test_reset_surfaces_store_failure() {
        let store = Arc::new(MemoryStore::default());
        *store.fail_puts.lock().unwrap() = Some("disk full".to_string());

        let orch = orchestrator(
            store.clone(),
            MockBackend::new("primary", MockResult::Candidates(vec!["hi!"])),
            MockBackend::new("fallback", MockResult::Server),
            RecordingResponder::default(),
        );

        assert!(orch.reset(100).await.is_err());
    }
}
