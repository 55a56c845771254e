//! Conversation memory: per-session history, tracked entities and follow-up
//! resolution.
//!
//! Sessions live behind a `SessionStore`; each session is guarded by its own
//! async mutex so concurrent queries on one session id are serialized while
//! different sessions proceed independently.

mod context;
mod entities;
mod resolve;

pub use context::{ConversationContext, EntityType, Message, Role, TrackedEntity};
pub use entities::{EntityExtractor, RegexEntityExtractor};
pub use resolve::{needs_resolution, resolve_references};

use dashmap::DashMap;
use sift_core::PipelineConfig;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared handle to one session's state.
pub type SessionHandle = Arc<Mutex<ConversationContext>>;

/// Where sessions are kept.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn get_or_create(&self, session_id: &str) -> SessionHandle;

    async fn get(&self, session_id: &str) -> Option<SessionHandle>;

    /// True if the session existed.
    async fn clear(&self, session_id: &str) -> bool;

    async fn session_ids(&self) -> Vec<String>;
}

/// Process-local session store.
pub struct InMemorySessionStore {
    sessions: DashMap<String, SessionHandle>,
    max_messages: usize,
    max_entities: usize,
}

impl InMemorySessionStore {
    pub fn new(max_messages: usize, max_entities: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            max_messages,
            max_entities,
        }
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_or_create(&self, session_id: &str) -> SessionHandle {
        let entry = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                tracing::debug!("Created session {}", session_id);
                Arc::new(Mutex::new(ConversationContext::new(
                    session_id,
                    self.max_messages,
                    self.max_entities,
                )))
            });
        Arc::clone(entry.value())
    }

    async fn get(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions
            .get(session_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    async fn clear(&self, session_id: &str) -> bool {
        self.sessions.remove(session_id).is_some()
    }

    async fn session_ids(&self) -> Vec<String> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }
}

/// Front door to session state used by the orchestrator.
#[derive(Clone)]
pub struct ConversationMemory {
    store: Arc<dyn SessionStore>,
    extractor: Arc<dyn EntityExtractor>,
}

impl ConversationMemory {
    pub fn new(store: Arc<dyn SessionStore>, extractor: Arc<dyn EntityExtractor>) -> Self {
        Self { store, extractor }
    }

    pub fn in_memory(config: &PipelineConfig) -> Self {
        Self::new(
            Arc::new(InMemorySessionStore::new(
                config.max_messages,
                config.max_entities,
            )),
            Arc::new(RegexEntityExtractor),
        )
    }

    pub async fn get_or_create_session(&self, session_id: &str) -> SessionHandle {
        self.store.get_or_create(session_id).await
    }

    pub async fn add_message(&self, session_id: &str, role: Role, text: &str) {
        let handle = self.store.get_or_create(session_id).await;
        handle.lock().await.add_message(role, text, Vec::new());
    }

    pub fn needs_resolution(&self, query: &str) -> bool {
        needs_resolution(query)
    }

    /// Rewrite a follow-up query. Unknown sessions leave it unchanged.
    pub async fn resolve_references(&self, session_id: &str, query: &str) -> (String, bool) {
        match self.store.get(session_id).await {
            Some(handle) => resolve_references(&*handle.lock().await, query),
            None => (query.to_string(), false),
        }
    }

    pub fn extract_entities(&self, text: &str, query: &str) -> Vec<TrackedEntity> {
        self.extractor.extract(text, query)
    }

    pub async fn update_entities(&self, session_id: &str, entities: Vec<TrackedEntity>, query: &str) {
        let handle = self.store.get_or_create(session_id).await;
        handle.lock().await.update_entities(entities, query);
    }

    pub async fn set_current_topic(&self, session_id: &str, topic: &str) {
        let handle = self.store.get_or_create(session_id).await;
        handle.lock().await.set_current_topic(topic);
    }

    pub async fn clear_session(&self, session_id: &str) -> bool {
        let cleared = self.store.clear(session_id).await;
        if cleared {
            tracing::info!("Cleared session {}", session_id);
        }
        cleared
    }

    pub async fn context_summary(&self, session_id: &str) -> Option<String> {
        let handle = self.store.get(session_id).await?;
        let summary = handle.lock().await.summary();
        Some(summary)
    }

    /// Copy of the session state, if it exists.
    pub async fn snapshot(&self, session_id: &str) -> Option<ConversationContext> {
        let handle = self.store.get(session_id).await?;
        let context = handle.lock().await.clone();
        Some(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory() -> ConversationMemory {
        ConversationMemory::in_memory(&PipelineConfig::default())
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let memory = memory();
        memory.add_message("a", Role::User, "hello").await;
        memory.add_message("b", Role::User, "bonjour").await;

        let a = memory.snapshot("a").await.unwrap();
        assert_eq!(a.messages.len(), 1);
        assert_eq!(a.messages[0].content, "hello");
        assert!(memory.snapshot("c").await.is_none());
    }

    #[tokio::test]
    async fn test_follow_up_flow() {
        let memory = memory();
        let query = "What voltage does the XR-500 need?";
        memory.add_message("s", Role::User, query).await;
        let found = memory.extract_entities("The XR-500 needs 220V.", query);
        memory.update_entities("s", found, query).await;

        let (resolved, modified) = memory.resolve_references("s", "Can this device run at 110V?").await;
        assert!(modified);
        assert_eq!(resolved, "Can XR-500 run at 110V?");

        let summary = memory.context_summary("s").await.unwrap();
        assert!(summary.contains("XR-500"));
    }

    #[tokio::test]
    async fn test_clear_session() {
        let memory = memory();
        memory.set_current_topic("s", "voltage").await;
        assert!(memory.clear_session("s").await);
        assert!(!memory.clear_session("s").await);
        assert_eq!(
            memory.resolve_references("s", "is it ok").await,
            ("is it ok".to_string(), false)
        );
    }

    #[tokio::test]
    async fn test_concurrent_appends_on_one_session() {
        let memory = memory();
        let mut tasks = Vec::new();
        for i in 0..10 {
            let memory = memory.clone();
            tasks.push(tokio::spawn(async move {
                memory
                    .add_message("shared", Role::User, &format!("q{}", i))
                    .await;
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(memory.snapshot("shared").await.unwrap().messages.len(), 10);
    }
}
