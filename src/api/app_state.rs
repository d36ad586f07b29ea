use crate::observability::AppMetrics;
use crate::services::chat::ChatService;
use crate::services::conversation::ConversationMemory;
use crate::services::document::DocumentStore;
use std::sync::Arc;

/// Application state containing all shared services
#[derive(Clone)]
pub struct AppState {
    /// Chat orchestration service (retrieve -> generate -> repair -> commit)
    pub chat_service: Arc<ChatService>,
    /// Conversation memory backing history and retrieval
    pub memory: Arc<ConversationMemory>,
    /// Uploaded-document store for document-scoped answers
    pub documents: Arc<DocumentStore>,
    /// Application metrics
    pub metrics: Arc<AppMetrics>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("chat_service", &"Arc<ChatService>")
            .field("memory", &"Arc<ConversationMemory>")
            .field("documents", &"Arc<DocumentStore>")
            .field("metrics", &"Arc<AppMetrics>")
            .finish()
    }
}

impl AppState {
    /// Create new application state
    pub fn new(
        chat_service: ChatService,
        memory: Arc<ConversationMemory>,
        documents: DocumentStore,
        metrics: Arc<AppMetrics>,
    ) -> Self {
        Self {
            chat_service: Arc::new(chat_service),
            memory,
            documents: Arc::new(documents),
            metrics,
        }
    }
}
