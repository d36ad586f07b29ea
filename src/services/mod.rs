//! 服务模块

pub mod chat;
pub mod conversation;
pub mod document;
pub mod prompt;
pub mod repair;
pub mod retrieval;
pub mod stream;

pub use chat::ChatService;
pub use conversation::{ConversationMemory, Message, Role};
pub use document::{DocumentStore, UploadReceipt, chunk_passages};
pub use prompt::{DOCUMENT_FALLBACK_PHRASE, PromptAssembler};
pub use repair::{ResponseRepairer, TableReport, complete_sentence, normalize_tables, normalize_whitespace};
pub use retrieval::ContextRetriever;
pub use stream::{EVENT_CHANNEL_CAPACITY, StreamController, StreamEvent, StreamOutcome};
