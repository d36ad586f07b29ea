//! 文档问答服务
//!
//! 上传的文本文档切分为段落分块，按文档建立独立向量索引，
//! 回答严格限定在该文档的分块内。文档问答不写入会话历史。

use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::config::DocumentConfig;
use crate::error::{AppError, Result};
use crate::generation::GenerationModel;
use crate::index::{EmbeddingModel, FlatVectorIndex, VectorIndex};
use crate::services::prompt::PromptAssembler;
use crate::services::stream::{EVENT_CHANNEL_CAPACITY, StreamController, StreamEvent};

/// 支持的上传扩展名（纯文本类；PDF/DOCX 抽取不在范围内）
const SUPPORTED_EXTENSIONS: [&str; 2] = ["txt", "md"];

struct StoredDocument {
    filename: String,
    chunks: Vec<String>,
    index: FlatVectorIndex,
}

/// 上传回执
#[derive(Debug, Clone, Serialize)]
pub struct UploadReceipt {
    pub document: String,
    pub chunks: usize,
    pub doc_id: String,
}

pub struct DocumentStore {
    documents: DashMap<String, StoredDocument>,
    embedding_model: Arc<dyn EmbeddingModel>,
    generation: Arc<dyn GenerationModel>,
    assembler: Arc<PromptAssembler>,
    config: DocumentConfig,
    max_tokens: u32,
}

impl DocumentStore {
    pub fn new(
        embedding_model: Arc<dyn EmbeddingModel>,
        generation: Arc<dyn GenerationModel>,
        assembler: Arc<PromptAssembler>,
        config: DocumentConfig,
        max_tokens: u32,
    ) -> Self {
        Self {
            documents: DashMap::new(),
            embedding_model,
            generation,
            assembler,
            config,
            max_tokens,
        }
    }

    /// 接收上传，分块、建索引、登记文档
    pub async fn ingest(&self, filename: &str, bytes: &[u8]) -> Result<UploadReceipt> {
        let extension = filename
            .rsplit('.')
            .next()
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        if filename.is_empty() || !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(AppError::Validation("Unsupported file type".to_string()));
        }

        let text = std::str::from_utf8(bytes)
            .map_err(|_| AppError::Validation("file is not valid UTF-8 text".to_string()))?;

        let chunks = chunk_passages(text, self.config.chunk_max_chars);
        if chunks.is_empty() {
            return Err(AppError::Validation("document contains no text".to_string()));
        }

        let chunk_refs: Vec<&str> = chunks.iter().map(String::as_str).collect();
        let embeddings = self.embedding_model.encode_batch(&chunk_refs).await?;

        let mut index = FlatVectorIndex::new(self.embedding_model.dimension());
        for embedding in embeddings {
            index.append(embedding)?;
        }

        let doc_id = Uuid::new_v4().to_string();
        let receipt = UploadReceipt {
            document: filename.to_string(),
            chunks: chunks.len(),
            doc_id: doc_id.clone(),
        };

        info!("ingested document {} ({} chunks)", filename, chunks.len());

        self.documents.insert(
            doc_id,
            StoredDocument {
                filename: filename.to_string(),
                chunks,
                index,
            },
        );

        Ok(receipt)
    }

    pub fn contains(&self, doc_id: &str) -> bool {
        self.documents.contains_key(doc_id)
    }

    /// 检索该文档内与问题最相关的分块
    async fn retrieve_chunks(&self, doc_id: &str, query: &str) -> Result<Vec<String>> {
        let query_embedding = self.embedding_model.encode(query).await?;

        let document = self
            .documents
            .get(doc_id)
            .ok_or_else(|| AppError::NotFound(format!("document not found: {}", doc_id)))?;

        let hits = document.index.search(&query_embedding, self.config.chunk_k)?;
        debug!(
            "document {} matched {} chunks",
            document.filename,
            hits.len()
        );

        Ok(hits
            .into_iter()
            .filter_map(|(idx, _)| document.chunks.get(idx).cloned())
            .collect())
    }

    /// 基于单个文档的流式问答
    pub async fn stream_answer(
        &self,
        doc_id: &str,
        message: &str,
    ) -> Result<mpsc::Receiver<StreamEvent>> {
        let message = message.trim().to_string();
        if message.is_empty() {
            return Err(AppError::Validation("empty message".to_string()));
        }
        if !self.contains(doc_id) {
            return Err(AppError::NotFound(format!("document not found: {}", doc_id)));
        }

        let chunks = self.retrieve_chunks(doc_id, &message).await?;
        let prompt = self.assembler.assemble_document(
            &chunks,
            &message,
            self.generation.supports_templating(),
        );

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let generation = Arc::clone(&self.generation);
        let max_tokens = self.max_tokens;

        tokio::spawn(async move {
            StreamController::run(generation.as_ref(), &prompt, max_tokens, &tx).await;
        });

        Ok(rx)
    }
}

/// 按空行切段，合并相邻段落直到分块大小上限
pub fn chunk_passages(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in text.split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }

        if !current.is_empty() && current.len() + paragraph.len() + 2 > max_chars {
            chunks.push(std::mem::take(&mut current));
        }

        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(paragraph);

        // 单段超限时独立成块，不截断内容
        if current.len() >= max_chars {
            chunks.push(std::mem::take(&mut current));
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::config::DocumentConfig;
    use crate::generation::ScriptedGenerationModel;
    use crate::index::SimpleEmbeddingModel;

    fn store() -> DocumentStore {
        DocumentStore::new(
            Arc::new(SimpleEmbeddingModel::new(64)),
            Arc::new(ScriptedGenerationModel::new(vec!["From ", "the ", "document."])),
            Arc::new(PromptAssembler::new("unused")),
            DocumentConfig {
                chunk_max_chars: 200,
                chunk_k: 3,
            },
            100,
        )
    }

    #[tokio::test]
    async fn test_ingest_text_document() {
        let store = store();
        let receipt = store
            .ingest("notes.txt", b"First paragraph.\n\nSecond paragraph.")
            .await
            .unwrap();

        assert_eq!(receipt.document, "notes.txt");
        assert_eq!(receipt.chunks, 1);
        assert!(store.contains(&receipt.doc_id));
    }

    #[tokio::test]
    async fn test_unsupported_extension_rejected() {
        let store = store();
        let result = store.ingest("scan.pdf", b"%PDF-1.7").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_empty_document_rejected() {
        let store = store();
        let result = store.ingest("empty.txt", b"  \n\n  ").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_unknown_doc_id_is_not_found() {
        let store = store();
        let result = store.stream_answer("missing-id", "question").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_stream_answer_emits_tokens_and_done() {
        let store = store();
        let receipt = store
            .ingest("notes.txt", b"Manta is a gateway.")
            .await
            .unwrap();

        let mut rx = store.stream_answer(&receipt.doc_id, "what is manta?").await.unwrap();
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }

        assert!(events.len() >= 2);
        assert_eq!(events.last(), Some(&StreamEvent::Done));
    }

    #[test]
    fn test_chunking_merges_up_to_limit() {
        let text = "aaa\n\nbbb\n\nccc";
        let chunks = chunk_passages(text, 9);
        assert_eq!(chunks, vec!["aaa\n\nbbb".to_string(), "ccc".to_string()]);
    }

    #[test]
    fn test_oversized_paragraph_kept_whole() {
        let text = "short\n\nthis paragraph is far longer than the limit\n\ntail";
        let chunks = chunk_passages(text, 10);
        assert!(chunks.iter().any(|c| c.contains("far longer")));
        // 超限段不被截断
        assert!(chunks.concat().contains("this paragraph is far longer than the limit"));
    }
}
