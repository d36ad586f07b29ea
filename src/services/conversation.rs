//! 会话记忆服务
//!
//! 消息序列与嵌入序列的聚合体。两个序列按位置一一对应，
//! 追加和清空在同一把锁内完成，任何读取方都看不到
//! `len(embeddings) != len(messages)` 的中间态。
//! 嵌入计算等长延迟操作一律在锁外进行。

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;
use crate::index::{EmbeddingModel, FlatVectorIndex, VectorIndex};

/// 消息角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// 一条会话消息，入库后不可变
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

struct MemoryInner {
    messages: Vec<Message>,
    index: FlatVectorIndex,
}

/// 会话记忆
pub struct ConversationMemory {
    embedding_model: Arc<dyn EmbeddingModel>,
    inner: RwLock<MemoryInner>,
}

impl ConversationMemory {
    pub fn new(embedding_model: Arc<dyn EmbeddingModel>) -> Self {
        let dimension = embedding_model.dimension();
        Self {
            embedding_model,
            inner: RwLock::new(MemoryInner {
                messages: Vec::new(),
                index: FlatVectorIndex::new(dimension),
            }),
        }
    }

    /// 追加一条消息
    ///
    /// 先在锁外计算嵌入，再在一次写锁内同时追加消息和向量。
    /// 向量追加失败时消息也不会入库。
    pub async fn append(&self, role: Role, content: &str) -> Result<Message> {
        let embedding = self.embedding_model.encode(content).await?;

        let message = Message {
            role,
            content: content.to_string(),
            timestamp: Utc::now(),
        };

        let mut inner = self.inner.write();
        inner.index.append(embedding)?;
        inner.messages.push(message.clone());

        Ok(message)
    }

    /// 按时间戳升序返回全部历史（时间相等时保持插入序）
    pub fn history(&self) -> Vec<Message> {
        let mut messages = self.inner.read().messages.clone();
        messages.sort_by_key(|m| m.timestamp);
        messages
    }

    /// 同时清空消息序列和嵌入序列
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.messages.clear();
        inner.index.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.read().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// k 近邻检索，返回命中消息的内容，按距离升序
    ///
    /// 越界下标防御性跳过，不作为错误上抛。
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<String>> {
        let inner = self.inner.read();
        let hits = inner.index.search(query, k)?;

        Ok(hits
            .into_iter()
            .filter_map(|(idx, _distance)| inner.messages.get(idx).map(|m| m.content.clone()))
            .collect())
    }

    /// 嵌入序列与消息序列长度（测试用不变量观测点）
    pub fn sequence_lengths(&self) -> (usize, usize) {
        let inner = self.inner.read();
        (inner.index.len(), inner.messages.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::SimpleEmbeddingModel;

    fn memory() -> ConversationMemory {
        ConversationMemory::new(Arc::new(SimpleEmbeddingModel::new(64)))
    }

    #[tokio::test]
    async fn test_append_history_round_trip() {
        let memory = memory();
        let before = Utc::now();

        memory.append(Role::User, "hello").await.unwrap();

        let history = memory.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[0].content, "hello");
        assert!(history[0].timestamp >= before);
    }

    #[tokio::test]
    async fn test_sequences_stay_aligned() {
        let memory = memory();

        for i in 0..5 {
            memory
                .append(Role::User, &format!("message {}", i))
                .await
                .unwrap();
            let (embeddings, messages) = memory.sequence_lengths();
            assert_eq!(embeddings, messages);
        }

        memory.clear();
        let (embeddings, messages) = memory.sequence_lengths();
        assert_eq!(embeddings, 0);
        assert_eq!(messages, 0);
    }

    #[tokio::test]
    async fn test_concurrent_appends_keep_invariant() {
        let memory = Arc::new(memory());

        let mut handles = Vec::new();
        for i in 0..16 {
            let memory = Arc::clone(&memory);
            handles.push(tokio::spawn(async move {
                memory
                    .append(Role::User, &format!("concurrent {}", i))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let (embeddings, messages) = memory.sequence_lengths();
        assert_eq!(embeddings, 16);
        assert_eq!(messages, 16);
    }

    #[tokio::test]
    async fn test_history_sorted_by_timestamp() {
        let memory = memory();
        memory.append(Role::User, "first").await.unwrap();
        memory.append(Role::Assistant, "second").await.unwrap();
        memory.append(Role::User, "third").await.unwrap();

        let history = memory.history();
        assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(history[0].content, "first");
        assert_eq!(history[2].content, "third");
    }

    #[tokio::test]
    async fn test_search_empty_memory_returns_empty() {
        let memory = memory();
        let query = vec![0.0; 64];
        assert!(memory.search(&query, 3).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_role_serializes_lowercase() {
        let memory = memory();
        let message = memory.append(Role::Assistant, "hi").await.unwrap();
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["role"], "assistant");
    }
}
