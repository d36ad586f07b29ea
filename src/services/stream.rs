//! 流式控制服务
//!
//! 驱动生成后端，把增量片段转换为有序事件流，同时累积完整
//! 响应文本。调用方断开（接收端被丢弃）视为取消信号：停止向
//! 后端拉取片段，但已累积的文本保留，由上层继续修复入库。

use tokio::sync::mpsc;
use tracing::error;

use futures_util::StreamExt;

use crate::generation::{GenerationModel, Prompt};

/// 流事件
///
/// 按序产生按序消费，`Done` 是唯一的终止事件且必然出现，
/// `Error` 可以出现在 `Done` 之前但不替代它。
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Token { text: String },
    Error { message: String },
    Done,
}

/// 一次流式生成的最终结果
#[derive(Debug, Default)]
pub struct StreamOutcome {
    /// 累积的完整响应文本（含未作为事件发出的空白片段）
    pub text: String,
    /// 是否因调用方断开而提前停止
    pub cancelled: bool,
    /// 上游错误消息（如有）
    pub error: Option<String>,
}

/// 事件通道容量，兼作对慢消费端的背压窗口
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

pub struct StreamController;

impl StreamController {
    /// 执行一次流式生成
    ///
    /// 逐个请求片段，`max_tokens` 限制请求的片段数量，超出即
    /// 正常终止。trim 后为空的片段累积进缓冲但不作为事件发出。
    pub async fn run(
        generation: &dyn GenerationModel,
        prompt: &Prompt,
        max_tokens: u32,
        tx: &mpsc::Sender<StreamEvent>,
    ) -> StreamOutcome {
        let mut outcome = StreamOutcome::default();

        let mut fragments = match generation.generate(prompt, max_tokens).await {
            Ok(stream) => stream,
            Err(e) => {
                error!("generation request failed: {}", e);
                outcome.error = Some(e.to_string());
                let _ = tx
                    .send(StreamEvent::Error {
                        message: e.to_string(),
                    })
                    .await;
                let _ = tx.send(StreamEvent::Done).await;
                return outcome;
            }
        };

        let mut pulled: u32 = 0;
        while pulled < max_tokens {
            if tx.is_closed() {
                outcome.cancelled = true;
                break;
            }

            match fragments.next().await {
                Some(Ok(fragment)) => {
                    pulled += 1;
                    outcome.text.push_str(&fragment);

                    if fragment.trim().is_empty() {
                        continue;
                    }

                    if tx.send(StreamEvent::Token { text: fragment }).await.is_err() {
                        outcome.cancelled = true;
                        break;
                    }
                }
                Some(Err(e)) => {
                    error!("generation stream fault: {}", e);
                    outcome.error = Some(e.to_string());
                    let _ = tx
                        .send(StreamEvent::Error {
                            message: e.to_string(),
                        })
                        .await;
                    break;
                }
                None => break,
            }
        }

        // 终止事件无条件发出，取消时接收端已关闭，发送失败可忽略
        let _ = tx.send(StreamEvent::Done).await;

        outcome
    }
}
