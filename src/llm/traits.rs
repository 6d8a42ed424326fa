//! 推理协作方抽象
//!
//! 所有后端（OpenAI 兼容 / DeepSeek / Mock）实现 LlmClient::call_model。
//! 返回值分两层：外层 Err 表示「抛出」的异常（由顶层映射为 EXECUTION_ERROR），
//! 内层 CallResult::Failure 表示显式失败（循环内映射为 LLM_CALL_FAILED）。

use async_trait::async_trait;

use crate::core::AgentError;
use crate::memory::Message;

/// 协作方调用结果：成功值或显式失败原因
#[derive(Debug, Clone, PartialEq)]
pub enum CallResult<T> {
    Success(T),
    Failure(String),
}

impl<T> CallResult<T> {
    pub fn failure(reason: impl Into<String>) -> Self {
        CallResult::Failure(reason.into())
    }
}

/// 模型回复
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelReply {
    pub content: String,
}

impl ModelReply {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// LLM 客户端 trait：按对话、system prompt、模型与温度完成一次调用
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn call_model(
        &self,
        conversation: &[Message],
        system_prompt: &str,
        model: &str,
        temperature: f32,
    ) -> Result<CallResult<ModelReply>, AgentError>;
}
