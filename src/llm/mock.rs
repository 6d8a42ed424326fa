//! Mock LLM 客户端（用于测试与离线运行，无需 API）
//!
//! 按脚本顺序返回预设回复；脚本耗尽后回显最后一条 User 消息作为 final_answer。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::core::AgentError;
use crate::llm::{CallResult, LlmClient, ModelReply};
use crate::memory::{Message, Role};

/// 单步脚本
#[derive(Debug, Clone)]
pub enum MockStep {
    /// 正常返回文本
    Reply(String),
    /// 等待指定时长后返回文本（用于触发迭代超时）
    Delayed(Duration, String),
    /// 显式失败
    Fail(String),
    /// 抛出错误
    Raise(String),
}

/// Mock 客户端：脚本化回复 + 调用记录
#[derive(Debug, Default)]
pub struct MockLlmClient {
    script: Mutex<VecDeque<MockStep>>,
    calls: AtomicUsize,
    conversation_lengths: Mutex<Vec<usize>>,
    repeat_last: Option<MockStep>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(steps: impl IntoIterator<Item = MockStep>) -> Self {
        Self {
            script: Mutex::new(steps.into_iter().collect()),
            ..Self::default()
        }
    }

    /// 每次调用都返回同一步
    pub fn repeating(step: MockStep) -> Self {
        Self {
            repeat_last: Some(step),
            ..Self::default()
        }
    }

    /// 已发生的调用次数
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 每次调用时传入的对话条数
    pub fn conversation_lengths(&self) -> Vec<usize> {
        self.conversation_lengths
            .lock()
            .map(|l| l.clone())
            .unwrap_or_default()
    }

    fn next_step(&self) -> Option<MockStep> {
        let popped = self.script.lock().ok().and_then(|mut s| s.pop_front());
        popped.or_else(|| self.repeat_last.clone())
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn call_model(
        &self,
        conversation: &[Message],
        _system_prompt: &str,
        _model: &str,
        _temperature: f32,
    ) -> Result<CallResult<ModelReply>, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut lengths) = self.conversation_lengths.lock() {
            lengths.push(conversation.len());
        }
        match self.next_step() {
            Some(MockStep::Reply(text)) => Ok(CallResult::Success(ModelReply::new(text))),
            Some(MockStep::Delayed(delay, text)) => {
                tokio::time::sleep(delay).await;
                Ok(CallResult::Success(ModelReply::new(text)))
            }
            Some(MockStep::Fail(reason)) => Ok(CallResult::Failure(reason)),
            Some(MockStep::Raise(reason)) => Err(AgentError::LlmError(reason)),
            None => {
                let last_user = conversation
                    .iter()
                    .rev()
                    .find(|m| m.role == Role::User)
                    .map(|m| m.content.as_str())
                    .unwrap_or("(no input)");
                let answer = serde_json::json!({
                    "thought": "Mock client has no script, echoing the request",
                    "is_final": true,
                    "final_answer": format!("Echo from Mock: {}", last_user),
                });
                Ok(CallResult::Success(ModelReply::new(answer.to_string())))
            }
        }
    }
}
