//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）；支持 DeepSeek、OpenAI、自建代理等。
//! 模型与温度由每次调用传入，同一客户端可被多个执行并发共享。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::core::AgentError;
use crate::llm::{CallResult, LlmClient, ModelReply};
use crate::memory::{Message, Role};

pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";

/// Token 使用统计（累计值）
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Arc<AtomicU64>,
    pub completion_tokens: Arc<AtomicU64>,
}

impl TokenUsage {
    pub fn add(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
    }

    /// (prompt_tokens, completion_tokens)
    pub fn get(&self) -> (u64, u64) {
        (
            self.prompt_tokens.load(Ordering::Relaxed),
            self.completion_tokens.load(Ordering::Relaxed),
        )
    }
}

/// OpenAI 兼容客户端
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    request_timeout: Duration,
    pub usage: TokenUsage,
}

impl OpenAiClient {
    pub fn new(base_url: Option<&str>, api_key: Option<&str>, request_timeout_secs: u64) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());

        let config = match base_url {
            Some(url) => OpenAIConfig::new().with_api_base(url).with_api_key(api_key),
            None => OpenAIConfig::new().with_api_key(api_key),
        };

        Self {
            client: Client::with_config(config),
            request_timeout: Duration::from_secs(request_timeout_secs.max(1)),
            usage: TokenUsage::default(),
        }
    }

    /// DeepSeek 端点（OpenAI 兼容格式），优先使用 `DEEPSEEK_API_KEY`
    pub fn deepseek(request_timeout_secs: u64) -> Self {
        let api_key = std::env::var("DEEPSEEK_API_KEY")
            .ok()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        Self::new(Some(DEEPSEEK_BASE_URL), api_key.as_deref(), request_timeout_secs)
    }

    fn to_openai_messages(
        system_prompt: &str,
        conversation: &[Message],
    ) -> Result<Vec<ChatCompletionRequestMessage>, AgentError> {
        let system = std::iter::once(Message::system(system_prompt));
        system
            .chain(conversation.iter().cloned())
            .map(|m| {
                let msg = match m.role {
                    Role::System => ChatCompletionRequestSystemMessageArgs::default()
                        .content(m.content)
                        .build()
                        .map(ChatCompletionRequestMessage::System),
                    Role::User => ChatCompletionRequestUserMessageArgs::default()
                        .content(m.content)
                        .build()
                        .map(ChatCompletionRequestMessage::User),
                    Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                        .content(m.content)
                        .build()
                        .map(ChatCompletionRequestMessage::Assistant),
                };
                msg.map_err(|e| AgentError::LlmError(e.to_string()))
            })
            .collect()
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn call_model(
        &self,
        conversation: &[Message],
        system_prompt: &str,
        model: &str,
        temperature: f32,
    ) -> Result<CallResult<ModelReply>, AgentError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .temperature(temperature)
            .messages(Self::to_openai_messages(system_prompt, conversation)?)
            .build()
            .map_err(|e| AgentError::LlmError(e.to_string()))?;

        let response =
            match tokio::time::timeout(self.request_timeout, self.client.chat().create(request))
                .await
            {
                Ok(Ok(r)) => r,
                Ok(Err(e)) => {
                    tracing::warn!(model, error = %e, "chat completion failed");
                    return Ok(CallResult::failure(e.to_string()));
                }
                Err(_) => {
                    return Ok(CallResult::failure(format!(
                        "request timed out after {}s",
                        self.request_timeout.as_secs()
                    )))
                }
            };

        if let Some(usage) = &response.usage {
            self.usage
                .add(usage.prompt_tokens as u64, usage.completion_tokens as u64);
            let (prompt_total, completion_total) = self.usage.get();
            tracing::debug!(model, prompt_total, completion_total, "token usage");
        }

        match response.choices.first().and_then(|c| c.message.content.clone()) {
            Some(content) => Ok(CallResult::Success(ModelReply::new(content))),
            None => Ok(CallResult::failure("empty completion")),
        }
    }
}
