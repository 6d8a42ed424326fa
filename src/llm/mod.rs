//! LLM 层：推理协作方抽象与实现（OpenAI 兼容 / DeepSeek / Mock）、模型解析

pub mod mock;
pub mod models;
pub mod openai;
pub mod traits;

pub use mock::{MockLlmClient, MockStep};
pub use models::{canonical_model, estimate_call_cost, ModelResolver, FALLBACK_MODEL};
pub use openai::{OpenAiClient, TokenUsage};
pub use traits::{CallResult, LlmClient, ModelReply};
