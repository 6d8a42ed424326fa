//! 执行引擎错误类型
//!
//! 步骤级问题（超时、工具失败、格式错误）在 ReAct 循环内转为 Error 事件；
//! 只有协作方「抛出」的错误才以 AgentError 形式向上传播，由顶层统一映射为 EXECUTION_ERROR。

use thiserror::Error;

/// 执行过程中可能出现的错误（配置、LLM、工具、取消等）
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// 消费方放弃事件流或取消令牌被触发
    #[error("Cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<config::ConfigError> for AgentError {
    fn from(e: config::ConfigError) -> Self {
        AgentError::Config(e.to_string())
    }
}

impl From<toml::de::Error> for AgentError {
    fn from(e: toml::de::Error) -> Self {
        AgentError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(AgentError::Cancelled.to_string(), "Cancelled");
        assert_eq!(
            AgentError::UnknownTool("grep".to_string()).to_string(),
            "Unknown tool: grep"
        );
    }
}
