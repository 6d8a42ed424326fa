//! Headless 运行时组装
//!
//! 供 CLI / HTTP 等前端调用：按配置创建 LLM 客户端与工具执行器，并为技能构建 AutonomousExecutor。

use std::sync::Arc;

use crate::config::AppConfig;
use crate::core::AgentError;
use crate::llm::{LlmClient, MockLlmClient, OpenAiClient};
use crate::react::AutonomousExecutor;
use crate::skills::Skill;
use crate::tools::{EchoTool, ToolExecutor, ToolRegistry};

/// 根据 provider 与环境中的 API Key 选择推理后端；都不可用时退回 Mock
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    let timeout = cfg.llm.request_timeout_secs;
    if provider == "mock" {
        tracing::info!("Using Mock LLM");
        return Arc::new(MockLlmClient::new());
    }

    let use_deepseek = std::env::var("DEEPSEEK_API_KEY").is_ok()
        || (provider == "deepseek" && std::env::var("OPENAI_API_KEY").is_ok());
    let use_openai = std::env::var("OPENAI_API_KEY").is_ok() && provider != "deepseek";

    if use_deepseek {
        tracing::info!("Using DeepSeek LLM");
        Arc::new(OpenAiClient::deepseek(timeout))
    } else if use_openai {
        tracing::info!(base_url = ?cfg.llm.base_url, "Using OpenAI-compatible LLM");
        Arc::new(OpenAiClient::new(
            cfg.llm.base_url.as_deref(),
            std::env::var("OPENAI_API_KEY").ok().as_deref(),
            timeout,
        ))
    } else {
        tracing::warn!("No API key set or provider unknown, using Mock LLM");
        Arc::new(MockLlmClient::new())
    }
}

/// 内置工具集
pub fn create_tool_executor(cfg: &AppConfig) -> ToolExecutor {
    let mut tools = ToolRegistry::new();
    tools.register(EchoTool);
    ToolExecutor::new(tools, cfg.tools.tool_timeout_secs)
}

/// 为技能构建执行器：配置非法时返回 AgentError::Config
pub fn create_executor(skill: Skill, cfg: &AppConfig) -> Result<AutonomousExecutor, AgentError> {
    let llm = create_llm_from_config(cfg);
    let tools = Arc::new(create_tool_executor(cfg));
    AutonomousExecutor::new(skill, llm, tools, cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecutionOverrides;
    use crate::react::ExecutionRequest;

    fn mock_config() -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.llm.provider = "mock".to_string();
        cfg.llm.model = Some("reasoner".to_string());
        cfg
    }

    #[tokio::test]
    async fn test_mock_pipeline_completes() {
        let exec = create_executor(Skill::new("echo", "Echo", "Repeat the request"), &mock_config()).unwrap();
        let summary = exec
            .execute_sync(ExecutionRequest::new("ping"), "t1", "s1", "tenant")
            .await;
        assert!(summary.success);
        assert!(summary.result.contains("Echo from Mock: ping"));
        assert_eq!(summary.model, "deepseek-reasoner");
    }

    #[test]
    fn test_invalid_skill_limits_rejected() {
        let skill = Skill::new("bad", "Bad", "x").with_execution(ExecutionOverrides {
            max_iterations: Some(500),
            ..Default::default()
        });
        assert!(matches!(
            create_executor(skill, &mock_config()),
            Err(AgentError::Config(_))
        ));
    }
}
