//! 工具执行器
//!
//! 持有 ToolRegistry 与全局超时，call_tool(tool_name, args) 在超时内调用 registry.execute，
//! 工具错误、未知工具与超时都转为 CallResult::Failure；每次调用输出结构化审计日志（JSON）。

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::time::timeout;

use crate::core::AgentError;
use crate::llm::CallResult;
use crate::tools::{ToolInvoker, ToolRegistry};

/// 工具执行器：对每次调用施加超时，并将结果映射为 CallResult
pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[async_trait]
impl ToolInvoker for ToolExecutor {
    async fn call_tool(
        &self,
        name: &str,
        args: Map<String, Value>,
    ) -> Result<CallResult<Value>, AgentError> {
        let start = Instant::now();
        let preview = args_preview(&args);
        let result = timeout(self.timeout, self.registry.execute(name, args)).await;

        let outcome = match &result {
            Ok(Ok(_)) => "ok",
            Ok(Err(AgentError::UnknownTool(_))) => "unknown_tool",
            Ok(Err(_)) => "error",
            Err(_) => "timeout",
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": name,
            "ok": outcome == "ok",
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": preview,
        });
        tracing::info!(audit = %audit, "tool");

        Ok(match result {
            Ok(Ok(value)) => CallResult::Success(value),
            Ok(Err(AgentError::ToolExecutionFailed(reason))) => CallResult::Failure(reason),
            Ok(Err(e)) => CallResult::Failure(e.to_string()),
            Err(_) => CallResult::Failure(
                AgentError::ToolTimeout(format!("{} after {}s", name, self.timeout.as_secs()))
                    .to_string(),
            ),
        })
    }

    fn tool_descriptions(&self) -> Vec<(String, String)> {
        self.registry.tool_descriptions()
    }
}

fn args_preview(args: &Map<String, Value>) -> String {
    let s = Value::Object(args.clone()).to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
