//! 工具注册表与工具协作方契约
//!
//! 所有工具实现 Tool trait（name / description / execute），由 ToolRegistry 按名注册与查找；
//! ReAct 循环只依赖 ToolInvoker（call_tool + tool_descriptions），ToolExecutor 是其默认实现。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::core::AgentError;
use crate::llm::CallResult;

/// 工具 trait：名称、描述（供 LLM 理解）、参数 schema、异步执行（args 为 JSON 对象）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（对应决策 JSON 中的 "action" 字段）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 参数 JSON Schema，默认不限
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    /// 执行工具；返回值保留 JSON 结构，供有效结果判定与摘要使用
    async fn execute(&self, args: Map<String, Value>) -> Result<Value, String>;
}

/// 工具协作方：按名调用工具并返回成功值或显式失败
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn call_tool(
        &self,
        name: &str,
        args: Map<String, Value>,
    ) -> Result<CallResult<Value>, AgentError>;

    /// (name, description) 列表，用于生成 system prompt 中的可用工具段落
    fn tool_descriptions(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}

/// 工具注册表：按名称存储 Arc<dyn Tool>
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub async fn execute(&self, name: &str, args: Map<String, Value>) -> Result<Value, AgentError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| AgentError::UnknownTool(name.to_string()))?;
        tool.execute(args).await.map_err(AgentError::ToolExecutionFailed)
    }

    pub fn tool_descriptions(&self) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = self
            .tools
            .iter()
            .map(|(name, tool)| (name.clone(), tool.description().to_string()))
            .collect();
        out.sort();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::EchoTool;

    #[tokio::test]
    async fn test_unknown_tool() {
        let registry = ToolRegistry::new();
        let err = registry.execute("nope", Map::new()).await.unwrap_err();
        assert!(matches!(err, AgentError::UnknownTool(name) if name == "nope"));
    }

    #[tokio::test]
    async fn test_register_and_execute() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        let mut args = Map::new();
        args.insert("text".to_string(), Value::String("hi".to_string()));
        let value = registry.execute("echo", args).await.unwrap();
        assert_eq!(value, Value::String("hi".to_string()));
        let names: Vec<String> = registry.tool_descriptions().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["echo".to_string()]);
    }
}
