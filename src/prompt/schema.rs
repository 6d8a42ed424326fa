//! 决策 JSON Schema 生成（schemars）
//!
//! 将「合法决策」的 JSON 结构注入 system prompt，减少 LLM 输出格式错误。

use std::collections::HashMap;

use schemars::{schema_for, JsonSchema};

/// 决策格式：与 react::parser 解析的结构一致（仅用于 Schema 生成）
#[allow(dead_code)]
#[derive(JsonSchema)]
struct DecisionFormat {
    /// 本步推理过程（可选）
    pub thought: Option<String>,
    /// 是否给出最终答案
    pub is_final: bool,
    /// 要调用的工具名（is_final=false 时必填）
    pub action: Option<String>,
    /// 工具参数
    pub action_input: Option<HashMap<String, serde_json::Value>>,
    /// 最终答案（is_final=true 时必填）
    pub final_answer: Option<String>,
}

/// 返回决策的 JSON Schema 字符串，可拼入 system prompt
pub fn decision_schema_json() -> String {
    let schema = schema_for!(DecisionFormat);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_mentions_fields() {
        let schema = decision_schema_json();
        for field in ["is_final", "action", "action_input", "final_answer", "thought"] {
            assert!(schema.contains(field), "missing {field}");
        }
    }
}
