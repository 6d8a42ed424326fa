//! 决策解析：把模型原始输出解析为 Decision
//!
//! 支持纯 JSON、```json 代码块、或夹在说明文字中的 JSON 对象（首个 `{` 到最后一个 `}`）。
//! 无法匹配决策结构的输入一律返回 malformed Decision（既无 action 也无 final_answer），不返回错误。

use serde::Deserialize;
use serde_json::{Map, Value};

/// 一次模型回复的解析结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decision {
    pub thought: Option<String>,
    pub is_final: bool,
    pub action: Option<String>,
    pub action_input: Map<String, Value>,
    pub final_answer: Option<String>,
}

impl Decision {
    /// 格式错误：由循环走 INVALID_RESPONSE 分支
    pub fn malformed() -> Self {
        Self::default()
    }

    pub fn is_malformed(&self) -> bool {
        !self.is_final && self.action.is_none()
    }
}

#[derive(Debug, Deserialize)]
struct RawDecision {
    thought: Option<String>,
    #[serde(default)]
    is_final: bool,
    action: Option<String>,
    action_input: Option<Value>,
    final_answer: Option<String>,
}

/// 从文本中提取 JSON 片段
fn extract_json(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        return Some(rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim()));
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (end > start).then(|| &trimmed[start..=end])
}

pub fn parse(text: &str) -> Decision {
    let Some(json_str) = extract_json(text) else {
        return Decision::malformed();
    };
    let raw: RawDecision = match serde_json::from_str(json_str) {
        Ok(r) => r,
        Err(e) => {
            tracing::debug!(error = %e, "model output is not a decision object");
            return Decision::malformed();
        }
    };
    let thought = raw.thought.filter(|t| !t.trim().is_empty());

    if raw.is_final {
        return match raw.final_answer {
            Some(answer) => Decision {
                thought,
                is_final: true,
                final_answer: Some(answer),
                ..Decision::default()
            },
            None => Decision {
                thought,
                ..Decision::malformed()
            },
        };
    }

    let action = raw.action.map(|a| a.trim().to_string()).filter(|a| !a.is_empty());
    let action_input = match raw.action_input {
        None | Some(Value::Null) => Some(Map::new()),
        Some(Value::Object(map)) => Some(map),
        Some(_) => None,
    };
    match (action, action_input) {
        (Some(action), Some(action_input)) => Decision {
            thought,
            is_final: false,
            action: Some(action),
            action_input,
            final_answer: None,
        },
        _ => Decision {
            thought,
            ..Decision::malformed()
        },
    }
}
