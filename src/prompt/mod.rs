//! 提示词：指令预处理（变量替换）与 system prompt 组装
//!
//! 模板缓存、版本与实验机制不在此处；ReAct 循环只依赖 PromptBuilder 的两个操作。

mod schema;

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::skills::Skill;

pub use schema::decision_schema_json;

/// 附在用户请求之后的格式提醒
pub const JSON_FORMAT_REMINDER: &str = "Respond with a single JSON object only. \
Use {\"thought\": \"...\", \"is_final\": false, \"action\": \"<tool>\", \"action_input\": {...}} to call a tool, \
or {\"thought\": \"...\", \"is_final\": true, \"final_answer\": \"...\"} when the task is done.";

static VARIABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("variable pattern is valid")
});

/// 将 `{{name}}` 替换为变量值；未知变量保持原样
pub fn substitute_variables(template: &str, variables: &HashMap<String, String>) -> String {
    VARIABLE
        .replace_all(template, |caps: &regex::Captures<'_>| {
            variables
                .get(&caps[1])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// 提示词协作方
pub trait PromptBuilder: Send + Sync {
    /// 指令预处理（变量替换等）
    fn preprocess(&self, instructions: &str, variables: &HashMap<String, String>) -> String;

    /// 组装 system prompt；tools 为 (name, description)，已按技能白名单过滤
    fn system_prompt(&self, skill: &Skill, instructions: &str, tools: &[(String, String)]) -> String;
}

/// 默认实现：技能指令 + 可用工具 + 决策 Schema
#[derive(Debug, Default, Clone)]
pub struct DefaultPromptBuilder;

impl PromptBuilder for DefaultPromptBuilder {
    fn preprocess(&self, instructions: &str, variables: &HashMap<String, String>) -> String {
        substitute_variables(instructions, variables)
    }

    fn system_prompt(&self, skill: &Skill, instructions: &str, tools: &[(String, String)]) -> String {
        let tool_lines = if tools.is_empty() {
            "(no tools available)".to_string()
        } else {
            tools
                .iter()
                .map(|(name, desc)| format!("- {}: {}", name, desc))
                .collect::<Vec<_>>()
                .join("\n")
        };
        format!(
            "You are executing the skill \"{}\".\n\n## Instructions\n{}\n\n## Available tools\n{}\n\n\
             ## Response format\nEvery reply must be one JSON object matching this schema:\n{}\n\n\
             Call one tool per reply. When you have enough information, set is_final to true and give the final_answer.",
            skill.name,
            instructions.trim(),
            tool_lines,
            decision_schema_json()
        )
    }
}
