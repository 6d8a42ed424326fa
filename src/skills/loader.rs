//! 技能解析：从 skill.toml 读取技能定义
//!
//! 技能存储、版本与校验流程不在本 crate 内，这里只负责把单个文件解析为 Skill。

use std::path::Path;

use serde::Deserialize;

use crate::config::ExecutionOverrides;
use crate::core::AgentError;

/// 技能定义
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Skill {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// 指令模板，支持 {{var}} 变量
    pub instructions: String,
    /// 可调用工具白名单；为空表示不限制
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    /// 技能级模型偏好（可为别名）
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub execution: ExecutionOverrides,
}

#[derive(Debug, Deserialize)]
struct SkillToml {
    skill: Skill,
}

impl Skill {
    pub fn new(id: impl Into<String>, name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            instructions: instructions.into(),
            allowed_tools: Vec::new(),
            model: None,
            execution: ExecutionOverrides::default(),
        }
    }

    pub fn with_allowed_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_execution(mut self, execution: ExecutionOverrides) -> Self {
        self.execution = execution;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn from_toml_str(content: &str) -> Result<Self, AgentError> {
        let data: SkillToml = toml::from_str(content)?;
        Ok(data.skill)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, AgentError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| AgentError::Config(format!("{}: {}", path.display(), e)))?;
        let skill = Self::from_toml_str(&content)?;
        tracing::info!(skill = %skill.id, path = %path.display(), "Loaded skill");
        Ok(skill)
    }

    /// 白名单为空时所有工具可用
    pub fn allows(&self, tool: &str) -> bool {
        self.allowed_tools.is_empty() || self.allowed_tools.iter().any(|t| t == tool)
    }

    /// 获取用于日志与提示的简短描述
    pub fn summary(&self) -> String {
        format!("[{}] {}: {}", self.id, self.name, self.description)
    }
}
