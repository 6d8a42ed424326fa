//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `SKILLRUN__*` 覆盖（双下划线表示嵌套，如 `SKILLRUN__EXECUTION__MAX_ITERATIONS=20`）。
//! `[execution]` 段是平台默认执行配置，技能级覆盖在其上合并并校验后得到 ExecutionConfig。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::core::AgentError;
use crate::llm::FALLBACK_MODEL;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub execution: ExecutionSection,
    pub tools: ToolsSection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
    /// 技能目录，未设置时用 ./skills
    pub skills_dir: Option<PathBuf>,
}

impl AppSection {
    /// 按技能 id 定位 `<skills_dir>/<id>/skill.toml`
    pub fn skill_path(&self, id: &str) -> PathBuf {
        self.skills_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("skills"))
            .join(id)
            .join("skill.toml")
    }
}

/// [llm] 段：后端选择、默认模型与请求超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：deepseek / openai / mock
    pub provider: String,
    /// 平台默认模型（可为别名）
    pub model: Option<String>,
    pub base_url: Option<String>,
    /// 单次 HTTP 请求超时（秒）
    pub request_timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "deepseek".to_string(),
            model: None,
            base_url: None,
            request_timeout_secs: 120,
        }
    }
}

/// [execution] 段：平台默认执行配置（未校验的原始值）
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExecutionSection {
    pub max_iterations: u32,
    pub max_retries_per_tool: u32,
    pub timeout_per_iteration_ms: u64,
    pub temperature: f32,
    pub enable_error_recovery: bool,
}

impl Default for ExecutionSection {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            max_retries_per_tool: 3,
            timeout_per_iteration_ms: 60_000,
            temperature: 0.7,
            enable_error_recovery: true,
        }
    }
}

/// [tools] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    pub tool_timeout_secs: u64,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 30,
        }
    }
}

/// 技能级覆盖（skill.toml 中的 [skill.execution]），未设置的字段沿用平台默认
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ExecutionOverrides {
    pub max_iterations: Option<u32>,
    pub max_retries_per_tool: Option<u32>,
    pub timeout_per_iteration_ms: Option<u64>,
    pub temperature: Option<f32>,
    pub enable_error_recovery: Option<bool>,
}

/// 校验后的执行配置，单次执行内不可变
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    pub max_iterations: u32,
    pub max_retries_per_tool: u32,
    pub timeout_per_iteration_ms: u64,
    pub temperature: f32,
    pub enable_error_recovery: bool,
    /// 技能级模型偏好
    pub model: Option<String>,
}

impl ExecutionConfig {
    /// 将技能覆盖合并到平台默认之上并校验
    pub fn resolve(
        platform: &ExecutionSection,
        overrides: &ExecutionOverrides,
        model: Option<String>,
    ) -> Result<Self, AgentError> {
        let cfg = Self {
            max_iterations: overrides.max_iterations.unwrap_or(platform.max_iterations),
            max_retries_per_tool: overrides
                .max_retries_per_tool
                .unwrap_or(platform.max_retries_per_tool),
            timeout_per_iteration_ms: overrides
                .timeout_per_iteration_ms
                .unwrap_or(platform.timeout_per_iteration_ms),
            temperature: overrides.temperature.unwrap_or(platform.temperature),
            enable_error_recovery: overrides
                .enable_error_recovery
                .unwrap_or(platform.enable_error_recovery),
            model: model.filter(|m| !m.trim().is_empty()),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), AgentError> {
        check_range("max_iterations", self.max_iterations, 1, 100)?;
        check_range("max_retries_per_tool", self.max_retries_per_tool, 1, 10)?;
        check_range(
            "timeout_per_iteration_ms",
            self.timeout_per_iteration_ms,
            1_000,
            300_000,
        )?;
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(AgentError::Config(format!(
                "temperature must be within [0.0, 2.0], got {}",
                self.temperature
            )));
        }
        Ok(())
    }

    pub fn iteration_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_per_iteration_ms)
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        let platform = ExecutionSection::default();
        Self {
            max_iterations: platform.max_iterations,
            max_retries_per_tool: platform.max_retries_per_tool,
            timeout_per_iteration_ms: platform.timeout_per_iteration_ms,
            temperature: platform.temperature,
            enable_error_recovery: platform.enable_error_recovery,
            model: None,
        }
    }
}

fn check_range<T>(name: &str, value: T, min: T, max: T) -> Result<(), AgentError>
where
    T: PartialOrd + std::fmt::Display,
{
    if value < min || value > max {
        return Err(AgentError::Config(format!(
            "{name} must be within [{min}, {max}], got {value}"
        )));
    }
    Ok(())
}

/// 平台默认值来源（默认模型 + 默认执行配置）
pub trait PlatformDefaults: Send + Sync {
    fn default_model(&self) -> Result<String, AgentError>;

    fn default_execution(&self) -> ExecutionSection;
}

impl PlatformDefaults for AppConfig {
    /// 未配置 llm.model 时使用 FALLBACK_MODEL
    fn default_model(&self) -> Result<String, AgentError> {
        Ok(self
            .llm
            .model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_MODEL.to_string()))
    }

    fn default_execution(&self) -> ExecutionSection {
        self.execution.clone()
    }
}

/// 从 config 目录加载配置，环境变量 SKILLRUN__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 SKILLRUN__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("SKILLRUN")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}
