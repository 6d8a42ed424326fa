//! 模型解析：别名表、价格表与优先级选择
//!
//! 优先级：单次执行覆盖 > 技能偏好 > 平台默认（失败时退回 FALLBACK_MODEL）。

use crate::config::PlatformDefaults;

/// 平台默认不可用时使用的模型
pub const FALLBACK_MODEL: &str = "deepseek-chat";

/// 简写 -> 规范模型名（匹配时忽略大小写）
const MODEL_ALIASES: &[(&str, &str)] = &[
    ("opus", "claude-opus-4-1"),
    ("sonnet", "claude-sonnet-4-5"),
    ("haiku", "claude-3-5-haiku-latest"),
    ("gpt4", "gpt-4o"),
    ("gpt-4", "gpt-4o"),
    ("mini", "gpt-4o-mini"),
    ("deepseek", "deepseek-chat"),
    ("chat", "deepseek-chat"),
    ("reasoner", "deepseek-reasoner"),
];

/// 每百万 token 的美元价格
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPrice {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

const fn price(input: f64, output: f64) -> ModelPrice {
    ModelPrice {
        input_per_million: input,
        output_per_million: output,
    }
}

const MODEL_PRICES: &[(&str, ModelPrice)] = &[
    ("claude-opus-4-1", price(15.0, 75.0)),
    ("claude-sonnet-4-5", price(3.0, 15.0)),
    ("claude-3-5-haiku-latest", price(0.8, 4.0)),
    ("gpt-4o", price(2.5, 10.0)),
    ("gpt-4o-mini", price(0.15, 0.6)),
    ("deepseek-chat", price(0.27, 1.1)),
    ("deepseek-reasoner", price(0.55, 2.19)),
];

/// 价格表中没有的模型按此估算
const DEFAULT_PRICE: ModelPrice = price(3.0, 15.0);

/// 别名解析：已知简写返回规范名，其它原样返回
pub fn canonical_model(hint: &str) -> String {
    let hint = hint.trim();
    MODEL_ALIASES
        .iter()
        .find(|(alias, _)| alias.eq_ignore_ascii_case(hint))
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or_else(|| hint.to_string())
}

pub fn model_price(model: &str) -> ModelPrice {
    MODEL_PRICES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(model))
        .map(|(_, p)| *p)
        .unwrap_or(DEFAULT_PRICE)
}

/// 单次调用的粗略成本：输入/输出价格中点 ÷ 1,000,000（数量级估计，不是真实 token 计费）
pub fn estimate_call_cost(model: &str) -> f64 {
    let p = model_price(model);
    (p.input_per_million + p.output_per_million) / 2.0 / 1_000_000.0
}

/// 模型解析器：持有已确定的平台默认模型
#[derive(Debug, Clone)]
pub struct ModelResolver {
    platform_default: String,
}

impl ModelResolver {
    pub fn new(platform_default: impl Into<String>) -> Self {
        Self {
            platform_default: platform_default.into(),
        }
    }

    /// 从平台默认读取；读取失败时记录警告并使用 FALLBACK_MODEL
    pub fn from_platform(defaults: &dyn PlatformDefaults) -> Self {
        match defaults.default_model() {
            Ok(model) if !model.trim().is_empty() => Self::new(model),
            Ok(_) => Self::new(FALLBACK_MODEL),
            Err(e) => {
                tracing::warn!(error = %e, fallback = FALLBACK_MODEL, "platform default model unavailable");
                Self::new(FALLBACK_MODEL)
            }
        }
    }

    pub fn platform_default(&self) -> &str {
        &self.platform_default
    }

    pub fn resolve(&self, run_override: Option<&str>, skill_preference: Option<&str>) -> String {
        let chosen = [run_override, skill_preference]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|m| !m.is_empty())
            .unwrap_or(self.platform_default.as_str());
        canonical_model(chosen)
    }
}
