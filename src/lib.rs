//! skillrun - 技能自主执行引擎
//!
//! 模块划分：
//! - **agent**: 无头运行时组装（按配置创建 LLM、工具与执行器）
//! - **config**: 应用配置加载（TOML + 环境变量）、执行配置校验与合并
//! - **core**: 错误类型
//! - **llm**: 推理协作方抽象与实现（OpenAI 兼容 / DeepSeek / Mock）、模型解析
//! - **memory**: 单次执行的对话上下文
//! - **observability**: 日志初始化
//! - **prompt**: 指令变量替换与 system prompt 组装
//! - **react**: 决策解析、重试策略、结果处理、ReAct 主循环与同步汇总
//! - **skills**: 技能定义
//! - **tools**: 工具注册表与执行器

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod prompt;
pub mod react;
pub mod skills;
pub mod tools;

pub use react::{AutonomousExecutor, EventStream, ExecutionRequest, ExecutionSummary, TaskEvent};
