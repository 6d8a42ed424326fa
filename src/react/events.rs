//! 任务事件：执行过程中按序推送给消费方（可序列化为 JSON 供前端 / SSE 展示）
//!
//! 每次执行恰好一个 Done 事件，且总是最后一个。

use serde::{Deserialize, Serialize};

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Working,
    Completed,
    Failed,
}

/// 错误码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    LlmCallFailed,
    InvalidResponse,
    ToolExecutionError,
    IterationTimeout,
    MaxIterationsReached,
    ExecutionError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::LlmCallFailed => "LLM_CALL_FAILED",
            ErrorCode::InvalidResponse => "INVALID_RESPONSE",
            ErrorCode::ToolExecutionError => "TOOL_EXECUTION_ERROR",
            ErrorCode::IterationTimeout => "ITERATION_TIMEOUT",
            ErrorCode::MaxIterationsReached => "MAX_ITERATIONS_REACHED",
            ErrorCode::ExecutionError => "EXECUTION_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单个任务事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    /// 状态变化（开始执行时为 Working）
    Status { state: TaskState, message: String },
    /// 文本消息；is_partial 表示中间过程（进度、思考、动作、观察）
    Message { text: String, is_partial: bool },
    /// 步骤级或终止性错误
    Error { code: ErrorCode, message: String },
    /// 终止事件：Completed 或 Failed
    Done { final_state: TaskState },
}

impl TaskEvent {
    pub fn status(state: TaskState, message: impl Into<String>) -> Self {
        TaskEvent::Status {
            state,
            message: message.into(),
        }
    }

    pub fn progress(text: impl Into<String>) -> Self {
        TaskEvent::Message {
            text: text.into(),
            is_partial: true,
        }
    }

    pub fn message(text: impl Into<String>) -> Self {
        TaskEvent::Message {
            text: text.into(),
            is_partial: false,
        }
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        TaskEvent::Error {
            code,
            message: message.into(),
        }
    }

    pub fn done(final_state: TaskState) -> Self {
        TaskEvent::Done { final_state }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, TaskEvent::Done { .. })
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            TaskEvent::Error { code, .. } => Some(*code),
            _ => None,
        }
    }
}
