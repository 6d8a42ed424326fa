//! 认知层：决策解析、重试策略、结果处理、执行状态与 ReAct 主循环

pub mod events;
pub mod loop_;
pub mod parser;
pub mod results;
pub mod retry;
pub mod state;
pub mod summary;

pub use events::{ErrorCode, TaskEvent, TaskState};
pub use loop_::{AutonomousExecutor, EventStream, ExecutionRequest};
pub use parser::{parse, Decision};
pub use retry::{ApproachKey, FailureTracker};
pub use state::{ExecutionState, Observation};
pub use summary::ExecutionSummary;
