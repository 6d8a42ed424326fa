//! 执行状态：归属单次执行的可变记录，执行结束即丢弃

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::react::retry::FailureTracker;

/// 一次工具调用的观察记录
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub tool: String,
    pub outcome: Result<Value, String>,
}

impl Observation {
    pub fn success(&self) -> bool {
        self.outcome.is_ok()
    }
}

#[derive(Debug)]
pub struct ExecutionState {
    /// 已开始的迭代数，不超过 max_iterations
    pub iteration: u32,
    pub observations: Vec<Observation>,
    pub failures: FailureTracker,
    pub partial_results: Vec<String>,
    pub error_count: u32,
    pub started_at: DateTime<Utc>,
}

impl ExecutionState {
    pub fn new(max_retries_per_tool: u32) -> Self {
        Self {
            iteration: 0,
            observations: Vec::new(),
            failures: FailureTracker::new(max_retries_per_tool),
            partial_results: Vec::new(),
            error_count: 0,
            started_at: Utc::now(),
        }
    }

    pub fn record_success(&mut self, tool: &str, value: Value) {
        self.observations.push(Observation {
            tool: tool.to_string(),
            outcome: Ok(value),
        });
    }

    /// 记录失败并返回重试策略给出的 observation
    pub fn record_failure(&mut self, tool: &str, error: &str) -> String {
        self.error_count += 1;
        self.observations.push(Observation {
            tool: tool.to_string(),
            outcome: Err(error.to_string()),
        });
        self.failures.record_failure(tool, error)
    }

    pub fn elapsed_ms(&self) -> i64 {
        (Utc::now() - self.started_at).num_milliseconds()
    }
}
