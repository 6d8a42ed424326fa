//! 同步汇总：排空事件流，合成一个执行结果（供 HTTP / CLI 等非流式调用方使用）

use std::time::Instant;

use futures_util::StreamExt;
use serde::Serialize;

use crate::llm::estimate_call_cost;
use crate::react::events::{TaskEvent, TaskState};
use crate::react::loop_::{AutonomousExecutor, ExecutionRequest};

/// 一次执行的汇总结果
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionSummary {
    /// 所有 Message 文本按行拼接
    pub result: String,
    pub success: bool,
    /// 最后一个 Error 事件的消息
    pub error: Option<String>,
    /// 按 "Action:" 标记计数
    pub iterations: usize,
    pub model: String,
    /// 粗略单次调用成本（美元）
    pub estimated_cost_usd: f64,
    pub duration_ms: u64,
    pub partial_results: Vec<String>,
}

impl ExecutionSummary {
    /// 由完整事件序列构造
    pub fn from_events(events: &[TaskEvent], model: &str, duration_ms: u64) -> Self {
        let texts: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                TaskEvent::Message { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        let result = texts.join("\n");
        let success = events
            .iter()
            .rev()
            .find_map(|e| match e {
                TaskEvent::Done { final_state } => Some(*final_state == TaskState::Completed),
                _ => None,
            })
            .unwrap_or(false);
        let error = events.iter().rev().find_map(|e| match e {
            TaskEvent::Error { message, .. } => Some(message.clone()),
            _ => None,
        });

        Self {
            iterations: result.matches("Action:").count(),
            partial_results: extract_partial_results(&result),
            result,
            success,
            error,
            model: model.to_string(),
            estimated_cost_usd: estimate_call_cost(model),
            duration_ms,
        }
    }
}

/// 结果提到 partial / completed 时，取其中以 "-" 开头的条目
fn extract_partial_results(result: &str) -> Vec<String> {
    let lower = result.to_lowercase();
    if !lower.contains("partial") && !lower.contains("completed") {
        return Vec::new();
    }
    result
        .lines()
        .filter_map(|line| line.trim_start().strip_prefix('-'))
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

impl AutonomousExecutor {
    /// 执行并等待结束，返回汇总结果
    pub async fn execute_sync(
        &self,
        request: ExecutionRequest,
        task_id: &str,
        session_id: &str,
        tenant_id: &str,
    ) -> ExecutionSummary {
        let start = Instant::now();
        let stream = self.execute(request, task_id, session_id, tenant_id);
        let model = stream.model().to_string();
        let events: Vec<TaskEvent> = stream.collect().await;
        let summary =
            ExecutionSummary::from_events(&events, &model, start.elapsed().as_millis() as u64);
        tracing::info!(
            task_id,
            success = summary.success,
            iterations = summary.iterations,
            duration_ms = summary.duration_ms,
            "execution summary"
        );
        summary
    }
}
