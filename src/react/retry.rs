//! 工具失败跟踪与重试策略
//!
//! 以 (工具名, 错误指纹) 作为「思路」键：同一思路在 max_retries_per_tool 次内提示换参数重试，
//! 超过后提示彻底换工具或方法，避免模型在同一失败上无限循环。计数只增不减。

use std::collections::HashMap;

/// 错误指纹取错误文本前若干字符
const FINGERPRINT_CHARS: usize = 100;

/// 失败思路键
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ApproachKey {
    pub tool: String,
    pub fingerprint: String,
}

impl ApproachKey {
    pub fn new(tool: &str, error: &str) -> Self {
        Self {
            tool: tool.to_string(),
            fingerprint: error.chars().take(FINGERPRINT_CHARS).collect(),
        }
    }
}

/// 单次执行内的失败思路计数
#[derive(Debug, Clone)]
pub struct FailureTracker {
    max_retries: u32,
    attempts: HashMap<ApproachKey, u32>,
}

impl FailureTracker {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            attempts: HashMap::new(),
        }
    }

    /// 记录一次失败并返回写回给模型的 observation
    pub fn record_failure(&mut self, tool: &str, error: &str) -> String {
        let count = self.attempts.entry(ApproachKey::new(tool, error)).or_insert(0);
        if *count < self.max_retries {
            *count += 1;
            format!(
                "Tool '{}' failed: {}. Retry attempt {}/{}. Try different parameters or an alternative approach.",
                tool, error, count, self.max_retries
            )
        } else {
            format!(
                "Tool '{}' failed after {} attempts: {}. This approach is not working; try a completely different tool or method.",
                tool, count, error
            )
        }
    }

    pub fn attempts(&self, tool: &str, error: &str) -> u32 {
        self.attempts
            .get(&ApproachKey::new(tool, error))
            .copied()
            .unwrap_or(0)
    }

    /// 不同思路的数量
    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_then_alternative() {
        let mut tracker = FailureTracker::new(2);
        let first = tracker.record_failure("read", "file not found");
        assert!(first.contains("Retry attempt 1/2"));
        let second = tracker.record_failure("read", "file not found");
        assert!(second.contains("Retry attempt 2/2"));
        for _ in 0..5 {
            let later = tracker.record_failure("read", "file not found");
            assert_eq!(
                later,
                "Tool 'read' failed after 2 attempts: file not found. This approach is not working; try a completely different tool or method."
            );
        }
        assert_eq!(tracker.attempts("read", "file not found"), 2);
    }

    #[test]
    fn test_distinct_errors_have_separate_budgets() {
        let mut tracker = FailureTracker::new(1);
        tracker.record_failure("read", "permission denied");
        let other = tracker.record_failure("read", "file not found");
        assert!(other.contains("Retry attempt 1/1"));
        let other_tool = tracker.record_failure("write", "permission denied");
        assert!(other_tool.contains("Retry attempt 1/1"));
        assert_eq!(tracker.len(), 3);
    }

    #[test]
    fn test_fingerprint_uses_prefix() {
        let prefix = "x".repeat(100);
        let mut tracker = FailureTracker::new(1);
        tracker.record_failure("t", &format!("{prefix} first"));
        let msg = tracker.record_failure("t", &format!("{prefix} second"));
        assert!(msg.contains("failed after 1 attempts"));
    }
}
