//! 工具结果处理：有效结果判定、摘要、observation 截断与部分结果汇总

use serde_json::Value;

/// observation 最大字符数
pub const OBSERVATION_LIMIT: usize = 2000;
/// observation 截断标记
pub const TRUNCATION_MARKER: &str = "\n...(truncated)";
/// 摘要最大字符数
const SUMMARY_CHARS: usize = 100;

/// 工具返回值的文本形式：字符串原样，其它值序列化为 JSON
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// 超过 OBSERVATION_LIMIT 时截断并追加标记；对已截断的文本再次截断结果不变
pub fn truncate_observation(text: &str) -> String {
    if text.chars().count() <= OBSERVATION_LIMIT {
        return text.to_string();
    }
    let head: String = text.chars().take(OBSERVATION_LIMIT).collect();
    format!("{head}{TRUNCATION_MARKER}")
}

/// 是否算作有效进展
pub fn is_meaningful(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => s.trim().chars().count() > 10,
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

/// 有效结果的简短摘要
pub fn summarize(tool: &str, value: &Value) -> String {
    match value {
        Value::String(s) => {
            if s.chars().count() > SUMMARY_CHARS {
                format!("{}...(truncated)", s.chars().take(SUMMARY_CHARS).collect::<String>())
            } else {
                s.clone()
            }
        }
        Value::Object(map) => {
            let keys: Vec<&str> = map.keys().take(3).map(String::as_str).collect();
            format!(
                "{}: Retrieved {} items ({}...)",
                tool,
                map.len(),
                keys.join(", ")
            )
        }
        Value::Array(items) => format!("{}: Retrieved {} items", tool, items.len()),
        other => other.to_string().chars().take(SUMMARY_CHARS).collect(),
    }
}

/// 迭代预算耗尽时的部分结果汇总
pub fn synthesize(partial_results: &[String], error_count: u32) -> String {
    if partial_results.is_empty() {
        return format!(
            "Unable to complete task. No partial results available.\nEncountered {} errors during execution.",
            error_count
        );
    }
    let bullets: String = partial_results
        .iter()
        .map(|r| format!("  - {r}\n"))
        .collect();
    format!(
        "Task incomplete. Completed {} of intended objectives:\n{}Encountered {} errors during execution.",
        partial_results.len(),
        bullets,
        error_count
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_meaningful() {
        assert!(!is_meaningful(&json!(null)));
        assert!(!is_meaningful(&json!("   short    ")));
        assert!(is_meaningful(&json!("a longer useful string")));
        assert!(!is_meaningful(&json!({})));
        assert!(is_meaningful(&json!({"k": 1})));
        assert!(!is_meaningful(&json!([])));
        assert!(is_meaningful(&json!([0])));
        assert!(is_meaningful(&json!(0)));
        assert!(is_meaningful(&json!(false)));
    }

    #[test]
    fn test_is_meaningful_is_stable() {
        let value = json!({"rows": [1, 2]});
        let first = is_meaningful(&value);
        assert_eq!(first, is_meaningful(&value));
        assert_eq!(value, json!({"rows": [1, 2]}));
    }

    #[test]
    fn test_summarize_shapes() {
        let long = "y".repeat(150);
        assert_eq!(summarize("read", &json!(long)), format!("{}...(truncated)", "y".repeat(100)));
        assert_eq!(summarize("read", &json!("short text here")), "short text here");

        let map = json!({"a": 1, "b": 2, "c": 3, "d": 4});
        assert_eq!(summarize("db", &map), "db: Retrieved 4 items (a, b, c...)");

        assert_eq!(summarize("ls", &json!([1, 2, 3])), "ls: Retrieved 3 items");
        assert_eq!(summarize("calc", &json!(42)), "42");
    }

    #[test]
    fn test_truncate_observation() {
        let exact = "x".repeat(OBSERVATION_LIMIT);
        assert_eq!(truncate_observation(&exact), exact);

        let long = "x".repeat(OBSERVATION_LIMIT + 1);
        let once = truncate_observation(&long);
        assert!(once.ends_with(TRUNCATION_MARKER));
        assert_eq!(once.chars().count(), OBSERVATION_LIMIT + TRUNCATION_MARKER.chars().count());
        assert_eq!(truncate_observation(&once), once);
    }

    #[test]
    fn test_synthesize() {
        assert_eq!(
            synthesize(&[], 3),
            "Unable to complete task. No partial results available.\nEncountered 3 errors during execution."
        );
        assert_eq!(
            synthesize(&["r1".to_string(), "r2".to_string()], 1),
            "Task incomplete. Completed 2 of intended objectives:\n  - r1\n  - r2\nEncountered 1 errors during execution."
        );
    }
}
