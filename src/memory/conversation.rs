//! 对话上下文
//!
//! 单次执行内的角色标注消息序列：以用户请求开头，每个非终止迭代追加 assistant 决策与 observation 两条。
//! 只追加，不剪枝、不重排。

use serde::{Deserialize, Serialize};

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
    System,
}

/// 单条消息
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// 对话上下文：归属单次执行，随执行结束丢弃
#[derive(Clone, Debug, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// 以用户请求作为第一条消息
    pub fn seeded(request: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(request)],
        }
    }

    pub fn push(&mut self, msg: Message) {
        self.messages.push(msg);
    }

    /// 记录一个完整的 act/observe 步骤（assistant 决策原文 + observation）
    pub fn push_step(&mut self, decision_text: impl Into<String>, observation: impl Into<String>) {
        self.messages.push(Message::assistant(decision_text));
        self.messages.push(Message::user(observation));
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_step_appends_in_order() {
        let mut conv = Conversation::seeded("list files");
        conv.push_step("{\"action\":\"ls\"}", "Observation: a.txt");
        assert_eq!(conv.len(), 3);
        assert_eq!(conv.messages()[0].role, Role::User);
        assert_eq!(conv.messages()[1].role, Role::Assistant);
        assert_eq!(conv.messages()[2].content, "Observation: a.txt");
    }
}
