//! 记忆层：单次执行的对话上下文

pub mod conversation;

pub use conversation::{Conversation, Message, Role};
