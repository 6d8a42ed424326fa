//! 技能定义
//!
//! 技能（Skill）= 指令 + 可调用工具白名单 + 执行限制，是一次自主执行的输入。
//!
//! ```text
//! skills/
//! ├── summarize/
//! │   └── skill.toml      # [skill] 元数据、instructions、allowed_tools、[skill.execution]
//! └── ...
//! ```

mod loader;

pub use loader::Skill;
