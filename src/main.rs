//! skillrun - 技能自主执行 CLI
//!
//! 用法：`skillrun <skill.toml | skill-id> <request...>`（id 在 `[app] skills_dir` 下查找）
//! 逐条打印任务事件，最后输出 JSON 汇总；`SKILLRUN_MODEL` 可覆盖本次执行的模型。

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context};
use skillrun::{
    agent::create_executor,
    config::load_config,
    react::{ExecutionRequest, ExecutionSummary, TaskEvent},
    skills::Skill,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    skillrun::observability::init();

    let mut args = std::env::args().skip(1);
    let Some(skill_path) = args.next() else {
        bail!("usage: skillrun <skill.toml | skill-id> <request...>");
    };
    let input = args.collect::<Vec<_>>().join(" ");
    if input.trim().is_empty() {
        bail!("usage: skillrun <skill.toml | skill-id> <request...>");
    }

    let cfg = load_config(None).context("Failed to load config")?;
    let skill_path = match PathBuf::from(&skill_path) {
        p if p.is_file() => p,
        _ => cfg.app.skill_path(&skill_path),
    };
    let skill = Skill::load(&skill_path).context("Failed to load skill")?;
    tracing::info!(app = cfg.app.name.as_deref().unwrap_or("skillrun"), skill = %skill.summary(), "starting");
    let executor = create_executor(skill, &cfg).context("Invalid execution config")?;

    let mut request = ExecutionRequest::new(input);
    if let Ok(model) = std::env::var("SKILLRUN_MODEL") {
        request = request.with_model(model);
    }

    let task_id = uuid::Uuid::new_v4().to_string();
    let session_id = uuid::Uuid::new_v4().to_string();
    let start = Instant::now();
    let mut stream = executor.execute(request, &task_id, &session_id, "local");
    let model = stream.model().to_string();

    let mut events = Vec::new();
    while let Some(event) = stream.next_event().await {
        match &event {
            TaskEvent::Status { state, message } => println!("[{:?}] {}", state, message),
            TaskEvent::Message { text, .. } => println!("{}", text),
            TaskEvent::Error { code, message } => eprintln!("[{}] {}", code, message),
            TaskEvent::Done { final_state } => println!("[done] {:?}", final_state),
        }
        events.push(event);
    }

    let summary =
        ExecutionSummary::from_events(&events, &model, start.elapsed().as_millis() as u64);
    println!("{}", serde_json::to_string_pretty(&summary)?);
    if !summary.success {
        std::process::exit(1);
    }
    Ok(())
}
