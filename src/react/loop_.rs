//! ReAct 主循环
//!
//! Reason (LLM) -> Act (Tool) -> Observe，直到给出最终答案、不可恢复失败或迭代预算耗尽。
//! 每次执行在独立 tokio 任务中顺序运行，事件经有界 mpsc 通道按序推送给 EventStream；
//! 取消令牌贯穿每个挂起点（LLM 调用、工具调用、事件发送），EventStream 被丢弃即取消。

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::{FutureExt, Stream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::{ExecutionConfig, PlatformDefaults};
use crate::core::AgentError;
use crate::llm::{CallResult, LlmClient, ModelResolver};
use crate::memory::Conversation;
use crate::prompt::{DefaultPromptBuilder, PromptBuilder, JSON_FORMAT_REMINDER};
use crate::react::events::{ErrorCode, TaskEvent, TaskState};
use crate::react::parser;
use crate::react::results::{is_meaningful, summarize, synthesize, truncate_observation, value_text};
use crate::react::state::ExecutionState;
use crate::skills::Skill;
use crate::tools::ToolInvoker;

/// 事件通道容量；消费方读得慢时执行在发送处挂起
const EVENT_BUFFER: usize = 16;

/// 单次执行请求
#[derive(Debug, Clone, Default)]
pub struct ExecutionRequest {
    /// 用户请求
    pub input: String,
    /// 指令模板变量
    pub variables: HashMap<String, String>,
    /// 单次执行的模型覆盖（最高优先级）
    pub model: Option<String>,
}

impl ExecutionRequest {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            ..Self::default()
        }
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// 执行标识，随日志 span 与指令变量传递
#[derive(Debug, Clone)]
struct RunContext {
    task_id: String,
    session_id: String,
    tenant_id: String,
    model: String,
}

/// 任务事件流：按发出顺序产出事件，以唯一的 Done 结束
pub struct EventStream {
    rx: mpsc::Receiver<TaskEvent>,
    cancel: CancellationToken,
    model: String,
}

impl EventStream {
    /// 本次执行使用的模型
    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn next_event(&mut self) -> Option<TaskEvent> {
        self.rx.recv().await
    }
}

impl Stream for EventStream {
    type Item = TaskEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<TaskEvent>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// 发送端：所有挂起点都与取消令牌竞争
struct EventSink {
    tx: mpsc::Sender<TaskEvent>,
    cancel: CancellationToken,
}

impl EventSink {
    async fn emit(&self, event: TaskEvent) -> Result<(), AgentError> {
        tracing::debug!(?event, "task event");
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AgentError::Cancelled),
            sent = self.tx.send(event) => sent.map_err(|_| AgentError::Cancelled),
        }
    }

    async fn guard<F: Future>(&self, fut: F) -> Result<F::Output, AgentError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AgentError::Cancelled),
            out = fut => Ok(out),
        }
    }
}

/// 自主执行器：绑定一个技能与推理/工具协作方，可并发启动多次独立执行
#[derive(Clone)]
pub struct AutonomousExecutor {
    skill: Arc<Skill>,
    config: ExecutionConfig,
    llm: Arc<dyn LlmClient>,
    tools: Arc<dyn ToolInvoker>,
    prompts: Arc<dyn PromptBuilder>,
    models: ModelResolver,
}

impl AutonomousExecutor {
    /// 合并技能覆盖与平台默认得到执行配置；配置非法时返回 AgentError::Config
    pub fn new(
        skill: Skill,
        llm: Arc<dyn LlmClient>,
        tools: Arc<dyn ToolInvoker>,
        defaults: &dyn PlatformDefaults,
    ) -> Result<Self, AgentError> {
        let config = ExecutionConfig::resolve(
            &defaults.default_execution(),
            &skill.execution,
            skill.model.clone(),
        )?;
        Ok(Self {
            skill: Arc::new(skill),
            config,
            llm,
            tools,
            prompts: Arc::new(DefaultPromptBuilder),
            models: ModelResolver::from_platform(defaults),
        })
    }

    pub fn with_prompt_builder(mut self, prompts: Arc<dyn PromptBuilder>) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    pub fn skill(&self) -> &Skill {
        &self.skill
    }

    /// 单次覆盖 > 技能偏好 > 平台默认
    pub fn resolve_model(&self, run_override: Option<&str>) -> String {
        self.models.resolve(run_override, self.config.model.as_deref())
    }

    /// 启动一次执行，返回事件流；需在 tokio 运行时内调用
    pub fn execute(
        &self,
        request: ExecutionRequest,
        task_id: &str,
        session_id: &str,
        tenant_id: &str,
    ) -> EventStream {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let cancel = CancellationToken::new();
        let ctx = RunContext {
            task_id: task_id.to_string(),
            session_id: session_id.to_string(),
            tenant_id: tenant_id.to_string(),
            model: self.resolve_model(request.model.as_deref()),
        };
        let span = tracing::info_span!(
            "skill_execution",
            task_id = %ctx.task_id,
            session_id = %ctx.session_id,
            tenant_id = %ctx.tenant_id,
            skill = %self.skill.id,
            model = %ctx.model,
        );
        let model = ctx.model.clone();
        let sink = EventSink {
            tx,
            cancel: cancel.clone(),
        };
        tokio::spawn(self.clone().run(request, ctx, sink).instrument(span));

        EventStream { rx, cancel, model }
    }

    /// 顶层：Done 只在这里发出；drive 的错误或 panic 在此统一映射为 EXECUTION_ERROR
    async fn run(self, request: ExecutionRequest, ctx: RunContext, sink: EventSink) {
        let outcome = AssertUnwindSafe(self.drive(&request, &ctx, &sink))
            .catch_unwind()
            .await;
        let final_state = match outcome {
            Ok(Ok(state)) => state,
            // 协作方也可能返回 Cancelled，只有令牌被触发才算消费方放弃
            Ok(Err(_)) if sink.cancel.is_cancelled() => {
                tracing::info!("event stream dropped, execution cancelled");
                return;
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "execution failed");
                let _ = sink
                    .emit(TaskEvent::error(ErrorCode::ExecutionError, e.to_string()))
                    .await;
                TaskState::Failed
            }
            Err(panic) => {
                let msg = panic_message(&*panic);
                tracing::error!(panic = %msg, "execution panicked");
                let _ = sink
                    .emit(TaskEvent::error(
                        ErrorCode::ExecutionError,
                        format!("Unexpected failure: {msg}"),
                    ))
                    .await;
                TaskState::Failed
            }
        };
        let _ = sink.emit(TaskEvent::done(final_state)).await;
    }

    async fn drive(
        &self,
        request: &ExecutionRequest,
        ctx: &RunContext,
        sink: &EventSink,
    ) -> Result<TaskState, AgentError> {
        let cfg = &self.config;
        let max = cfg.max_iterations;
        tracing::info!(max_iterations = max, "starting skill execution");
        sink.emit(TaskEvent::status(
            TaskState::Working,
            format!("Executing skill '{}'", self.skill.name),
        ))
        .await?;

        let mut variables = request.variables.clone();
        variables
            .entry("task_id".to_string())
            .or_insert_with(|| ctx.task_id.clone());
        variables
            .entry("session_id".to_string())
            .or_insert_with(|| ctx.session_id.clone());
        variables
            .entry("tenant_id".to_string())
            .or_insert_with(|| ctx.tenant_id.clone());
        let instructions = self.prompts.preprocess(&self.skill.instructions, &variables);
        let tools: Vec<(String, String)> = self
            .tools
            .tool_descriptions()
            .into_iter()
            .filter(|(name, _)| self.skill.allows(name))
            .collect();
        let system_prompt = self.prompts.system_prompt(&self.skill, &instructions, &tools);

        let mut state = ExecutionState::new(cfg.max_retries_per_tool);
        let mut conversation =
            Conversation::seeded(format!("{}\n\n{}", request.input, JSON_FORMAT_REMINDER));

        for i in 0..max {
            state.iteration = i + 1;
            sink.emit(TaskEvent::progress(format!("Iteration {}/{}", i + 1, max)))
                .await?;

            let call = self.llm.call_model(
                conversation.messages(),
                &system_prompt,
                &ctx.model,
                cfg.temperature,
            );
            let content = match sink.guard(timeout(cfg.iteration_timeout(), call)).await? {
                Err(_) => {
                    state.error_count += 1;
                    tracing::warn!(iteration = i + 1, "reasoning call timed out");
                    sink.emit(TaskEvent::error(
                        ErrorCode::IterationTimeout,
                        format!(
                            "Iteration {} timed out after {}ms",
                            i + 1,
                            cfg.timeout_per_iteration_ms
                        ),
                    ))
                    .await?;
                    if !cfg.enable_error_recovery {
                        return Ok(TaskState::Failed);
                    }
                    continue;
                }
                Ok(result) => match result? {
                    CallResult::Success(reply) => reply.content,
                    CallResult::Failure(reason) => {
                        state.error_count += 1;
                        tracing::warn!(iteration = i + 1, %reason, "reasoning call failed");
                        sink.emit(TaskEvent::error(
                            ErrorCode::LlmCallFailed,
                            format!("LLM call failed: {reason}"),
                        ))
                        .await?;
                        if !cfg.enable_error_recovery {
                            return Ok(TaskState::Failed);
                        }
                        continue;
                    }
                },
            };

            let decision = parser::parse(&content);
            if let Some(thought) = &decision.thought {
                sink.emit(TaskEvent::progress(format!("Thought: {thought}")))
                    .await?;
            }

            if decision.is_final {
                let answer = decision.final_answer.unwrap_or_default();
                sink.emit(TaskEvent::message(answer)).await?;
                tracing::info!(
                    iterations = i + 1,
                    errors = state.error_count,
                    elapsed_ms = state.elapsed_ms(),
                    "skill execution completed"
                );
                return Ok(TaskState::Completed);
            }

            let Some(action) = decision.action else {
                state.error_count += 1;
                tracing::warn!(iteration = i + 1, "unparsable model response");
                sink.emit(TaskEvent::error(
                    ErrorCode::InvalidResponse,
                    "Model response did not contain a valid action or final answer",
                ))
                .await?;
                continue;
            };

            sink.emit(TaskEvent::progress(format!("Action: {action}")))
                .await?;
            let outcome = if self.skill.allows(&action) {
                match sink
                    .guard(self.tools.call_tool(&action, decision.action_input))
                    .await?
                {
                    Ok(result) => result,
                    Err(e) => CallResult::Failure(e.to_string()),
                }
            } else {
                CallResult::failure(format!("Tool '{action}' is not allowed for this skill"))
            };

            let observation = match outcome {
                CallResult::Success(value) => {
                    let text = truncate_observation(&value_text(&value));
                    if is_meaningful(&value) {
                        state.partial_results.push(summarize(&action, &value));
                    }
                    state.record_success(&action, value);
                    text
                }
                CallResult::Failure(error) => {
                    let text = state.record_failure(&action, &error);
                    if !cfg.enable_error_recovery {
                        sink.emit(TaskEvent::error(ErrorCode::ToolExecutionError, text))
                            .await?;
                        return Ok(TaskState::Failed);
                    }
                    text
                }
            };

            let observation = format!("Observation: {observation}");
            sink.emit(TaskEvent::progress(observation.clone())).await?;
            conversation.push_step(content, observation);
        }

        tracing::warn!(
            max_iterations = max,
            iteration = state.iteration,
            errors = state.error_count,
            partial_results = state.partial_results.len(),
            "iteration budget exhausted"
        );
        sink.emit(TaskEvent::error(
            ErrorCode::MaxIterationsReached,
            format!("Reached the maximum of {max} iterations without a final answer"),
        ))
        .await?;
        if !state.partial_results.is_empty() {
            sink.emit(TaskEvent::message(synthesize(
                &state.partial_results,
                state.error_count,
            )))
            .await?;
        }
        Ok(TaskState::Failed)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::llm::{MockLlmClient, MockStep};
    use crate::tools::{EchoTool, ToolExecutor, ToolRegistry};
    use async_trait::async_trait;
    use futures_util::StreamExt;
    use serde_json::{Map, Value};

    struct PanickingTools;

    #[async_trait]
    impl ToolInvoker for PanickingTools {
        async fn call_tool(
            &self,
            _name: &str,
            _args: Map<String, Value>,
        ) -> Result<CallResult<Value>, AgentError> {
            panic!("sandbox crashed");
        }
    }

    struct RaisingTools;

    #[async_trait]
    impl ToolInvoker for RaisingTools {
        async fn call_tool(
            &self,
            _name: &str,
            _args: Map<String, Value>,
        ) -> Result<CallResult<Value>, AgentError> {
            Err(AgentError::Internal("connection reset".to_string()))
        }
    }

    fn echo_tools() -> Arc<dyn ToolInvoker> {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        Arc::new(ToolExecutor::new(registry, 5))
    }

    fn action(tool: &str) -> MockStep {
        MockStep::Reply(format!(
            r#"{{"is_final": false, "action": "{tool}", "action_input": {{"text": "hello there, world"}}}}"#
        ))
    }

    fn final_answer(text: &str) -> MockStep {
        MockStep::Reply(format!(r#"{{"is_final": true, "final_answer": "{text}"}}"#))
    }

    fn executor(skill: Skill, llm: Arc<MockLlmClient>, tools: Arc<dyn ToolInvoker>) -> AutonomousExecutor {
        AutonomousExecutor::new(skill, llm, tools, &AppConfig::default()).unwrap()
    }

    async fn collect(stream: EventStream) -> Vec<TaskEvent> {
        stream.collect().await
    }

    #[tokio::test]
    async fn test_panic_maps_to_execution_error() {
        let llm = Arc::new(MockLlmClient::with_script([action("echo")]));
        let exec = executor(Skill::new("s", "S", "go"), llm, Arc::new(PanickingTools));
        let events = collect(exec.execute(ExecutionRequest::new("hi"), "t", "s", "x")).await;

        let codes: Vec<_> = events.iter().filter_map(TaskEvent::error_code).collect();
        assert_eq!(codes, vec![ErrorCode::ExecutionError]);
        assert_eq!(events.last(), Some(&TaskEvent::done(TaskState::Failed)));
        assert_eq!(events.iter().filter(|e| e.is_done()).count(), 1);
    }

    #[tokio::test]
    async fn test_raised_model_error_is_execution_error() {
        let llm = Arc::new(MockLlmClient::repeating(MockStep::Raise("socket closed".to_string())));
        let exec = executor(Skill::new("s", "S", "go"), llm.clone(), echo_tools());
        let events = collect(exec.execute(ExecutionRequest::new("hi"), "t", "s", "x")).await;

        assert_eq!(llm.calls(), 1);
        match &events[events.len() - 2] {
            TaskEvent::Error { code, message } => {
                assert_eq!(*code, ErrorCode::ExecutionError);
                assert!(message.contains("socket closed"));
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(events.last(), Some(&TaskEvent::done(TaskState::Failed)));
    }

    struct CancellingLlm;

    #[async_trait]
    impl LlmClient for CancellingLlm {
        async fn call_model(
            &self,
            _conversation: &[crate::memory::Message],
            _system_prompt: &str,
            _model: &str,
            _temperature: f32,
        ) -> Result<CallResult<crate::llm::ModelReply>, AgentError> {
            Err(AgentError::Cancelled)
        }
    }

    #[tokio::test]
    async fn test_collaborator_cancelled_error_still_terminates() {
        let exec = AutonomousExecutor::new(
            Skill::new("s", "S", "go"),
            Arc::new(CancellingLlm),
            echo_tools(),
            &AppConfig::default(),
        )
        .unwrap();
        let events = collect(exec.execute(ExecutionRequest::new("hi"), "t", "s", "x")).await;

        assert_eq!(
            events[events.len() - 2],
            TaskEvent::error(ErrorCode::ExecutionError, "Cancelled")
        );
        assert_eq!(events.last(), Some(&TaskEvent::done(TaskState::Failed)));
        assert_eq!(events.iter().filter(|e| e.is_done()).count(), 1);
    }

    #[tokio::test]
    async fn test_raised_tool_error_is_failure_path() {
        let llm = Arc::new(MockLlmClient::with_script([action("echo"), final_answer("ok")]));
        let exec = executor(Skill::new("s", "S", "go"), llm, Arc::new(RaisingTools));
        let events = collect(exec.execute(ExecutionRequest::new("hi"), "t", "s", "x")).await;

        assert!(events.iter().any(|e| matches!(
            e,
            TaskEvent::Message { text, .. } if text.contains("Tool 'echo' failed: Internal error: connection reset. Retry attempt 1/3")
        )));
        assert_eq!(events.last(), Some(&TaskEvent::done(TaskState::Completed)));
    }

    #[tokio::test]
    async fn test_llm_failure_without_recovery_stops() {
        let llm = Arc::new(MockLlmClient::repeating(MockStep::Fail("rate limited".to_string())));
        let skill = Skill::new("s", "S", "go").with_execution(crate::config::ExecutionOverrides {
            enable_error_recovery: Some(false),
            ..Default::default()
        });
        let exec = executor(skill, llm.clone(), echo_tools());
        let events = collect(exec.execute(ExecutionRequest::new("hi"), "t", "s", "x")).await;

        assert_eq!(llm.calls(), 1);
        let codes: Vec<_> = events.iter().filter_map(TaskEvent::error_code).collect();
        assert_eq!(codes, vec![ErrorCode::LlmCallFailed]);
        assert_eq!(events.last(), Some(&TaskEvent::done(TaskState::Failed)));
    }

    #[tokio::test]
    async fn test_tool_failure_without_recovery_stops() {
        let llm = Arc::new(MockLlmClient::repeating(action("missing_tool")));
        let skill = Skill::new("s", "S", "go").with_execution(crate::config::ExecutionOverrides {
            enable_error_recovery: Some(false),
            ..Default::default()
        });
        let exec = executor(skill, llm.clone(), echo_tools());
        let events = collect(exec.execute(ExecutionRequest::new("hi"), "t", "s", "x")).await;

        assert_eq!(llm.calls(), 1);
        let codes: Vec<_> = events.iter().filter_map(TaskEvent::error_code).collect();
        assert_eq!(codes, vec![ErrorCode::ToolExecutionError]);
        assert_eq!(events.last(), Some(&TaskEvent::done(TaskState::Failed)));
    }

    #[tokio::test]
    async fn test_disallowed_tool_is_not_invoked() {
        let llm = Arc::new(MockLlmClient::with_script([action("echo"), final_answer("ok")]));
        let skill = Skill::new("s", "S", "go").with_allowed_tools(["search"]);
        let exec = executor(skill, llm, Arc::new(PanickingTools));
        let events = collect(exec.execute(ExecutionRequest::new("hi"), "t", "s", "x")).await;

        assert!(events.iter().any(|e| matches!(
            e,
            TaskEvent::Message { text, .. } if text.contains("Tool 'echo' is not allowed for this skill")
        )));
        assert_eq!(events.last(), Some(&TaskEvent::done(TaskState::Completed)));
    }

    #[tokio::test]
    async fn test_conversation_grows_two_per_step() {
        let llm = Arc::new(MockLlmClient::with_script([
            action("echo"),
            MockStep::Reply("not json at all".to_string()),
            action("echo"),
            final_answer("done"),
        ]));
        let exec = executor(Skill::new("s", "S", "go"), llm.clone(), echo_tools());
        let _ = collect(exec.execute(ExecutionRequest::new("hi"), "t", "s", "x")).await;

        assert_eq!(llm.conversation_lengths(), vec![1, 3, 3, 5]);
    }

    #[tokio::test]
    async fn test_dropping_stream_cancels_run() {
        let llm = Arc::new(MockLlmClient::repeating(action("echo")));
        let skill = Skill::new("s", "S", "go").with_execution(crate::config::ExecutionOverrides {
            max_iterations: Some(100),
            ..Default::default()
        });
        let exec = executor(skill, llm.clone(), echo_tools());
        let mut stream = exec.execute(ExecutionRequest::new("hi"), "t", "s", "x");
        let first = stream.next_event().await;
        assert!(matches!(first, Some(TaskEvent::Status { state: TaskState::Working, .. })));
        drop(stream);

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let calls = llm.calls();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(llm.calls(), calls);
        assert!(calls < 100);
    }

    #[tokio::test]
    async fn test_variables_reach_system_prompt() {
        struct CapturingPrompts(std::sync::Mutex<Vec<String>>);

        impl PromptBuilder for CapturingPrompts {
            fn preprocess(&self, instructions: &str, variables: &HashMap<String, String>) -> String {
                crate::prompt::substitute_variables(instructions, variables)
            }

            fn system_prompt(&self, _skill: &Skill, instructions: &str, tools: &[(String, String)]) -> String {
                let names: Vec<&str> = tools.iter().map(|(n, _)| n.as_str()).collect();
                let prompt = format!("{instructions} | {}", names.join(","));
                if let Ok(mut seen) = self.0.lock() {
                    seen.push(prompt.clone());
                }
                prompt
            }
        }

        let prompts = Arc::new(CapturingPrompts(std::sync::Mutex::new(Vec::new())));
        let llm = Arc::new(MockLlmClient::with_script([final_answer("ok")]));
        let skill = Skill::new("s", "S", "Read {{path}} for task {{task_id}}").with_allowed_tools(["echo"]);
        let exec = executor(skill, llm, echo_tools()).with_prompt_builder(prompts.clone());
        let request = ExecutionRequest::new("hi").with_variable("path", "notes.md");
        let _ = collect(exec.execute(request, "task-9", "s", "x")).await;

        let seen = prompts.0.lock().unwrap().clone();
        assert_eq!(seen, vec!["Read notes.md for task task-9 | echo".to_string()]);
    }

    #[test]
    fn test_model_resolution_uses_request_override() {
        let llm = Arc::new(MockLlmClient::new());
        let exec = executor(Skill::new("s", "S", "go").with_model("opus"), llm, echo_tools());
        assert_eq!(exec.resolve_model(None), "claude-opus-4-1");
        assert_eq!(exec.resolve_model(Some("mini")), "gpt-4o-mini");
    }
}
