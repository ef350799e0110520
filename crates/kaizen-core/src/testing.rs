//! テスト用の fake 実装（ports ごと）

use std::collections::HashMap;
use std::io;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::domain::{
    Capability, FixReport, HealingEvent, HealthReport, KaizenError, NewTask, Outcome,
    PublishStatus, Task, TaskId, ValidationOutcome, ValidationResult,
};
use crate::impls::InMemoryTaskStore;
use crate::observability::TaskCounts;
use crate::ports::{
    CommandError, CommandOutput, CommandRunner, CommandSpec, EventSink, Executor, GenerationError,
    GenerationService, HealthCheck, PromptContext, Remediation, TaskStore, TestSuite,
    TextGenerator, Workspace,
};

type Responder = Box<dyn Fn(&CommandSpec) -> Result<CommandOutput, CommandError> + Send + Sync>;

/// program 名ごとに応答を決める CommandRunner。登録の無い program は NotFound。
#[derive(Default)]
pub struct FakeCommandRunner {
    responders: HashMap<String, Responder>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl FakeCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// 毎回同じ結果を返す
    pub fn on_program(self, program: &str, result: Result<CommandOutput, CommandError>) -> Self {
        self.on_program_with(program, move |_| copy_result(&result))
    }

    pub fn on_program_with<F>(mut self, program: &str, responder: F) -> Self
    where
        F: Fn(&CommandSpec) -> Result<CommandOutput, CommandError> + Send + Sync + 'static,
    {
        self.responders.insert(program.to_string(), Box::new(responder));
        self
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }
}

fn copy_result(result: &Result<CommandOutput, CommandError>) -> Result<CommandOutput, CommandError> {
    match result {
        Ok(output) => Ok(output.clone()),
        Err(CommandError::NotFound(program)) => Err(CommandError::NotFound(program.clone())),
        Err(CommandError::TimedOut(timeout)) => Err(CommandError::TimedOut(*timeout)),
        Err(CommandError::Io(e)) => Err(CommandError::Io(io::Error::new(e.kind(), e.to_string()))),
    }
}

#[async_trait]
impl CommandRunner for FakeCommandRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        self.calls.lock().unwrap().push(spec.clone());
        match self.responders.get(&spec.program) {
            Some(responder) => responder(spec),
            None => Err(CommandError::NotFound(spec.program.clone())),
        }
    }
}

/// revert / publish の回数を数えるだけのワークスペース
pub struct FakeWorkspace {
    publish_status: PublishStatus,
    reverts: AtomicUsize,
    publishes: AtomicUsize,
}

impl FakeWorkspace {
    pub fn new() -> Self {
        Self {
            publish_status: PublishStatus::NoChanges,
            reverts: AtomicUsize::new(0),
            publishes: AtomicUsize::new(0),
        }
    }

    pub fn publishing(mut self, status: PublishStatus) -> Self {
        self.publish_status = status;
        self
    }

    pub fn revert_calls(&self) -> usize {
        self.reverts.load(Ordering::SeqCst)
    }

    pub fn publish_calls(&self) -> usize {
        self.publishes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Workspace for FakeWorkspace {
    async fn revert(&self) -> Result<(), KaizenError> {
        self.reverts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn is_dirty(&self) -> Result<bool, KaizenError> {
        Ok(false)
    }

    async fn publish(&self, _message: &str) -> PublishStatus {
        self.publishes.fetch_add(1, Ordering::SeqCst);
        self.publish_status.clone()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Text(String),
    RateLimited,
    Failed,
    /// 応答しない（呼び出し側のタイムアウト待ち）
    Hang,
}

/// TextGenerator と GenerationService の両方として使える生成器
pub struct FakeGenerator {
    replies: Vec<Reply>,
    calls: AtomicUsize,
    credentials: Mutex<Vec<String>>,
    prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn always(reply: Reply) -> Self {
        Self::scripted(vec![reply])
    }

    /// 順に返し、最後の応答を繰り返す
    pub fn scripted(replies: Vec<Reply>) -> Self {
        Self {
            replies,
            calls: AtomicUsize::new(0),
            credentials: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn credentials_used(&self) -> Vec<String> {
        self.credentials.lock().unwrap().clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn next(&self, prompt: &str) -> Reply {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        let index = n.min(self.replies.len().saturating_sub(1));
        self.replies.get(index).cloned().unwrap_or(Reply::Failed)
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate(&self, credential: &SecretString, prompt: &str) -> Result<String, GenerationError> {
        self.credentials
            .lock()
            .unwrap()
            .push(credential.expose_secret().to_string());
        match self.next(prompt) {
            Reply::Text(text) => Ok(text),
            Reply::RateLimited => Err(GenerationError::RateLimited("429".into())),
            Reply::Failed => Err(GenerationError::Failed("500".into())),
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Err(GenerationError::Failed("hang".into()))
            }
        }
    }
}

#[async_trait]
impl GenerationService for FakeGenerator {
    async fn generate(&self, prompt: &str) -> Option<String> {
        match self.next(prompt) {
            Reply::Text(text) => Some(text),
            Reply::RateLimited | Reply::Failed | Reply::Hang => None,
        }
    }
}

pub struct StaticContext(pub String);

#[async_trait]
impl PromptContext for StaticContext {
    async fn prompt_context(&self) -> String {
        self.0.clone()
    }
}

#[derive(Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<HealingEvent>>,
}

impl RecordingEventSink {
    pub fn events(&self) -> Vec<HealingEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventSink for RecordingEventSink {
    async fn emit(&self, event: &HealingEvent) -> Result<(), KaizenError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

pub struct FakeHealthCheck {
    report: HealthReport,
    calls: AtomicUsize,
}

impl FakeHealthCheck {
    pub fn new(report: HealthReport) -> Self {
        Self {
            report,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthCheck for FakeHealthCheck {
    async fn analyze(&self) -> HealthReport {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.report.clone()
    }
}

pub struct FakeRemediation {
    result: Result<FixReport, String>,
    rollback_fails: AtomicBool,
    executes: AtomicUsize,
    rollbacks: AtomicUsize,
}

impl FakeRemediation {
    pub fn new(result: Result<FixReport, String>) -> Self {
        Self {
            result,
            rollback_fails: AtomicBool::new(false),
            executes: AtomicUsize::new(0),
            rollbacks: AtomicUsize::new(0),
        }
    }

    pub fn fail_rollback(&self) {
        self.rollback_fails.store(true, Ordering::SeqCst);
    }

    pub fn execute_calls(&self) -> usize {
        self.executes.load(Ordering::SeqCst)
    }

    pub fn rollback_calls(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Remediation for FakeRemediation {
    async fn execute(&self) -> Result<FixReport, KaizenError> {
        self.executes.fetch_add(1, Ordering::SeqCst);
        self.result.clone().map_err(KaizenError::Workspace)
    }

    async fn rollback(&self) -> Result<(), KaizenError> {
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        if self.rollback_fails.load(Ordering::SeqCst) {
            return Err(KaizenError::Workspace("git checkout failed".into()));
        }
        Ok(())
    }
}

pub struct FakeTestSuite {
    outcome: ValidationOutcome,
    calls: AtomicUsize,
}

impl FakeTestSuite {
    pub fn new(outcome: ValidationOutcome) -> Self {
        Self {
            outcome,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TestSuite for FakeTestSuite {
    async fn execute(&self) -> ValidationResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ValidationResult::new(self.outcome, None, String::new())
    }
}

/// 実行したタスクのタイトルを記録する executor
pub struct RecordingExecutor {
    capability: Capability,
    failure: Option<String>,
    delay: Duration,
    executed: Mutex<Vec<String>>,
}

impl RecordingExecutor {
    pub fn succeeding(capability: Capability) -> Self {
        Self {
            capability,
            failure: None,
            delay: Duration::ZERO,
            executed: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(capability: Capability, message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::succeeding(capability)
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Executor for RecordingExecutor {
    fn capability(&self) -> Capability {
        self.capability
    }

    async fn execute(&self, task: &Task) -> Result<Outcome, KaizenError> {
        self.executed.lock().unwrap().push(task.title.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.failure {
            Some(message) => Err(KaizenError::Executor(message.clone())),
            None => Ok(Outcome::success().with_capability(self.capability)),
        }
    }
}

/// 最初の N 回の `complete_task` だけストア障害を返す InMemoryTaskStore
pub struct FlakyTaskStore {
    inner: InMemoryTaskStore,
    completion_failures: AtomicUsize,
}

impl FlakyTaskStore {
    pub fn failing_completions(times: usize) -> Self {
        Self {
            inner: InMemoryTaskStore::new(),
            completion_failures: AtomicUsize::new(times),
        }
    }
}

#[async_trait]
impl TaskStore for FlakyTaskStore {
    async fn add_task(&self, task: NewTask) -> Result<TaskId, KaizenError> {
        self.inner.add_task(task).await
    }

    async fn get_next_pending_task(&self) -> Result<Option<Task>, KaizenError> {
        self.inner.get_next_pending_task().await
    }

    async fn complete_task(&self, id: TaskId, result: &str) -> Result<bool, KaizenError> {
        let failing = self
            .completion_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(KaizenError::Storage("disk I/O error".into()));
        }
        self.inner.complete_task(id, result).await
    }

    async fn fail_task(&self, id: TaskId, error: &str) -> Result<bool, KaizenError> {
        self.inner.fail_task(id, error).await
    }

    async fn recover_interrupted(&self, reason: &str) -> Result<u64, KaizenError> {
        self.inner.recover_interrupted(reason).await
    }

    async fn get_task(&self, id: TaskId) -> Result<Option<Task>, KaizenError> {
        self.inner.get_task(id).await
    }

    async fn list_tasks(&self, limit: usize) -> Result<Vec<Task>, KaizenError> {
        self.inner.list_tasks(limit).await
    }

    async fn counts_by_status(&self) -> Result<TaskCounts, KaizenError> {
        self.inner.counts_by_status().await
    }
}
