//! OrchestratorBuilder - Orchestrator の構築とワイヤリング
//!
//! # 起動時検証（Fail-fast）
//! - `expect_capabilities()` で必要な capability を宣言
//! - `build()` 時に「期待集合 ⊆ 登録済み集合」をチェック
//! - 不足があれば `BuildError` を返す（タスクを処理し始めてから気付かない）

use std::sync::Arc;
use std::time::Duration;

use crate::domain::Capability;
use crate::ports::{Executor, TaskStore, Workspace, WorkspaceLock};

use super::dispatcher::Dispatcher;
use super::healing::SelfHealingCycle;
use super::ledger::MemoryLedger;
use super::orchestrator::{Orchestrator, RuntimeSettings};
use super::registry::{ExecutorRegistry, RegistryError};

/// executor 1 回あたりの上限（デフォルト）
pub const DEFAULT_EXECUTOR_TIMEOUT: Duration = Duration::from_secs(600);

/// # 使用例
/// ```ignore
/// let orchestrator = OrchestratorBuilder::new(store, ledger)
///     .register(research)?
///     .register(site)?
///     .register(feature)?
///     .expect_capabilities(&Capability::ALL)
///     .workspace(workspace, lock.clone())
///     .healing(cycle)
///     .build()?;
/// ```
pub struct OrchestratorBuilder {
    store: Arc<dyn TaskStore>,
    ledger: Arc<MemoryLedger>,
    registry: ExecutorRegistry,
    expected: Option<Vec<Capability>>,
    workspace: Option<(Arc<dyn Workspace>, WorkspaceLock)>,
    healing: Option<SelfHealingCycle>,
    settings: RuntimeSettings,
    executor_timeout: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing executors: {0:?}. These capabilities were expected but not registered.")]
    MissingExecutors(Vec<Capability>),
}

impl OrchestratorBuilder {
    pub fn new(store: Arc<dyn TaskStore>, ledger: Arc<MemoryLedger>) -> Self {
        Self {
            store,
            ledger,
            registry: ExecutorRegistry::new(),
            expected: None,
            workspace: None,
            healing: None,
            settings: RuntimeSettings::default(),
            executor_timeout: DEFAULT_EXECUTOR_TIMEOUT,
        }
    }

    /// 同じ capability を 2 回登録するとエラー
    pub fn register(mut self, executor: Arc<dyn Executor>) -> Result<Self, RegistryError> {
        self.registry.register(executor)?;
        Ok(self)
    }

    pub fn expect_capabilities(mut self, capabilities: &[Capability]) -> Self {
        self.expected = Some(capabilities.to_vec());
        self
    }

    /// publish 先。同じ lock が self-healing サイクルにも渡される。
    pub fn workspace(mut self, workspace: Arc<dyn Workspace>, lock: WorkspaceLock) -> Self {
        self.workspace = Some((workspace, lock));
        self
    }

    pub fn healing(mut self, cycle: SelfHealingCycle) -> Self {
        self.healing = Some(cycle);
        self
    }

    pub fn settings(mut self, settings: RuntimeSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn executor_timeout(mut self, timeout: Duration) -> Self {
        self.executor_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<Orchestrator, BuildError> {
        if let Some(expected) = &self.expected {
            let registered = self.registry.capabilities();
            let missing: Vec<Capability> = expected
                .iter()
                .filter(|c| !registered.contains(c))
                .copied()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingExecutors(missing));
            }
        }

        let mut dispatcher = Dispatcher::new(self.registry, self.executor_timeout);
        let mut healing = self.healing;
        if let Some((workspace, lock)) = self.workspace {
            healing = healing.map(|cycle| cycle.with_lock(lock.clone()));
            dispatcher = dispatcher.with_workspace(workspace, lock);
        }

        Ok(Orchestrator::new(
            self.store,
            dispatcher,
            self.ledger,
            healing,
            self.settings,
        ))
    }
}
