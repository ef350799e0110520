//! Orchestrator - タスク処理と self-healing サイクルのメインループ
//!
//! 1 サイクル = pending タスク 1 件の処理 + health サイクル 1 回。
//!
//! # タスク処理
//! 1. `get_next_pending_task()`（processing へ遷移済みで返る）
//! 2. Dispatcher で実行（executor のエラーはここで受け止める）
//! 3. MemoryLedger に記録（ledger の失敗でタスクの結果は変えない）
//! 4. 成功 → `complete_task(Outcome JSON)`、失敗 → `fail_task(理由)`
//!
//! 4 がストア障害で失敗した場合は 1 回だけ再試行し、それでも駄目なら
//! 保留して次の `process_next_task` の最初に適用し直す。
//! processing のまま放置すると single-flight でキューが止まるため。
//!
//! # ループ
//! tokio interval + watch による協調的シャットダウン。
//! 実行中のステップは最後まで終わらせてから抜ける。
//! インフラ系エラー（ストア障害）が続く間は RetryPolicy でバックオフする。

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, instrument, warn};

use crate::domain::{Capability, CycleReport, ErrorKind, KaizenError, TaskId, classify};
use crate::ports::TaskStore;

use super::dispatcher::Dispatcher;
use super::healing::SelfHealingCycle;
use super::ledger::{MemoryLedger, TaskRecord};
use super::retry::RetryPolicy;

/// 起動時に残っていた processing タスクに付ける理由
pub const INTERRUPTED_REASON: &str = "interrupted: process stopped while the task was processing";

/// unroutable タスクの失敗理由
pub const UNROUTABLE_REASON: &str = "unroutable";

#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub poll_interval: Duration,
    pub health_interval: Duration,
    pub retry: RetryPolicy,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            health_interval: Duration::from_secs(300),
            retry: RetryPolicy::default(),
        }
    }
}

/// 1 タスクの処理結果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskReport {
    pub task_id: TaskId,
    pub title: String,
    pub capability: Option<Capability>,
    pub success: bool,
    pub duration: Duration,
    /// 成功時は Outcome JSON、失敗時は理由
    pub detail: String,
}

/// `run_cycle` の結果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleSummary {
    pub task: Option<TaskReport>,
    pub healing: Option<CycleReport>,
}

/// processing からの終端遷移
#[derive(Debug, Clone)]
struct Settlement {
    id: TaskId,
    success: bool,
    detail: String,
}

pub struct Orchestrator {
    store: Arc<dyn TaskStore>,
    dispatcher: Dispatcher,
    ledger: Arc<MemoryLedger>,
    healing: Option<SelfHealingCycle>,
    settings: RuntimeSettings,
    stranded: Mutex<Option<Settlement>>,
}

impl Orchestrator {
    pub(crate) fn new(
        store: Arc<dyn TaskStore>,
        dispatcher: Dispatcher,
        ledger: Arc<MemoryLedger>,
        healing: Option<SelfHealingCycle>,
        settings: RuntimeSettings,
    ) -> Self {
        Self {
            store,
            dispatcher,
            ledger,
            healing,
            settings,
            stranded: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    pub fn ledger(&self) -> &Arc<MemoryLedger> {
        &self.ledger
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    /// 前回のプロセスが残した processing を failed にする（single-flight の詰まり防止）
    pub async fn recover_interrupted(&self) -> Result<u64, KaizenError> {
        let recovered = self.store.recover_interrupted(INTERRUPTED_REASON).await?;
        if recovered > 0 {
            warn!(recovered, "failed tasks left processing by a previous run");
        }
        Ok(recovered)
    }

    /// pending を 1 件処理する。無ければ `None`。
    #[instrument(skip(self))]
    pub async fn process_next_task(&self) -> Result<Option<TaskReport>, KaizenError> {
        self.settle_stranded().await?;

        let Some(task) = self.store.get_next_pending_task().await? else {
            return Ok(None);
        };
        let started = Instant::now();
        let capability = classify(&task.title);
        info!(task_id = %task.id, title = %task.title, "processing task");

        let result = self.dispatcher.dispatch(&task).await;
        let duration = started.elapsed();

        let (success, detail) = match result {
            Ok(outcome) if outcome.is_success() => match serde_json::to_string(&outcome) {
                Ok(payload) => (true, payload),
                Err(e) => (false, format!("outcome could not be serialized: {e}")),
            },
            Ok(outcome) => (
                false,
                outcome
                    .reason
                    .unwrap_or_else(|| "executor reported failure".to_string()),
            ),
            Err(KaizenError::Unroutable(_)) => (false, UNROUTABLE_REASON.to_string()),
            Err(e) => (false, e.to_string()),
        };

        let record = TaskRecord {
            title: &task.title,
            success,
            duration,
            detail: &detail,
        };
        if let Err(e) = self.ledger.record_task(record).await {
            error!(task_id = %task.id, error = %e, "failed to update memory ledger");
        }

        let settlement = Settlement {
            id: task.id,
            success,
            detail,
        };
        if let Err(e) = self.settle_with_retry(&settlement).await {
            error!(task_id = %task.id, error = %e, "task left processing, will retry on next poll");
            *self.stranded.lock().await = Some(settlement);
            return Err(e);
        }
        if success {
            info!(task_id = %task.id, ?duration, "task completed");
        } else {
            warn!(task_id = %task.id, reason = %settlement.detail, "task failed");
        }

        Ok(Some(TaskReport {
            task_id: task.id,
            title: task.title,
            capability,
            success,
            duration,
            detail: settlement.detail,
        }))
    }

    async fn settle(&self, settlement: &Settlement) -> Result<(), KaizenError> {
        let applied = if settlement.success {
            self.store
                .complete_task(settlement.id, &settlement.detail)
                .await?
        } else {
            self.store.fail_task(settlement.id, &settlement.detail).await?
        };
        if !applied {
            warn!(task_id = %settlement.id, "task was no longer processing");
        }
        Ok(())
    }

    async fn settle_with_retry(&self, settlement: &Settlement) -> Result<(), KaizenError> {
        match self.settle(settlement).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(task_id = %settlement.id, error = %e, "terminal transition failed, retrying once");
                self.settle(settlement).await
            }
        }
    }

    /// 前回適用できなかった終端遷移を先に片付ける
    async fn settle_stranded(&self) -> Result<(), KaizenError> {
        let mut stranded = self.stranded.lock().await;
        if let Some(settlement) = stranded.as_ref() {
            self.settle(settlement).await?;
            info!(task_id = %settlement.id, success = settlement.success, "stranded task settled");
            *stranded = None;
        }
        Ok(())
    }

    /// health サイクルを 1 回。未設定なら `None`。
    pub async fn run_health_cycle(&self) -> Option<CycleReport> {
        match &self.healing {
            Some(cycle) => Some(cycle.run().await),
            None => None,
        }
    }

    /// タスク 1 件 + health サイクル 1 回
    pub async fn run_cycle(&self) -> Result<CycleSummary, KaizenError> {
        let task = self.process_next_task().await?;
        let healing = self.run_health_cycle().await;
        Ok(CycleSummary { task, healing })
    }

    /// シャットダウンが要求されるまでループする
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), KaizenError> {
        self.recover_interrupted().await?;

        let mut task_tick = tokio::time::interval(self.settings.poll_interval);
        task_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut health_tick = tokio::time::interval(self.settings.health_interval);
        health_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut failures: u32 = 0;
        info!(
            poll_interval = ?self.settings.poll_interval,
            health_interval = ?self.settings.health_interval,
            "orchestrator started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        // sender が drop された
                        break;
                    }
                    continue;
                }
                _ = task_tick.tick() => {
                    match self.drain_queue(&shutdown).await {
                        Ok(processed) => {
                            if processed > 0 {
                                info!(processed, "queue drained");
                            }
                            failures = 0;
                        }
                        Err(e) if e.kind() == ErrorKind::Infrastructure => {
                            failures = failures.saturating_add(1);
                            let delay = self.settings.retry.next_delay(failures);
                            error!(error = %e, failures, ?delay, "infrastructure error, backing off");
                            tokio::select! {
                                _ = tokio::time::sleep(delay) => {}
                                _ = shutdown.changed() => {}
                            }
                        }
                        Err(e) => {
                            error!(error = %e, "cycle failed");
                        }
                    }
                }
                _ = health_tick.tick() => {
                    if let Some(report) = self.run_health_cycle().await {
                        info!(cycle_id = %report.cycle_id(), score = report.score(), "health cycle finished");
                    }
                }
            }
        }

        info!("orchestrator stopped");
        Ok(())
    }

    /// 空になるかシャットダウンが来るまでタスクを処理する
    async fn drain_queue(&self, shutdown: &watch::Receiver<bool>) -> Result<usize, KaizenError> {
        let mut processed = 0;
        while !*shutdown.borrow() {
            if self.process_next_task().await?.is_none() {
                break;
            }
            processed += 1;
        }
        Ok(processed)
    }
}
