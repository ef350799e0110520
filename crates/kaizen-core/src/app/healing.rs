//! SelfHealingCycle - analyze → fix → validate → rollback
//!
//! 1. `analyze()`。score 100 なら終了（healthy）
//! 2. `Remediation::execute()`。変更なしなら終了
//! 3. `TestSuite::execute()`
//!    - failure  → rollback + critical イベント
//!    - no_tests → 修正を保持（要レビューの警告）
//!    - success  → 修正を保持
//!
//! タスクなしでツリーを書き換える唯一の経路です。
//! fix / validate / rollback は WorkspaceLock を保持したまま行います。

use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use crate::domain::{
    CycleId, CycleReport, HealingEvent, HealingEventKind, ValidationOutcome, ValidationResult,
};
use crate::ports::{
    Clock, EventSink, HealthCheck, IdGenerator, Remediation, TestSuite, WorkspaceLock,
};

pub struct SelfHealingCycle {
    health: Arc<dyn HealthCheck>,
    remediation: Arc<dyn Remediation>,
    tests: Arc<dyn TestSuite>,
    events: Arc<dyn EventSink>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    lock: WorkspaceLock,
}

impl SelfHealingCycle {
    pub fn new(
        health: Arc<dyn HealthCheck>,
        remediation: Arc<dyn Remediation>,
        tests: Arc<dyn TestSuite>,
        events: Arc<dyn EventSink>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            health,
            remediation,
            tests,
            events,
            ids,
            clock,
            lock: WorkspaceLock::new(),
        }
    }

    /// Dispatcher の publish と共有するロック
    pub fn with_lock(mut self, lock: WorkspaceLock) -> Self {
        self.lock = lock;
        self
    }

    async fn emit(&self, cycle_id: CycleId, kind: HealingEventKind, score: u8, detail: String) {
        let event = HealingEvent {
            cycle_id,
            kind,
            score,
            detail,
            timestamp: self.clock.now(),
        };
        if let Err(e) = self.events.emit(&event).await {
            warn!(%cycle_id, error = %e, "failed to record self-healing event");
        }
    }

    /// ロールバックして、成功したかを返す
    async fn rollback(&self, cycle_id: CycleId, score: u8, kind: HealingEventKind, detail: String) -> bool {
        match self.remediation.rollback().await {
            Ok(()) => {
                self.emit(cycle_id, kind, score, detail).await;
                true
            }
            Err(e) => {
                error!(%cycle_id, error = %e, "rollback failed, workspace may be inconsistent");
                self.emit(
                    cycle_id,
                    HealingEventKind::RollbackFailed,
                    score,
                    format!("{detail}; rollback failed: {e}"),
                )
                .await;
                false
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn run(&self) -> CycleReport {
        let cycle_id = self.ids.generate_cycle_id();
        let report = self.health.analyze().await;
        let score = report.score;
        if report.is_healthy() {
            info!(%cycle_id, "workspace healthy, nothing to do");
            return CycleReport::Healthy { cycle_id, report };
        }

        let _guard = self.lock.acquire().await;

        let fix = match self.remediation.execute().await {
            Ok(fix) => fix,
            Err(e) => {
                warn!(%cycle_id, error = %e, "remediation failed, rolling back");
                let restored = self
                    .rollback(
                        cycle_id,
                        score,
                        HealingEventKind::RemediationFailed,
                        format!("remediation failed: {e}"),
                    )
                    .await;
                return CycleReport::RolledBack {
                    cycle_id,
                    report,
                    validation: None,
                    restored,
                };
            }
        };
        if !fix.changes_made {
            info!(%cycle_id, score, skipped = ?fix.skipped, "no automatic fixes available");
            return CycleReport::NothingToFix {
                cycle_id,
                report,
                fix,
            };
        }

        let validation = self.tests.execute().await;
        match validation.outcome {
            ValidationOutcome::Failure => {
                warn!(%cycle_id, fixes = fix.fixes, "validation failed, rolling back fixes");
                let restored = self
                    .rollback(
                        cycle_id,
                        score,
                        HealingEventKind::RolledBack,
                        failure_detail(&validation),
                    )
                    .await;
                CycleReport::RolledBack {
                    cycle_id,
                    report,
                    validation: Some(validation),
                    restored,
                }
            }
            ValidationOutcome::NoTests => {
                warn!(%cycle_id, fixes = fix.fixes, "no tests found, keeping fixes; manual review recommended");
                self.emit(
                    cycle_id,
                    HealingEventKind::FixesKeptUntested,
                    score,
                    format!("{} fixes kept without tests", fix.fixes),
                )
                .await;
                CycleReport::FixesKept {
                    cycle_id,
                    report,
                    fix,
                    validation,
                }
            }
            ValidationOutcome::Success => {
                info!(%cycle_id, fixes = fix.fixes, "fixes validated");
                self.emit(
                    cycle_id,
                    HealingEventKind::FixesKept,
                    score,
                    format!("{} fixes validated", fix.fixes),
                )
                .await;
                CycleReport::FixesKept {
                    cycle_id,
                    report,
                    fix,
                    validation,
                }
            }
        }
    }
}

fn failure_detail(validation: &ValidationResult) -> String {
    match validation.summary {
        Some(s) => format!(
            "validation failed: {} failures, {} errors of {} tests",
            s.failures, s.errors, s.tests
        ),
        None => "validation failed: no usable test report".to_string(),
    }
}
