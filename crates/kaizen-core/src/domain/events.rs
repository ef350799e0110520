//! Events - self-healing サイクルで発生したイベント
//!
//! タスク駆動ではないサイクルの結果は、タスクの失敗としてではなく
//! このイベントとして記録します。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::CycleId;

/// What happened in a health cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealingEventKind {
    /// 検証成功、修正を保持
    FixesKept,
    /// テストなし、修正を保持（要レビュー）
    FixesKeptUntested,
    /// 検証失敗でロールバック
    RolledBack,
    /// 修正ツール自体が失敗したのでロールバック
    RemediationFailed,
    /// ロールバックが失敗した（ワークスペースが不整合の可能性）
    RollbackFailed,
}

impl HealingEventKind {
    /// 運用者の注意が必要なイベントか
    pub fn is_critical(self) -> bool {
        matches!(
            self,
            HealingEventKind::RolledBack
                | HealingEventKind::RemediationFailed
                | HealingEventKind::RollbackFailed
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealingEvent {
    pub cycle_id: CycleId,
    pub kind: HealingEventKind,
    pub score: u8,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
}
