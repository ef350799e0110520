//! Remediation and cycle results.

use serde::{Deserialize, Serialize};

use super::{CycleId, HealthReport, ValidationResult};

/// Result of one auto-fix run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixReport {
    pub changes_made: bool,
    /// ツールが報告した修正・整形の件数の合計
    pub fixes: u64,
    /// 実行できなかったステップ（ツール未インストールなど）
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,
}

/// Result of publishing task-driven changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum PublishStatus {
    /// 作業ツリーがクリーンだった
    NoChanges,
    Pushed,
    /// push に失敗、ローカルのコミットのみ
    CommittedLocally(String),
    /// stage/commit 自体が失敗
    Failed(String),
}

/// How a health cycle ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CycleReport {
    Healthy {
        cycle_id: CycleId,
        report: HealthReport,
    },
    NothingToFix {
        cycle_id: CycleId,
        report: HealthReport,
        fix: FixReport,
    },
    FixesKept {
        cycle_id: CycleId,
        report: HealthReport,
        fix: FixReport,
        validation: ValidationResult,
    },
    RolledBack {
        cycle_id: CycleId,
        report: HealthReport,
        /// remediation 自体が失敗した場合は None
        validation: Option<ValidationResult>,
        /// ロールバックが成功したか
        restored: bool,
    },
}

impl CycleReport {
    pub fn cycle_id(&self) -> CycleId {
        match self {
            CycleReport::Healthy { cycle_id, .. }
            | CycleReport::NothingToFix { cycle_id, .. }
            | CycleReport::FixesKept { cycle_id, .. }
            | CycleReport::RolledBack { cycle_id, .. } => *cycle_id,
        }
    }

    pub fn score(&self) -> u8 {
        match self {
            CycleReport::Healthy { report, .. }
            | CycleReport::NothingToFix { report, .. }
            | CycleReport::FixesKept { report, .. }
            | CycleReport::RolledBack { report, .. } => report.score,
        }
    }
}
