//! Healing ports - analyze / fix / validate をそれぞれ 1 trait に
//!
//! 継承チェーンは持たず、SelfHealingCycle が 3 つを組み合わせます。

use async_trait::async_trait;

use crate::domain::{FixReport, HealthReport, KaizenError, ValidationResult};

/// 静的解析で健全性を測る。ツールの不在・出力破損も report で表現し、エラーにしない。
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn analyze(&self) -> HealthReport;
}

/// 自動修正とロールバック
#[async_trait]
pub trait Remediation: Send + Sync {
    async fn execute(&self) -> Result<FixReport, KaizenError>;

    /// 最後のコミット状態に戻す。冪等。
    async fn rollback(&self) -> Result<(), KaizenError>;
}

/// テストスイートで修正を検証する
#[async_trait]
pub trait TestSuite: Send + Sync {
    async fn execute(&self) -> ValidationResult;
}
