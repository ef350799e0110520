//! Validation model: test-suite outcome after remediation.

use serde::{Deserialize, Serialize};

/// Classification of a test run.
///
/// `NoTests` は失敗ではなく警告：コードはあるがテストが無い。
/// 修正は残す（前進を優先する方針）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationOutcome {
    Success,
    NoTests,
    Failure,
}

/// Counts taken from the structured report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSummary {
    pub tests: u64,
    pub failures: u64,
    pub errors: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub outcome: ValidationOutcome,
    /// レポートが読めなかった場合は None
    pub summary: Option<TestSummary>,
    /// 診断用の生出力（切り詰め済み）
    pub raw_output: String,
}

impl ValidationResult {
    pub fn new(outcome: ValidationOutcome, summary: Option<TestSummary>, raw_output: String) -> Self {
        Self {
            outcome,
            summary,
            raw_output,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.outcome == ValidationOutcome::Failure
    }
}
