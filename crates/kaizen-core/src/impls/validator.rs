//! PytestValidator - テストスイートを実行して ValidationResult に分類
//!
//! 構造化レポートは pytest-json-report 形式（`summary{total, failed, error}`）。
//! 前回のレポートが残っていると誤判定するので、実行前に削除します。
//!
//! 分類：
//! - exit 0 かつレポートあり → Success
//! - exit == no_tests_exit_code → NoTests
//! - それ以外・タイムアウト・レポートなし → Failure（fail closed）

use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use crate::domain::{TestSummary, ValidationOutcome, ValidationResult};
use crate::ports::{CommandError, CommandRunner, CommandSpec, TestSuite};

/// raw_output に残す最大文字数（末尾を残す）
const MAX_RAW_OUTPUT: usize = 4000;

#[derive(Debug, Deserialize)]
struct RawReport {
    summary: RawSummary,
}

#[derive(Debug, Deserialize)]
struct RawSummary {
    total: Option<u64>,
    collected: Option<u64>,
    #[serde(default)]
    failed: u64,
    #[serde(default)]
    error: u64,
}

/// Parse a structured report. 読めなければ None。
pub fn parse_summary(raw: &str) -> Option<TestSummary> {
    let report: RawReport = serde_json::from_str(raw).ok()?;
    let s = report.summary;
    Some(TestSummary {
        tests: s.total.or(s.collected).unwrap_or(0),
        failures: s.failed,
        errors: s.error,
    })
}

fn tail(output: &str) -> String {
    let count = output.chars().count();
    if count <= MAX_RAW_OUTPUT {
        return output.to_string();
    }
    output.chars().skip(count - MAX_RAW_OUTPUT).collect()
}

pub struct PytestValidator {
    runner: Arc<dyn CommandRunner>,
    command: CommandSpec,
    report_path: PathBuf,
    no_tests_exit_code: i32,
}

impl PytestValidator {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        command: CommandSpec,
        report_path: impl Into<PathBuf>,
        no_tests_exit_code: i32,
    ) -> Self {
        Self {
            runner,
            command,
            report_path: report_path.into(),
            no_tests_exit_code,
        }
    }

    async fn remove_stale_report(&self) {
        if let Err(e) = tokio::fs::remove_file(&self.report_path).await
            && e.kind() != IoErrorKind::NotFound
        {
            warn!(path = %self.report_path.display(), error = %e, "could not remove stale test report");
        }
    }

    async fn read_summary(path: &Path) -> Option<TestSummary> {
        let raw = tokio::fs::read_to_string(path).await.ok()?;
        parse_summary(&raw)
    }
}

#[async_trait]
impl TestSuite for PytestValidator {
    async fn execute(&self) -> ValidationResult {
        self.remove_stale_report().await;

        let output = match self.runner.run(&self.command).await {
            Ok(output) => output,
            Err(CommandError::NotFound(program)) => {
                warn!(program, "test runner not installed, treating as no tests");
                return ValidationResult::new(
                    ValidationOutcome::NoTests,
                    None,
                    format!("{program} not found"),
                );
            }
            Err(e) => {
                warn!(error = %e, "test run did not finish");
                return ValidationResult::new(ValidationOutcome::Failure, None, e.to_string());
            }
        };

        let raw_output = tail(&output.combined());
        let summary = Self::read_summary(&self.report_path).await;

        let outcome = match output.code {
            Some(0) if summary.is_some() => ValidationOutcome::Success,
            Some(0) => {
                warn!(path = %self.report_path.display(), "tests passed but report is missing or unparsable");
                ValidationOutcome::Failure
            }
            Some(code) if code == self.no_tests_exit_code => ValidationOutcome::NoTests,
            _ => ValidationOutcome::Failure,
        };

        info!(
            outcome = ?outcome,
            code = ?output.code,
            tests = summary.map(|s| s.tests),
            failures = summary.map(|s| s.failures),
            errors = summary.map(|s| s.errors),
            "validation finished"
        );
        ValidationResult::new(outcome, summary, raw_output)
    }
}
