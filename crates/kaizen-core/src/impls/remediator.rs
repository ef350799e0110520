//! LintRemediator - lint / format ツールの自動修正モード
//!
//! 修正ステップ（例: `ruff check --fix`, `ruff format`）を順に実行し、
//! ツールが報告した修正・整形件数から `changes_made` を決めます。
//! ロールバックは Workspace::revert に委譲します。

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use tracing::{info, warn};

use crate::domain::{FixReport, KaizenError};
use crate::ports::{CommandError, CommandRunner, CommandSpec, Remediation, Workspace};

/// 「N 件修正」系。1 行につき最初にマッチしたものだけ数える。
static FIXED_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\bfixed\s+(\d+)\b",
        r"(?i)\b(\d+)\s+fixed\b",
        r"(?i)\b(\d+)\s+fix(?:es)?\s+applied\b",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// 「N files reformatted」
static REFORMATTED: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d+)\s+files?\s+reformatted\b").ok());

fn capture_count(re: &Regex, line: &str) -> Option<u64> {
    re.captures(line)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// ツール出力から修正件数を数える
pub fn count_fixes(output: &str) -> u64 {
    output
        .lines()
        .map(|line| {
            let fixed = FIXED_PATTERNS
                .iter()
                .find_map(|re| capture_count(re, line))
                .unwrap_or(0);
            let reformatted = REFORMATTED
                .as_ref()
                .and_then(|re| capture_count(re, line))
                .unwrap_or(0);
            fixed + reformatted
        })
        .sum()
}

pub struct LintRemediator {
    runner: Arc<dyn CommandRunner>,
    steps: Vec<CommandSpec>,
    workspace: Arc<dyn Workspace>,
}

impl LintRemediator {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        steps: Vec<CommandSpec>,
        workspace: Arc<dyn Workspace>,
    ) -> Self {
        Self {
            runner,
            steps,
            workspace,
        }
    }
}

#[async_trait]
impl Remediation for LintRemediator {
    async fn execute(&self) -> Result<FixReport, KaizenError> {
        let mut report = FixReport::default();

        for step in &self.steps {
            let output = match self.runner.run(step).await {
                Ok(output) => output,
                Err(CommandError::NotFound(program)) => {
                    warn!(program, "fix tool not installed, skipping step");
                    report.skipped.push(step.display());
                    continue;
                }
                Err(CommandError::TimedOut(after)) => return Err(KaizenError::Timeout(after)),
                Err(e) => {
                    return Err(KaizenError::Workspace(format!("{}: {e}", step.display())));
                }
            };

            let fixes = count_fixes(&output.combined());
            // 0: 全部直った / 1: 直せない指摘が残った。それ以外はツール自体の異常。
            if !matches!(output.code, Some(0) | Some(1)) && fixes == 0 {
                return Err(KaizenError::Workspace(format!(
                    "{} exited with {:?}: {}",
                    step.display(),
                    output.code,
                    output.stderr.trim()
                )));
            }
            info!(step = %step.display(), fixes, "fix step finished");
            report.fixes += fixes;
        }

        report.changes_made = report.fixes > 0;
        Ok(report)
    }

    async fn rollback(&self) -> Result<(), KaizenError> {
        self.workspace.revert().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::CommandOutput;
    use crate::testing::{FakeCommandRunner, FakeWorkspace};
    use rstest::rstest;
    use std::time::Duration;

    #[rstest]
    #[case("Found 5 errors (3 fixed, 2 remaining).", 3)]
    #[case("Fixed 4 errors:\n- a.py:\n    1 × F401", 4)]
    #[case("2 files reformatted, 7 files left unchanged", 2)]
    #[case("1 file reformatted", 1)]
    #[case("All checks passed!", 0)]
    #[case("7 files left unchanged", 0)]
    #[case("Found 1 error (1 fixed, 0 remaining).\n3 files reformatted", 4)]
    fn counts_reported_fixes(#[case] output: &str, #[case] expected: u64) {
        assert_eq!(count_fixes(output), expected);
    }

    fn out(code: i32, stdout: &str) -> Result<CommandOutput, CommandError> {
        Ok(CommandOutput {
            code: Some(code),
            stdout: stdout.to_string(),
            stderr: String::new(),
        })
    }

    fn steps() -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("ruff", Duration::from_secs(5)).args(["check", "--fix"]),
            CommandSpec::new("ruff-format", Duration::from_secs(5)),
        ]
    }

    #[tokio::test]
    async fn sums_fixes_across_steps() {
        let runner = FakeCommandRunner::new()
            .on_program("ruff", out(1, "Found 3 errors (2 fixed, 1 remaining)."))
            .on_program("ruff-format", out(0, "1 file reformatted"));
        let remediator = LintRemediator::new(Arc::new(runner), steps(), Arc::new(FakeWorkspace::new()));

        let report = remediator.execute().await.unwrap();
        assert!(report.changes_made);
        assert_eq!(report.fixes, 3);
        assert!(report.skipped.is_empty());
    }

    #[tokio::test]
    async fn nothing_to_fix_reports_no_changes() {
        let runner = FakeCommandRunner::new()
            .on_program("ruff", out(0, "All checks passed!"))
            .on_program("ruff-format", out(0, "4 files left unchanged"));
        let remediator = LintRemediator::new(Arc::new(runner), steps(), Arc::new(FakeWorkspace::new()));

        let report = remediator.execute().await.unwrap();
        assert!(!report.changes_made);
    }

    #[tokio::test]
    async fn missing_tool_is_skipped() {
        let runner = FakeCommandRunner::new().on_program("ruff", out(1, "Fixed 2 errors"));
        let remediator = LintRemediator::new(Arc::new(runner), steps(), Arc::new(FakeWorkspace::new()));

        let report = remediator.execute().await.unwrap();
        assert_eq!(report.fixes, 2);
        assert_eq!(report.skipped, vec!["ruff-format".to_string()]);
    }

    #[tokio::test]
    async fn abnormal_exit_is_an_error() {
        let runner = FakeCommandRunner::new().on_program("ruff", out(2, ""));
        let remediator = LintRemediator::new(Arc::new(runner), steps(), Arc::new(FakeWorkspace::new()));
        assert!(remediator.execute().await.is_err());
    }

    #[tokio::test]
    async fn rollback_reverts_workspace() {
        let workspace = Arc::new(FakeWorkspace::new());
        let remediator = LintRemediator::new(
            Arc::new(FakeCommandRunner::new()),
            steps(),
            workspace.clone(),
        );
        remediator.rollback().await.unwrap();
        remediator.rollback().await.unwrap();
        assert_eq!(workspace.revert_calls(), 2);
    }
}
