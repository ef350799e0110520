//! LinterHealthMonitor - 静的解析ツールの JSON 出力から HealthReport を作る
//!
//! 想定する出力は ruff の `--output-format json` 形式：
//! ```json
//! [{"code": "F401", "filename": "a.py", "location": {"row": 1, "column": 8}, ...}]
//! ```
//! severity は明示フィールド（`severity` / `type`）があればそれを使い、
//! 無ければ code のプレフィックスで決める（E/F と code なし = error）。

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use crate::domain::{HealthReport, Issue, Severity};
use crate::ports::{CommandError, CommandRunner, CommandSpec, HealthCheck};

#[derive(Debug, Deserialize)]
struct RawLocation {
    row: u64,
    column: u64,
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    code: Option<String>,
    #[serde(alias = "file")]
    filename: Option<String>,
    location: Option<RawLocation>,
    #[serde(alias = "type")]
    severity: Option<String>,
}

impl RawIssue {
    fn into_issue(self) -> Issue {
        let severity = classify_severity(self.severity.as_deref(), self.code.as_deref());
        Issue {
            code: self.code.unwrap_or_else(|| "syntax-error".to_string()),
            file: self.filename.unwrap_or_default(),
            location: self
                .location
                .map(|l| format!("{}:{}", l.row, l.column))
                .unwrap_or_default(),
            severity,
        }
    }
}

fn classify_severity(explicit: Option<&str>, code: Option<&str>) -> Severity {
    if let Some(explicit) = explicit {
        return match explicit.to_ascii_lowercase().as_str() {
            "error" | "fatal" => Severity::Error,
            _ => Severity::Warning,
        };
    }
    match code {
        None => Severity::Error,
        Some(code) if code.starts_with('E') || code.starts_with('F') => Severity::Error,
        Some(_) => Severity::Warning,
    }
}

/// Parse the tool's stdout. 空の出力は「指摘なし」。
pub fn parse_report(stdout: &str) -> HealthReport {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return HealthReport::from_issues(Vec::new());
    }
    match serde_json::from_str::<Vec<RawIssue>>(trimmed) {
        Ok(raw) => HealthReport::from_issues(raw.into_iter().map(RawIssue::into_issue).collect()),
        Err(e) => HealthReport::parse_error(format!("unparsable analysis output: {e}")),
    }
}

pub struct LinterHealthMonitor {
    runner: Arc<dyn CommandRunner>,
    command: CommandSpec,
}

impl LinterHealthMonitor {
    pub fn new(runner: Arc<dyn CommandRunner>, command: CommandSpec) -> Self {
        Self { runner, command }
    }
}

#[async_trait]
impl HealthCheck for LinterHealthMonitor {
    async fn analyze(&self) -> HealthReport {
        let output = match self.runner.run(&self.command).await {
            Ok(output) => output,
            Err(CommandError::NotFound(program)) => {
                warn!(program, "analysis tool not installed, assuming healthy");
                return HealthReport::tool_unavailable(format!("{program} not found"));
            }
            Err(e) => {
                warn!(error = %e, "analysis tool unavailable, assuming healthy");
                return HealthReport::tool_unavailable(e.to_string());
            }
        };

        // 指摘があると非 0 で終わるツールが多いので、終了コードではなく出力で判断する
        if output.stdout.trim().is_empty() && !output.success() {
            return HealthReport::parse_error(format!(
                "analysis exited with {:?} without output: {}",
                output.code,
                output.stderr.trim()
            ));
        }

        let report = parse_report(&output.stdout);
        info!(
            score = report.score,
            errors = report.error_count(),
            warnings = report.warning_count(),
            "health analyzed"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::HealthStatus;
    use crate::ports::CommandOutput;
    use crate::testing::FakeCommandRunner;
    use rstest::rstest;
    use std::time::Duration;

    const RUFF_OUTPUT: &str = r#"[
        {"code": "F401", "filename": "src/a.py", "location": {"row": 1, "column": 8}, "message": "unused import"},
        {"code": "E501", "filename": "src/a.py", "location": {"row": 3, "column": 89}, "message": "line too long"},
        {"code": "W291", "filename": "src/b.py", "location": {"row": 2, "column": 5}, "message": "trailing whitespace"},
        {"code": null, "filename": "src/c.py", "location": {"row": 1, "column": 1}, "message": "SyntaxError"}
    ]"#;

    fn monitor(runner: FakeCommandRunner) -> LinterHealthMonitor {
        LinterHealthMonitor::new(
            Arc::new(runner),
            CommandSpec::new("ruff", Duration::from_secs(5)).args(["check", "--output-format", "json"]),
        )
    }

    #[rstest]
    #[case(None, Some("F401"), Severity::Error)]
    #[case(None, Some("E501"), Severity::Error)]
    #[case(None, Some("W291"), Severity::Warning)]
    #[case(None, Some("I001"), Severity::Warning)]
    #[case(None, None, Severity::Error)]
    #[case(Some("warning"), Some("F401"), Severity::Warning)]
    #[case(Some("Error"), Some("W291"), Severity::Error)]
    fn severity_rules(
        #[case] explicit: Option<&str>,
        #[case] code: Option<&str>,
        #[case] expected: Severity,
    ) {
        assert_eq!(classify_severity(explicit, code), expected);
    }

    #[test]
    fn parses_ruff_json() {
        let report = parse_report(RUFF_OUTPUT);
        assert_eq!(report.status, HealthStatus::Analyzed);
        assert_eq!(report.error_count(), 3);
        assert_eq!(report.warning_count(), 1);
        assert_eq!(report.score, 100 - 15 - 2);
        assert_eq!(report.issues[0].location, "1:8");
        assert_eq!(report.issues[3].code, "syntax-error");
    }

    #[test]
    fn empty_output_is_healthy() {
        assert!(parse_report("").is_healthy());
        assert!(parse_report("[]").is_healthy());
    }

    #[tokio::test]
    async fn missing_tool_is_neutral() {
        let runner = FakeCommandRunner::new().on_program("ruff", Err(CommandError::NotFound("ruff".into())));
        let report = monitor(runner).analyze().await;
        assert_eq!(report.score, 100);
        assert!(matches!(report.status, HealthStatus::ToolUnavailable(_)));
    }

    #[tokio::test]
    async fn malformed_output_scores_zero() {
        let runner = FakeCommandRunner::new().on_program(
            "ruff",
            Ok(CommandOutput {
                code: Some(1),
                stdout: "not json".into(),
                stderr: String::new(),
            }),
        );
        let report = monitor(runner).analyze().await;
        assert_eq!(report.score, 0);
        assert!(matches!(report.status, HealthStatus::ParseError(_)));
    }

    #[tokio::test]
    async fn findings_with_nonzero_exit_are_analyzed() {
        let runner = FakeCommandRunner::new().on_program(
            "ruff",
            Ok(CommandOutput {
                code: Some(1),
                stdout: RUFF_OUTPUT.into(),
                stderr: String::new(),
            }),
        );
        let report = monitor(runner).analyze().await;
        assert_eq!(report.score, 83);
    }
}
