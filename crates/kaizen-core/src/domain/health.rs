//! Health model: static-analysis findings and the derived score.
//!
//! HealthReport はサイクル内でのみ使われ、永続化されません。

use serde::{Deserialize, Serialize};

/// Score of a tree without findings.
pub const PERFECT_SCORE: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// One finding reported by the analysis tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub code: String,
    pub file: String,
    /// `row:column`
    pub location: String,
    pub severity: Severity,
}

/// How the report was obtained.
///
/// `ToolUnavailable` と `ParseError` は区別する：
/// ツールが無いのは「健全とみなす」、出力が壊れているのは「score 0」。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum HealthStatus {
    Analyzed,
    ToolUnavailable(String),
    ParseError(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub score: u8,
    pub issues: Vec<Issue>,
    pub status: HealthStatus,
}

impl HealthReport {
    /// Build a report from parsed issues, computing the score.
    pub fn from_issues(issues: Vec<Issue>) -> Self {
        let score = health_score(&issues);
        Self {
            score,
            issues,
            status: HealthStatus::Analyzed,
        }
    }

    /// Neutral passing report: absent tooling must never block the loop.
    pub fn tool_unavailable(reason: impl Into<String>) -> Self {
        Self {
            score: PERFECT_SCORE,
            issues: Vec::new(),
            status: HealthStatus::ToolUnavailable(reason.into()),
        }
    }

    pub fn parse_error(reason: impl Into<String>) -> Self {
        Self {
            score: 0,
            issues: Vec::new(),
            status: HealthStatus::ParseError(reason.into()),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.score == PERFECT_SCORE
    }

    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    fn count(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }
}

/// `max(0, 100 - 5*errors - 2*warnings)`
pub fn health_score(issues: &[Issue]) -> u8 {
    let (errors, warnings) = issues.iter().fold((0i64, 0i64), |(e, w), issue| {
        match issue.severity {
            Severity::Error => (e + 1, w),
            Severity::Warning => (e, w + 1),
        }
    });
    let score = (i64::from(PERFECT_SCORE) - 5 * errors - 2 * warnings).max(0);
    u8::try_from(score).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn issues(errors: usize, warnings: usize) -> Vec<Issue> {
        let mk = |severity| Issue {
            code: "X1".into(),
            file: "a.py".into(),
            location: "1:1".into(),
            severity,
        };
        std::iter::repeat_with(|| mk(Severity::Error))
            .take(errors)
            .chain(std::iter::repeat_with(|| mk(Severity::Warning)).take(warnings))
            .collect()
    }

    #[rstest]
    #[case(0, 0, 100)]
    #[case(1, 0, 95)]
    #[case(0, 1, 98)]
    #[case(2, 5, 80)]
    #[case(20, 0, 0)]
    #[case(30, 30, 0)]
    fn score_formula(#[case] errors: usize, #[case] warnings: usize, #[case] expected: u8) {
        let report = HealthReport::from_issues(issues(errors, warnings));
        assert_eq!(report.score, expected);
        assert_eq!(report.error_count(), errors);
        assert_eq!(report.warning_count(), warnings);
    }

    #[test]
    fn missing_tool_is_neutral_and_parse_error_is_zero() {
        let missing = HealthReport::tool_unavailable("ruff not found");
        assert!(missing.is_healthy());
        assert!(matches!(missing.status, HealthStatus::ToolUnavailable(_)));

        let broken = HealthReport::parse_error("expected array");
        assert_eq!(broken.score, 0);
        assert!(matches!(broken.status, HealthStatus::ParseError(_)));
        assert_ne!(missing.status, broken.status);
    }
}
