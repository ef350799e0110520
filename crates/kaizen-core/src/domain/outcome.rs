//! Outcome model: common result format for executor runs.
//!
//! Orchestrator は Outcome を JSON にして `tasks.result` に保存します。
//! 中身はストアから見れば不透明です。

use serde::{Deserialize, Serialize};

use super::{Capability, PublishStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeKind {
    Success,
    Failure,
}

/// A reference to something produced during execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum Artifact {
    /// Path to a file produced.
    FilePath(String),

    /// Free-form text (short summaries, diagnostics).
    Text(String),

    /// Arbitrary JSON payload.
    Json(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub kind: OutcomeKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability: Option<Capability>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// site-build / feature-build 成功後の publish 結果
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish: Option<PublishStatus>,
}

impl Outcome {
    pub fn success() -> Self {
        Self {
            kind: OutcomeKind::Success,
            capability: None,
            artifacts: Vec::new(),
            reason: None,
            publish: None,
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            kind: OutcomeKind::Failure,
            capability: None,
            artifacts: Vec::new(),
            reason: Some(reason.into()),
            publish: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.kind == OutcomeKind::Success
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capability = Some(capability);
        self
    }

    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.artifacts.push(artifact);
        self
    }

    pub fn with_publish(mut self, publish: PublishStatus) -> Self {
        self.publish = Some(publish);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_kind_serializes_as_required_names() {
        let s = serde_json::to_string(&OutcomeKind::Success).unwrap();
        assert_eq!(s, "\"SUCCESS\"");
        let s = serde_json::to_string(&OutcomeKind::Failure).unwrap();
        assert_eq!(s, "\"FAILURE\"");
    }

    #[test]
    fn artifact_is_tagged_enum() {
        let a = Artifact::FilePath("site/landing-1.html".to_string());
        let v = serde_json::to_value(&a).unwrap();
        assert_eq!(v["kind"], "FilePath");
        assert_eq!(v["value"], "site/landing-1.html");
    }

    #[test]
    fn publish_status_is_embedded() {
        let o = Outcome::success()
            .with_capability(Capability::SiteBuild)
            .with_publish(PublishStatus::CommittedLocally("remote rejected".into()));
        let v = serde_json::to_value(&o).unwrap();
        assert_eq!(v["capability"], "site-build");
        assert_eq!(v["publish"]["status"], "committed_locally");
        assert!(v.get("reason").is_none());
    }
}
