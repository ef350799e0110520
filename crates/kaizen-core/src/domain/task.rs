//! Task record: one unit of requested work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{TaskId, TaskStatus};

/// Where a task came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TaskSource {
    Operator,
    ChatInterface,
    IssueTracker,
    /// スキーマ上のデフォルト（`source DEFAULT 'system'`）
    #[default]
    #[serde(rename = "system")]
    SystemGenerated,
}

impl TaskSource {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskSource::Operator => "operator",
            TaskSource::ChatInterface => "chat-interface",
            TaskSource::IssueTracker => "issue-tracker",
            TaskSource::SystemGenerated => "system",
        }
    }
}

impl fmt::Display for TaskSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "operator" => Ok(TaskSource::Operator),
            "chat-interface" | "chat" => Ok(TaskSource::ChatInterface),
            "issue-tracker" | "github" => Ok(TaskSource::IssueTracker),
            "system" | "system-generated" => Ok(TaskSource::SystemGenerated),
            other => Err(format!("unknown task source: {other}")),
        }
    }
}

/// Input of `TaskStore::add_task`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub source: TaskSource,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            source: TaskSource::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_source(mut self, source: TaskSource) -> Self {
        self.source = source;
        self
    }
}

/// A task as persisted by the store.
///
/// Design:
/// - ストアが唯一の正本（single source of truth）。
/// - status の遷移はストアの操作経由のみ。ここには遷移メソッドを置かない。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: Option<String>,
    pub source: TaskSource,
    pub status: TaskStatus,
    /// 完了・失敗時に設定される不透明なペイロード
    pub result: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
