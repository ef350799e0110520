//! MemoryLedger - 成功・失敗の学びと移動平均メトリクスの永続化
//!
//! - タスク 1 件につき、メトリクスを 1 回更新し、レッスンを 1 件だけ追記する
//! - レッスンは生成サービスで 1 文に要約（失敗したら定型文）
//! - 読み込み時に構造を検証し、壊れていれば `.corrupt-<ts>` に退避して空から始める
//! - 書き込みは一時ファイル + rename（途中で落ちても前の状態が残る）
//! - self-healing イベントも同じドキュメントに追記する（EventSink）

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::{HealingEvent, KaizenError, LessonEntry, MemoryDocument, MetricsSnapshot};
use crate::ports::{Clock, EventSink, GenerationService, PromptContext};

/// レッスンの最大文字数
const MAX_LESSON_CHARS: usize = 300;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ledger serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<LedgerError> for KaizenError {
    fn from(err: LedgerError) -> Self {
        KaizenError::Storage(err.to_string())
    }
}

/// One finished task, as seen by the ledger.
#[derive(Debug, Clone)]
pub struct TaskRecord<'a> {
    pub title: &'a str,
    pub success: bool,
    pub duration: Duration,
    /// 成功時は成果の要約、失敗時はエラー
    pub detail: &'a str,
}

pub struct MemoryLedger {
    path: PathBuf,
    document: Mutex<MemoryDocument>,
    summarizer: Option<Arc<dyn GenerationService>>,
    clock: Arc<dyn Clock>,
    context_size: usize,
}

impl MemoryLedger {
    /// ファイルを読み込む。無ければ空、壊れていれば退避して空。
    pub async fn open(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Result<Self, LedgerError> {
        let path = path.into();
        let document = load(&path, clock.as_ref()).await?;
        Ok(Self {
            path,
            document: Mutex::new(document),
            summarizer: None,
            clock,
            context_size: 5,
        })
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn GenerationService>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    /// プロンプトに載せる直近レッスン数（成功・失敗それぞれ）
    pub fn with_context_size(mut self, context_size: usize) -> Self {
        self.context_size = context_size;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn metrics(&self) -> MetricsSnapshot {
        self.document.lock().await.metrics
    }

    pub async fn snapshot(&self) -> MemoryDocument {
        self.document.lock().await.clone()
    }

    /// メトリクスを更新し、レッスンを 1 件追記して保存
    pub async fn record_task(&self, record: TaskRecord<'_>) -> Result<(), LedgerError> {
        // 生成はロックの外で
        let lesson = self.summarize(&record).await;
        let entry = LessonEntry {
            task_title: record.title.to_string(),
            pattern_or_lesson: lesson,
            timestamp: self.clock.now(),
        };

        let mut document = self.document.lock().await;
        document
            .metrics
            .record(record.success, record.duration.as_secs_f64());
        if record.success {
            document.successful_patterns.push(entry);
        } else {
            document.failed_patterns.push(entry);
        }
        persist(&self.path, &document).await?;
        debug!(
            total_tasks = document.metrics.total_tasks,
            success_count = document.metrics.success_count,
            avg_duration = document.metrics.avg_duration,
            "ledger updated"
        );
        Ok(())
    }

    async fn summarize(&self, record: &TaskRecord<'_>) -> String {
        if let Some(summarizer) = &self.summarizer {
            let prompt = format!(
                "Summarise in one sentence the reusable lesson from this task.\n\
                 Task: {}\nOutcome: {}\nDetail: {}\n",
                record.title,
                if record.success { "success" } else { "failure" },
                record.detail
            );
            if let Some(text) = summarizer.generate(&prompt).await
                && let Some(line) = text.lines().map(str::trim).find(|l| !l.is_empty())
            {
                return truncate(line);
            }
        }
        fallback_lesson(record)
    }
}

fn fallback_lesson(record: &TaskRecord<'_>) -> String {
    let lesson = if record.success {
        format!(
            "'{}' succeeded in {:.1}s: {}",
            record.title,
            record.duration.as_secs_f64(),
            record.detail
        )
    } else {
        format!("'{}' failed: {}", record.title, record.detail)
    };
    truncate(&lesson)
}

fn truncate(text: &str) -> String {
    text.chars().take(MAX_LESSON_CHARS).collect()
}

async fn load(path: &Path, clock: &dyn Clock) -> Result<MemoryDocument, LedgerError> {
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(MemoryDocument::default()),
        Err(e) => return Err(e.into()),
    };

    // 非 UTF-8 も serde_json のエラーになり、壊れたファイルとして扱われる
    let problem = match serde_json::from_slice::<MemoryDocument>(&raw) {
        Ok(document) => match document.validate() {
            Ok(()) => return Ok(document),
            Err(reason) => reason,
        },
        Err(e) => e.to_string(),
    };

    let backup = backup_path(path, clock);
    tokio::fs::rename(path, &backup).await?;
    warn!(
        path = %path.display(),
        backup = %backup.display(),
        problem,
        "memory file is corrupt, starting from an empty ledger"
    );
    Ok(MemoryDocument::default())
}

fn backup_path(path: &Path, clock: &dyn Clock) -> PathBuf {
    let stamp = clock.now().format("%Y%m%dT%H%M%S%.3fZ");
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "memory.json".to_string());
    path.with_file_name(format!("{name}.corrupt-{stamp}"))
}

/// 一時ファイルに書いてから rename
async fn persist(path: &Path, document: &MemoryDocument) -> Result<(), LedgerError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_vec_pretty(document)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "memory.json".to_string());
    let tmp = path.with_file_name(format!(".{name}.tmp"));
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl EventSink for MemoryLedger {
    async fn emit(&self, event: &HealingEvent) -> Result<(), KaizenError> {
        let mut document = self.document.lock().await;
        document.push_healing_event(event.clone());
        persist(&self.path, &document).await?;
        Ok(())
    }
}

#[async_trait]
impl PromptContext for MemoryLedger {
    async fn prompt_context(&self) -> String {
        let document = self.document.lock().await;
        let recent = |entries: &[LessonEntry]| -> Vec<String> {
            entries
                .iter()
                .rev()
                .take(self.context_size)
                .map(|e| format!("- {}", e.pattern_or_lesson))
                .collect()
        };
        let good = recent(&document.successful_patterns);
        let bad = recent(&document.failed_patterns);

        let mut out = String::new();
        if !good.is_empty() {
            out.push_str("What worked:\n");
            out.push_str(&good.join("\n"));
            out.push('\n');
        }
        if !bad.is_empty() {
            out.push_str("What failed:\n");
            out.push_str(&bad.join("\n"));
            out.push('\n');
        }
        out
    }
}
