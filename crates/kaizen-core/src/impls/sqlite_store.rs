//! SQLite TaskStore（sqlx）
//!
//! スキーマ：
//! ```text
//! tasks(id PK, title, description, source DEFAULT 'system',
//!       status DEFAULT 'pending', result, created_at, updated_at)
//! ```
//!
//! 時刻は RFC3339（マイクロ秒・`Z` 固定）の TEXT で保存するので、
//! 文字列比較がそのまま時刻順になります。

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use tracing::{debug, instrument, warn};

use crate::domain::{KaizenError, NewTask, Task, TaskId, TaskSource, TaskStatus};
use crate::observability::TaskCounts;
use crate::ports::{Clock, SystemClock, TaskStore};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS tasks (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    title       TEXT NOT NULL,
    description TEXT,
    source      TEXT NOT NULL DEFAULT 'system',
    status      TEXT NOT NULL DEFAULT 'pending',
    result      TEXT,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_tasks_status_created ON tasks (status, created_at, id);
"#;

const SELECT_COLUMNS: &str =
    "id, title, description, source, status, result, created_at, updated_at";

fn storage(err: sqlx::Error) -> KaizenError {
    KaizenError::Storage(err.to_string())
}

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, KaizenError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| KaizenError::Storage(format!("invalid timestamp {raw:?}: {e}")))
}

fn task_from_row(row: &SqliteRow) -> Result<Task, KaizenError> {
    let status: String = row.try_get("status").map_err(storage)?;
    let source: String = row.try_get("source").map_err(storage)?;
    let created_at: String = row.try_get("created_at").map_err(storage)?;
    let updated_at: String = row.try_get("updated_at").map_err(storage)?;

    Ok(Task {
        id: TaskId::new(row.try_get("id").map_err(storage)?),
        title: row.try_get("title").map_err(storage)?,
        description: row.try_get("description").map_err(storage)?,
        source: TaskSource::from_str(&source).map_err(KaizenError::Storage)?,
        status: TaskStatus::from_str(&status).map_err(KaizenError::Storage)?,
        result: row.try_get("result").map_err(storage)?,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

/// SQLite-backed TaskStore.
///
/// 接続は 1 本だけ持ちます。書き込みの直列化と、
/// `sqlite::memory:` の DB を接続の寿命に縛るためです。
pub struct SqliteTaskStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SqliteTaskStore {
    /// `sqlite://path/to.db` や `sqlite::memory:` の URL で接続し、スキーマを作る
    pub async fn connect(url: &str) -> Result<Self, KaizenError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(storage)?
            .create_if_missing(true);
        Self::connect_with(options).await
    }

    /// ファイルパスで接続（存在しなければ作成）
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, KaizenError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        Self::connect_with(options).await
    }

    async fn connect_with(options: SqliteConnectOptions) -> Result<Self, KaizenError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(storage)?;
        let store = Self {
            pool,
            clock: Arc::new(SystemClock),
        };
        store.migrate().await?;
        Ok(store)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    async fn migrate(&self) -> Result<(), KaizenError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        debug!("task schema ready");
        Ok(())
    }

    /// processing → `to`。`WHERE status = 'processing'` で不正遷移を弾く。
    async fn finish(&self, id: TaskId, to: TaskStatus, payload: &str) -> Result<bool, KaizenError> {
        let now = format_ts(self.clock.now());
        let result = sqlx::query(
            "UPDATE tasks SET status = ?, result = ?, updated_at = ? \
             WHERE id = ? AND status = 'processing'",
        )
        .bind(to.as_str())
        .bind(payload)
        .bind(&now)
        .bind(id.as_i64())
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        if result.rows_affected() == 0 {
            warn!(task_id = %id, to = %to, "transition not applied: task is not processing");
            return Ok(false);
        }
        Ok(true)
    }
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    #[instrument(skip(self, task), fields(title = %task.title))]
    async fn add_task(&self, task: NewTask) -> Result<TaskId, KaizenError> {
        let now = format_ts(self.clock.now());
        let result = sqlx::query(
            "INSERT INTO tasks (title, description, source, status, created_at, updated_at) \
             VALUES (?, ?, ?, 'pending', ?, ?)",
        )
        .bind(&task.title)
        .bind(task.description.as_deref())
        .bind(task.source.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(TaskId::new(result.last_insert_rowid()))
    }

    async fn get_next_pending_task(&self) -> Result<Option<Task>, KaizenError> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let processing: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE status = 'processing'")
                .fetch_one(&mut *tx)
                .await
                .map_err(storage)?;
        if processing > 0 {
            tx.rollback().await.map_err(storage)?;
            return Ok(None);
        }

        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM tasks WHERE status = 'pending' \
             ORDER BY created_at ASC, id ASC LIMIT 1"
        );
        let Some(row) = sqlx::query(&sql)
            .fetch_optional(&mut *tx)
            .await
            .map_err(storage)?
        else {
            tx.rollback().await.map_err(storage)?;
            return Ok(None);
        };
        let mut task = task_from_row(&row)?;

        let now = self.clock.now();
        let flipped = sqlx::query(
            "UPDATE tasks SET status = 'processing', updated_at = ? \
             WHERE id = ? AND status = 'pending'",
        )
        .bind(format_ts(now))
        .bind(task.id.as_i64())
        .execute(&mut *tx)
        .await
        .map_err(storage)?;
        if flipped.rows_affected() == 0 {
            tx.rollback().await.map_err(storage)?;
            return Ok(None);
        }
        tx.commit().await.map_err(storage)?;

        task.status = TaskStatus::Processing;
        task.updated_at = now;
        Ok(Some(task))
    }

    async fn complete_task(&self, id: TaskId, result: &str) -> Result<bool, KaizenError> {
        self.finish(id, TaskStatus::Completed, result).await
    }

    async fn fail_task(&self, id: TaskId, error: &str) -> Result<bool, KaizenError> {
        self.finish(id, TaskStatus::Failed, error).await
    }

    async fn recover_interrupted(&self, reason: &str) -> Result<u64, KaizenError> {
        let now = format_ts(self.clock.now());
        let result = sqlx::query(
            "UPDATE tasks SET status = 'failed', result = ?, updated_at = ? \
             WHERE status = 'processing'",
        )
        .bind(reason)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(result.rows_affected())
    }

    async fn get_task(&self, id: TaskId) -> Result<Option<Task>, KaizenError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM tasks WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        row.as_ref().map(task_from_row).transpose()
    }

    async fn list_tasks(&self, limit: usize) -> Result<Vec<Task>, KaizenError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM tasks ORDER BY created_at DESC, id DESC LIMIT ?"
        );
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        rows.iter().map(task_from_row).collect()
    }

    async fn counts_by_status(&self) -> Result<TaskCounts, KaizenError> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM tasks GROUP BY status")
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;

        let mut counts = TaskCounts::default();
        for row in rows {
            let status: String = row.try_get("status").map_err(storage)?;
            let n: i64 = row.try_get("n").map_err(storage)?;
            let status = TaskStatus::from_str(&status).map_err(KaizenError::Storage)?;
            counts.add(status, u64::try_from(n).unwrap_or(0));
        }
        Ok(counts)
    }
}
