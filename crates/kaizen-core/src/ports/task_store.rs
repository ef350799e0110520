//! TaskStore port - タスクの正本（source of truth）
//!
//! TaskStore は以下を管理します：
//! - Task の作成と状態遷移（pending → processing → completed/failed）
//! - 単一実行の保証（processing は常に最大 1 件）
//! - 状態の集計（status コマンド用）
//!
//! # 実装
//! - **SqliteTaskStore**: 本番用（sqlx + SQLite）
//! - **InMemoryTaskStore**: テスト・開発用

use async_trait::async_trait;

use crate::domain::{KaizenError, NewTask, Task, TaskId};
use crate::observability::TaskCounts;

/// TaskStore は状態遷移の正本
///
/// # 設計原則
/// - 「最古の pending を選んで processing にする」は同一トランザクション内
/// - processing のタスクがある間は次を返さない（single-flight）
/// - completed / failed は不変。不正な遷移は no-op（`Ok(false)`）で、状態を壊さない
/// - ストレージ障害は `KaizenError::Storage` として呼び出し側に返す（リトライしない）
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// pending のタスクを追加して ID を返す
    async fn add_task(&self, task: NewTask) -> Result<TaskId, KaizenError>;

    /// 最古の pending を processing にして返す。対象なし・実行中ありは `None`。
    async fn get_next_pending_task(&self) -> Result<Option<Task>, KaizenError>;

    /// processing → completed。適用されなかった場合は `Ok(false)`。
    async fn complete_task(&self, id: TaskId, result: &str) -> Result<bool, KaizenError>;

    /// processing → failed。適用されなかった場合は `Ok(false)`。
    async fn fail_task(&self, id: TaskId, error: &str) -> Result<bool, KaizenError>;

    /// 前回のプロセスが残した processing をすべて failed にし、件数を返す
    async fn recover_interrupted(&self, reason: &str) -> Result<u64, KaizenError>;

    async fn get_task(&self, id: TaskId) -> Result<Option<Task>, KaizenError>;

    /// 新しい順に最大 `limit` 件
    async fn list_tasks(&self, limit: usize) -> Result<Vec<Task>, KaizenError>;

    async fn counts_by_status(&self) -> Result<TaskCounts, KaizenError>;
}
