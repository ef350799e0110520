//! In-memory TaskStore（テスト・開発用）

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::warn;

use crate::domain::{KaizenError, NewTask, Task, TaskId, TaskStatus};
use crate::observability::TaskCounts;
use crate::ports::{Clock, SystemClock, TaskStore};

/// In-memory store state.
struct InMemoryStoreState {
    /// All tasks, keyed (and therefore ordered) by id.
    tasks: BTreeMap<TaskId, Task>,

    /// Next task ID to assign.
    next_task_id: i64,
}

impl InMemoryStoreState {
    fn new() -> Self {
        Self {
            tasks: BTreeMap::new(),
            next_task_id: 1,
        }
    }

    fn allocate_task_id(&mut self) -> TaskId {
        let id = TaskId::new(self.next_task_id);
        self.next_task_id += 1;
        id
    }

    fn has_processing(&self) -> bool {
        self.tasks
            .values()
            .any(|t| t.status == TaskStatus::Processing)
    }

    /// 最古の pending（created_at, id の順）
    fn oldest_pending(&self) -> Option<TaskId> {
        self.tasks
            .values()
            .filter(|t| t.status == TaskStatus::Pending)
            .min_by_key(|t| (t.created_at, t.id))
            .map(|t| t.id)
    }

    /// processing → `to`。適用できなければ false。
    fn finish(&mut self, id: TaskId, to: TaskStatus, payload: &str, now: chrono::DateTime<chrono::Utc>) -> bool {
        let Some(task) = self.tasks.get_mut(&id) else {
            warn!(task_id = %id, to = %to, "finish ignored: task not found");
            return false;
        };
        if !task.status.can_transition_to(to) {
            warn!(task_id = %id, from = %task.status, to = %to, "finish ignored: invalid transition");
            return false;
        }
        task.status = to;
        task.result = Some(payload.to_string());
        task.updated_at = now;
        true
    }
}

/// In-memory TaskStore.
pub struct InMemoryTaskStore {
    state: Arc<Mutex<InMemoryStoreState>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(InMemoryStoreState::new())),
            clock,
        }
    }
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn add_task(&self, new: NewTask) -> Result<TaskId, KaizenError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let id = state.allocate_task_id();
        let task = Task {
            id,
            title: new.title,
            description: new.description,
            source: new.source,
            status: TaskStatus::Pending,
            result: None,
            created_at: now,
            updated_at: now,
        };
        state.tasks.insert(id, task);
        Ok(id)
    }

    async fn get_next_pending_task(&self) -> Result<Option<Task>, KaizenError> {
        let now = self.clock.now();
        // ロックの中で select と flip を完結させる
        let mut state = self.state.lock().await;
        if state.has_processing() {
            return Ok(None);
        }
        let Some(id) = state.oldest_pending() else {
            return Ok(None);
        };
        let Some(task) = state.tasks.get_mut(&id) else {
            return Ok(None);
        };
        task.status = TaskStatus::Processing;
        task.updated_at = now;
        Ok(Some(task.clone()))
    }

    async fn complete_task(&self, id: TaskId, result: &str) -> Result<bool, KaizenError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        Ok(state.finish(id, TaskStatus::Completed, result, now))
    }

    async fn fail_task(&self, id: TaskId, error: &str) -> Result<bool, KaizenError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        Ok(state.finish(id, TaskStatus::Failed, error, now))
    }

    async fn recover_interrupted(&self, reason: &str) -> Result<u64, KaizenError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let mut recovered = 0;
        for task in state.tasks.values_mut() {
            if task.status == TaskStatus::Processing {
                task.status = TaskStatus::Failed;
                task.result = Some(reason.to_string());
                task.updated_at = now;
                recovered += 1;
            }
        }
        Ok(recovered)
    }

    async fn get_task(&self, id: TaskId) -> Result<Option<Task>, KaizenError> {
        let state = self.state.lock().await;
        Ok(state.tasks.get(&id).cloned())
    }

    async fn list_tasks(&self, limit: usize) -> Result<Vec<Task>, KaizenError> {
        let state = self.state.lock().await;
        Ok(state.tasks.values().rev().take(limit).cloned().collect())
    }

    async fn counts_by_status(&self) -> Result<TaskCounts, KaizenError> {
        let state = self.state.lock().await;
        let mut counts = TaskCounts::default();
        for task in state.tasks.values() {
            counts.add(task.status, 1);
        }
        Ok(counts)
    }
}
