//! Dispatcher - タイトルのプレフィックスで executor を選んで実行
//!
//! ルーティング規則は `domain::route`（最初にマッチしたものが勝ち）。
//! site-build / feature-build が成功したら publish（stage + commit + push）します。
//! publish は例外にならず、結果は Outcome に載るだけです。

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::domain::{Capability, KaizenError, Outcome, PublishStatus, Task, classify};
use crate::ports::{Workspace, WorkspaceLock};

use super::registry::ExecutorRegistry;

pub struct Dispatcher {
    registry: ExecutorRegistry,
    workspace: Option<Arc<dyn Workspace>>,
    lock: WorkspaceLock,
    executor_timeout: Duration,
}

impl Dispatcher {
    pub fn new(registry: ExecutorRegistry, executor_timeout: Duration) -> Self {
        Self {
            registry,
            workspace: None,
            lock: WorkspaceLock::new(),
            executor_timeout,
        }
    }

    /// publish 先のワークスペース。lock は self-healing サイクルと共有する。
    pub fn with_workspace(mut self, workspace: Arc<dyn Workspace>, lock: WorkspaceLock) -> Self {
        self.workspace = Some(workspace);
        self.lock = lock;
        self
    }

    pub fn registry(&self) -> &ExecutorRegistry {
        &self.registry
    }

    /// タイトル → Capability。マッチしなければ Unroutable。
    pub fn route(&self, title: &str) -> Result<Capability, KaizenError> {
        classify(title).ok_or_else(|| KaizenError::Unroutable(title.to_string()))
    }

    #[instrument(skip(self, task), fields(task_id = %task.id))]
    pub async fn dispatch(&self, task: &Task) -> Result<Outcome, KaizenError> {
        let capability = self.route(&task.title)?;
        let executor = self
            .registry
            .get(capability)
            .ok_or(KaizenError::ExecutorNotFound(capability))?;

        info!(%capability, title = %task.title, "dispatching");
        let outcome = tokio::time::timeout(self.executor_timeout, executor.execute(task))
            .await
            .map_err(|_| KaizenError::Timeout(self.executor_timeout))??;

        if !outcome.is_success() || !capability.publishes() {
            return Ok(outcome);
        }
        let Some(workspace) = &self.workspace else {
            return Ok(outcome);
        };

        let status = {
            let _guard = self.lock.acquire().await;
            workspace
                .publish(&format!("kaizen: {} ({})", task.title, task.id))
                .await
        };
        match &status {
            PublishStatus::Failed(reason) => {
                warn!(reason, "publish failed");
            }
            other => info!(status = ?other, "published"),
        }
        Ok(outcome.with_publish(status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TaskId, TaskSource, TaskStatus};
    use crate::testing::{FakeWorkspace, RecordingExecutor};
    use chrono::Utc;

    fn task(title: &str) -> Task {
        let now = Utc::now();
        Task {
            id: TaskId::new(1),
            title: title.to_string(),
            description: None,
            source: TaskSource::Operator,
            status: TaskStatus::Processing,
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    struct Fixture {
        research: Arc<RecordingExecutor>,
        site: Arc<RecordingExecutor>,
        feature: Arc<RecordingExecutor>,
        workspace: Arc<FakeWorkspace>,
        dispatcher: Dispatcher,
    }

    fn fixture() -> Fixture {
        let research = Arc::new(RecordingExecutor::succeeding(Capability::Research));
        let site = Arc::new(RecordingExecutor::succeeding(Capability::SiteBuild));
        let feature = Arc::new(RecordingExecutor::succeeding(Capability::FeatureBuild));
        let mut registry = ExecutorRegistry::new();
        registry.register(research.clone()).unwrap();
        registry.register(site.clone()).unwrap();
        registry.register(feature.clone()).unwrap();

        let workspace = Arc::new(FakeWorkspace::new().publishing(PublishStatus::Pushed));
        let dispatcher = Dispatcher::new(registry, Duration::from_secs(5))
            .with_workspace(workspace.clone(), WorkspaceLock::new());
        Fixture {
            research,
            site,
            feature,
            workspace,
            dispatcher,
        }
    }

    #[tokio::test]
    async fn landing_page_goes_to_site_build_only() {
        let f = fixture();
        let outcome = f
            .dispatcher
            .dispatch(&task("WEB: Bouw een landing page"))
            .await
            .unwrap();

        assert_eq!(f.site.executed(), vec!["WEB: Bouw een landing page"]);
        assert!(f.research.executed().is_empty());
        assert!(f.feature.executed().is_empty());
        assert_eq!(outcome.publish, Some(PublishStatus::Pushed));
        assert_eq!(f.workspace.publish_calls(), 1);
    }

    #[tokio::test]
    async fn research_does_not_publish() {
        let f = fixture();
        let outcome = f.dispatcher.dispatch(&task("research: tokio")).await.unwrap();
        assert_eq!(f.research.executed().len(), 1);
        assert_eq!(outcome.publish, None);
        assert_eq!(f.workspace.publish_calls(), 0);
    }

    #[tokio::test]
    async fn unroutable_title_is_rejected_without_executing() {
        let f = fixture();
        let err = f.dispatcher.dispatch(&task("make it better")).await.unwrap_err();
        assert!(matches!(err, KaizenError::Unroutable(_)));
        assert!(f.research.executed().is_empty());
        assert!(f.site.executed().is_empty());
        assert!(f.feature.executed().is_empty());
    }

    #[tokio::test]
    async fn failed_build_is_not_published() {
        let workspace = Arc::new(FakeWorkspace::new());
        let mut registry = ExecutorRegistry::new();
        registry
            .register(Arc::new(RecordingExecutor::failing(Capability::FeatureBuild, "compile error")))
            .unwrap();
        let dispatcher = Dispatcher::new(registry, Duration::from_secs(5))
            .with_workspace(workspace.clone(), WorkspaceLock::new());

        assert!(dispatcher.dispatch(&task("SYSTEM: add cache")).await.is_err());
        assert_eq!(workspace.publish_calls(), 0);
    }

    #[tokio::test]
    async fn missing_executor_is_reported() {
        let dispatcher = Dispatcher::new(ExecutorRegistry::new(), Duration::from_secs(5));
        let err = dispatcher.dispatch(&task("CODE: x")).await.unwrap_err();
        assert!(matches!(err, KaizenError::ExecutorNotFound(Capability::FeatureBuild)));
    }

    #[tokio::test]
    async fn slow_executor_times_out() {
        let mut registry = ExecutorRegistry::new();
        registry
            .register(Arc::new(
                RecordingExecutor::succeeding(Capability::Research).with_delay(Duration::from_secs(5)),
            ))
            .unwrap();
        let dispatcher = Dispatcher::new(registry, Duration::from_millis(20));
        let err = dispatcher.dispatch(&task("RESEARCH: slow")).await.unwrap_err();
        assert!(matches!(err, KaizenError::Timeout(_)));
    }
}
