//! GitWorkspace - git による Workspace 実装
//!
//! - revert: `reset` → `checkout HEAD` → `clean -fd`（管理対象のサブツリーのみ）
//! - publish: `add -A` → `commit` → `push`（push 失敗はローカルコミットのまま）

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::{KaizenError, PublishStatus};
use crate::ports::{CommandOutput, CommandRunner, CommandSpec, Workspace};

#[derive(Debug, Clone)]
pub struct GitOptions {
    /// リポジトリのルート（コマンドの cwd）
    pub repo_root: PathBuf,
    /// ルートからの相対パス。revert の対象。
    pub managed_path: String,
    pub remote: Option<String>,
    pub branch: Option<String>,
    pub push: bool,
    pub timeout: Duration,
}

impl GitOptions {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            managed_path: ".".to_string(),
            remote: None,
            branch: None,
            push: true,
            timeout: Duration::from_secs(60),
        }
    }
}

pub struct GitWorkspace {
    runner: Arc<dyn CommandRunner>,
    options: GitOptions,
}

impl GitWorkspace {
    pub fn new(runner: Arc<dyn CommandRunner>, options: GitOptions) -> Self {
        Self { runner, options }
    }

    fn git<I, S>(&self, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandSpec::new("git", self.options.timeout)
            .args(args)
            .current_dir(&self.options.repo_root)
    }

    async fn run(&self, spec: CommandSpec) -> Result<CommandOutput, KaizenError> {
        self.runner
            .run(&spec)
            .await
            .map_err(|e| KaizenError::Workspace(format!("{}: {e}", spec.display())))
    }

    /// 失敗を Workspace エラーにする
    async fn run_ok(&self, spec: CommandSpec) -> Result<CommandOutput, KaizenError> {
        let display = spec.display();
        let out = self.run(spec).await?;
        if !out.success() {
            return Err(KaizenError::Workspace(format!(
                "{display} exited with {:?}: {}",
                out.code,
                out.stderr.trim()
            )));
        }
        Ok(out)
    }

    async fn status(&self, path: &str) -> Result<String, KaizenError> {
        let out = self
            .run_ok(self.git(["status", "--porcelain", "--", path]))
            .await?;
        Ok(out.stdout)
    }
}

#[async_trait]
impl Workspace for GitWorkspace {
    async fn revert(&self) -> Result<(), KaizenError> {
        let path = self.options.managed_path.as_str();
        // stage された新規ファイルも戻すため、先に index を HEAD に合わせる
        self.run_ok(self.git(["reset", "-q", "HEAD", "--", path]))
            .await?;
        self.run_ok(self.git(["checkout", "HEAD", "--", path]))
            .await?;
        self.run_ok(self.git(["clean", "-fd", "--", path])).await?;
        info!(path, "workspace reverted to HEAD");
        Ok(())
    }

    async fn is_dirty(&self) -> Result<bool, KaizenError> {
        let status = self.status(&self.options.managed_path).await?;
        Ok(!status.trim().is_empty())
    }

    async fn publish(&self, message: &str) -> PublishStatus {
        match self.status(".").await {
            Ok(status) if status.trim().is_empty() => return PublishStatus::NoChanges,
            Ok(_) => {}
            Err(e) => return PublishStatus::Failed(e.to_string()),
        }

        if let Err(e) = self.run_ok(self.git(["add", "-A"])).await {
            warn!(error = %e, "publish: stage failed");
            return PublishStatus::Failed(e.to_string());
        }
        if let Err(e) = self.run_ok(self.git(["commit", "-q", "-m", message])).await {
            warn!(error = %e, "publish: commit failed");
            return PublishStatus::Failed(e.to_string());
        }

        if !self.options.push {
            return PublishStatus::CommittedLocally("push disabled".to_string());
        }
        let mut push = self.git(["push"]);
        if let Some(remote) = &self.options.remote {
            push = push.arg(remote.clone());
            if let Some(branch) = &self.options.branch {
                push = push.arg(branch.clone());
            }
        }
        match self.run_ok(push).await {
            Ok(_) => {
                info!("publish: pushed");
                PublishStatus::Pushed
            }
            Err(e) => {
                warn!(error = %e, "publish: push failed, changes committed locally");
                PublishStatus::CommittedLocally(e.to_string())
            }
        }
    }
}
