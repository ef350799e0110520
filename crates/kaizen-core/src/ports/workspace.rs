//! Workspace port - 管理対象ツリーのバージョン管理操作
//!
//! VCS は差し替え可能（本番は git）。
//!
//! # 排他
//! remediate / rollback / publish はツリーを書き換えるので、
//! 呼び出し側（app 層）が `WorkspaceLock` を保持したまま実行します。
//! trait のメソッド自体はロックを取りません（再入でのデッドロックを避ける）。

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::{KaizenError, PublishStatus};

#[async_trait]
pub trait Workspace: Send + Sync {
    /// 管理対象ツリーを最後のコミット状態に戻す（未追跡ファイルも削除）。冪等。
    async fn revert(&self) -> Result<(), KaizenError>;

    /// 未コミットの変更があるか
    async fn is_dirty(&self) -> Result<bool, KaizenError>;

    /// すべての変更を stage + commit + push。失敗しても例外にせず状態で返す。
    async fn publish(&self, message: &str) -> PublishStatus;
}

/// ワークスペースの排他ロック
#[derive(Debug, Clone, Default)]
pub struct WorkspaceLock {
    inner: Arc<Mutex<()>>,
}

impl WorkspaceLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self) -> OwnedMutexGuard<()> {
        Arc::clone(&self.inner).lock_owned().await
    }

    /// ロック中なら None
    pub fn try_acquire(&self) -> Option<OwnedMutexGuard<()>> {
        Arc::clone(&self.inner).try_lock_owned().ok()
    }
}
