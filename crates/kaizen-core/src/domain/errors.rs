//! Errors - エラー型と分類
//!
//! ループは `ErrorKind` を見て振る舞いを変えます：
//! - Infrastructure（ストア障害など）はバックオフして次のサイクルへ
//! - それ以外はタスク単位の失敗として `fail_task` に変換

use std::time::Duration;

use thiserror::Error;

use super::Capability;

/// ErrorKind は実行エラーの分類
///
/// - Transient: 一時的なエラー（リトライ推奨）
/// - Permanent: 恒久的なエラー（リトライ無意味）
/// - Infrastructure: インフラエラー（ストア・ファイルシステムの障害）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Permanent,
    Infrastructure,
}

/// KaizenError はドメインエラー
#[derive(Debug, Error)]
pub enum KaizenError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("generation service returned no content: {0}")]
    Generation(String),

    #[error("executor failed: {0}")]
    Executor(String),

    #[error("unroutable task title: {0}")]
    Unroutable(String),

    #[error("executor not found for capability={0}")]
    ExecutorNotFound(Capability),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("workspace error: {0}")]
    Workspace(String),
}

impl KaizenError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            KaizenError::Storage(_) | KaizenError::Io(_) => ErrorKind::Infrastructure,
            KaizenError::Generation(_) | KaizenError::Timeout(_) => ErrorKind::Transient,
            KaizenError::Serialization(_)
            | KaizenError::Executor(_)
            | KaizenError::Unroutable(_)
            | KaizenError::ExecutorNotFound(_)
            | KaizenError::Workspace(_) => ErrorKind::Permanent,
        }
    }
}
