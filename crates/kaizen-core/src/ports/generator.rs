//! Generator port - 生成テキストサービスの抽象化
//!
//! 2 層に分かれています：
//! - **TextGenerator**: バックエンド 1 回の呼び出し（認証情報を 1 つ受け取る）
//! - **GenerationService**: executor / ledger が使う面。ローテーションと
//!   リトライはこの層（ServiceClient）が持ち、失敗は空（`None`）に丸める。

use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use thiserror::Error;

/// GenerationError はバックエンド呼び出しのエラー
#[derive(Debug, Error)]
pub enum GenerationError {
    /// クォータ・レート制限（認証情報をローテーションして再試行）
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    /// それ以外（再試行しない）
    #[error("generation failed: {0}")]
    Failed(String),
}

impl GenerationError {
    /// ローテーション対象か。タイムアウトもクォータ扱い。
    pub fn is_quota_like(&self) -> bool {
        matches!(self, GenerationError::RateLimited(_) | GenerationError::Timeout(_))
    }
}

/// TextGenerator は生成バックエンド
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        credential: &SecretString,
        prompt: &str,
    ) -> Result<String, GenerationError>;
}

/// GenerationService は `generate(prompt) -> text` の契約
///
/// `None` はソフトな失敗（クォータ枯渇・非一時的エラー・空応答）。
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(&self, prompt: &str) -> Option<String>;
}
