//! ServiceClient - 認証情報プールのローテーション付き GenerationService
//!
//! # 契約
//! - アクティブな認証情報で呼び出す
//! - クォータ系（RateLimited / Timeout）なら次の認証情報へ（wrap-around）して再試行
//! - 試行回数はプールのサイズまで
//! - それ以外のエラーは即中断
//! - 失敗はすべて `None`（ソフトな失敗）

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use tracing::{debug, warn};

use crate::ports::{GenerationError, GenerationService, TextGenerator};

/// 順序付きの認証情報プール
///
/// アクティブな位置はローテーションをまたいで保持される
/// （直前にクォータ切れだったキーから次の呼び出しを始めない）。
pub struct CredentialPool {
    credentials: Vec<SecretString>,
    active: AtomicUsize,
}

impl CredentialPool {
    pub fn new(credentials: Vec<SecretString>) -> Self {
        Self {
            credentials,
            active: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    pub fn active_index(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    fn active(&self) -> Option<(usize, &SecretString)> {
        if self.credentials.is_empty() {
            return None;
        }
        let index = self.active_index() % self.credentials.len();
        self.credentials.get(index).map(|c| (index, c))
    }

    /// 次の認証情報へ（wrap-around）。`from` がまだアクティブな場合だけ進める。
    fn rotate_from(&self, from: usize) -> usize {
        let len = self.credentials.len().max(1);
        let next = (from + 1) % len;
        // 並行呼び出しが先に回していたら二重に進めない
        match self
            .active
            .compare_exchange(from, next, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => next,
            Err(current) => {
                debug!(from, current, "credential already rotated by a concurrent call");
                current
            }
        }
    }
}

pub struct ServiceClient {
    backend: Arc<dyn TextGenerator>,
    pool: CredentialPool,
    timeout: Duration,
}

impl ServiceClient {
    pub fn new(backend: Arc<dyn TextGenerator>, pool: CredentialPool, timeout: Duration) -> Self {
        Self {
            backend,
            pool,
            timeout,
        }
    }

    pub fn pool(&self) -> &CredentialPool {
        &self.pool
    }

    async fn attempt(&self, credential: &SecretString, prompt: &str) -> Result<String, GenerationError> {
        match tokio::time::timeout(self.timeout, self.backend.generate(credential, prompt)).await {
            Ok(result) => result,
            Err(_) => Err(GenerationError::Timeout(self.timeout)),
        }
    }
}

#[async_trait]
impl GenerationService for ServiceClient {
    async fn generate(&self, prompt: &str) -> Option<String> {
        let attempts = self.pool.len();
        if attempts == 0 {
            warn!("generation skipped: credential pool is empty");
            return None;
        }

        for attempt in 1..=attempts {
            let (index, credential) = self.pool.active()?;
            match self.attempt(credential, prompt).await {
                Ok(text) if text.trim().is_empty() => {
                    warn!(attempt, "generation returned empty text");
                    return None;
                }
                Ok(text) => {
                    debug!(attempt, credential = index, "generation succeeded");
                    return Some(text);
                }
                Err(e) if e.is_quota_like() => {
                    let next = self.pool.rotate_from(index);
                    warn!(attempt, credential = index, next, error = %e, "quota exhausted, rotating credential");
                }
                Err(e) => {
                    warn!(attempt, credential = index, error = %e, "generation failed, not retrying");
                    return None;
                }
            }
        }

        warn!(attempts, "all credentials exhausted");
        None
    }
}
