//! Executor port - capability ごとのタスク実行
//!
//! Dispatcher はタイトルから Capability を決め、
//! ExecutorRegistry から対応する Executor を引いて実行します。

use async_trait::async_trait;

use crate::domain::{Capability, KaizenError, Outcome, Task};

/// Executor は 1 つの capability を担当する
///
/// # 契約
/// - 成功時は `Outcome::success()` にアーティファクトを載せて返す
/// - 失敗は `Err`（Orchestrator が `fail_task` と失敗レッスンに変換する）
/// - publish（commit/push）は Dispatcher の責務。Executor はファイルを書くだけ。
#[async_trait]
pub trait Executor: Send + Sync {
    fn capability(&self) -> Capability;

    async fn execute(&self, task: &Task) -> Result<Outcome, KaizenError>;
}

/// 過去の学び（成功・失敗パターン）をプロンプト用の文字列で返す
#[async_trait]
pub trait PromptContext: Send + Sync {
    async fn prompt_context(&self) -> String;
}
