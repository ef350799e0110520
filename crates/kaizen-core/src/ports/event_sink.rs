//! EventSink port - self-healing イベントの記録
//!
//! # 実装
//! - TracingEventSink: ログに出すだけ
//! - MemoryLedger: `self_healing_events[]` に追記
//! - FanoutEventSink: 複数の sink に配る

use async_trait::async_trait;

use crate::domain::{HealingEvent, KaizenError};

/// EventSink は HealingEvent を記録
///
/// 記録の失敗はサイクルの結果を変えない。呼び出し側はログに残して続行する。
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: &HealingEvent) -> Result<(), KaizenError>;
}
