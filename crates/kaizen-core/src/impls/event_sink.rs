//! EventSink 実装

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::domain::{HealingEvent, KaizenError};
use crate::ports::EventSink;

/// ログに出すだけの sink。critical は `error!`。
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn emit(&self, event: &HealingEvent) -> Result<(), KaizenError> {
        if event.kind.is_critical() {
            error!(
                cycle_id = %event.cycle_id,
                kind = ?event.kind,
                score = event.score,
                detail = %event.detail,
                "self-healing event"
            );
        } else {
            info!(
                cycle_id = %event.cycle_id,
                kind = ?event.kind,
                score = event.score,
                detail = %event.detail,
                "self-healing event"
            );
        }
        Ok(())
    }
}

/// 複数の sink に配る。1 つが失敗しても残りには届ける。
#[derive(Default)]
pub struct FanoutEventSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

#[async_trait]
impl EventSink for FanoutEventSink {
    async fn emit(&self, event: &HealingEvent) -> Result<(), KaizenError> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.emit(event).await {
                warn!(cycle_id = %event.cycle_id, error = %e, "event sink failed");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CycleId, HealingEventKind};
    use crate::testing::RecordingEventSink;
    use chrono::Utc;
    use ulid::Ulid;

    struct FailingSink;

    #[async_trait]
    impl EventSink for FailingSink {
        async fn emit(&self, _event: &HealingEvent) -> Result<(), KaizenError> {
            Err(KaizenError::Storage("disk full".into()))
        }
    }

    #[tokio::test]
    async fn fanout_delivers_to_all_even_after_failure() {
        let recorder = Arc::new(RecordingEventSink::default());
        let fanout = FanoutEventSink::new()
            .with(Arc::new(TracingEventSink))
            .with(Arc::new(FailingSink))
            .with(recorder.clone());

        let event = HealingEvent {
            cycle_id: CycleId::from_ulid(Ulid::new()),
            kind: HealingEventKind::RolledBack,
            score: 80,
            detail: "2 tests failed".into(),
            timestamp: Utc::now(),
        };
        assert!(fanout.emit(&event).await.is_err());
        assert_eq!(recorder.events(), vec![event]);
    }
}
