//! Memory model: lessons and moving-average metrics.
//!
//! 永続化ドキュメントのキーは固定：
//! `successful_patterns[]`, `failed_patterns[]`, `metrics{...}`
//! （加えて `self_healing_events[]`）。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::HealingEvent;

/// Upper bound of retained healing events (oldest dropped first).
pub const MAX_HEALING_EVENTS: usize = 200;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_tasks: u64,
    pub success_count: u64,
    /// 秒単位の移動平均
    pub avg_duration: f64,
}

impl MetricsSnapshot {
    /// Single-pass update: `avg += (d - avg) / n`.
    pub fn record(&mut self, success: bool, duration_secs: f64) {
        self.total_tasks += 1;
        if success {
            self.success_count += 1;
        }
        // total_tasks >= 1 here
        let n = self.total_tasks as f64;
        self.avg_duration += (duration_secs - self.avg_duration) / n;
    }

    pub fn failure_count(&self) -> u64 {
        self.total_tasks - self.success_count
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_tasks == 0 {
            0.0
        } else {
            self.success_count as f64 / self.total_tasks as f64
        }
    }
}

/// One append-only lesson. Never mutated after append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonEntry {
    pub task_title: String,
    pub pattern_or_lesson: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryDocument {
    pub successful_patterns: Vec<LessonEntry>,
    pub failed_patterns: Vec<LessonEntry>,
    pub metrics: MetricsSnapshot,
    #[serde(default)]
    pub self_healing_events: Vec<HealingEvent>,
}

impl MemoryDocument {
    /// 構造的な整合性チェック。壊れていれば理由を返す。
    pub fn validate(&self) -> Result<(), String> {
        let m = &self.metrics;
        if m.success_count > m.total_tasks {
            return Err(format!(
                "success_count {} exceeds total_tasks {}",
                m.success_count, m.total_tasks
            ));
        }
        if !m.avg_duration.is_finite() || m.avg_duration < 0.0 {
            return Err(format!("avg_duration {} is not a valid duration", m.avg_duration));
        }
        let lessons = (self.successful_patterns.len() + self.failed_patterns.len()) as u64;
        if lessons > m.total_tasks {
            return Err(format!(
                "{lessons} lessons recorded for only {} tasks",
                m.total_tasks
            ));
        }
        Ok(())
    }

    pub fn push_healing_event(&mut self, event: HealingEvent) {
        self.self_healing_events.push(event);
        if self.self_healing_events.len() > MAX_HEALING_EVENTS {
            let excess = self.self_healing_events.len() - MAX_HEALING_EVENTS;
            self.self_healing_events.drain(..excess);
        }
    }
}
