//! Domain - ドメインモデル
//!
//! 外部システムに依存しない純粋な型とルールを定義します。
//!
//! # 主要な型
//! - **ids**: TaskId（ストア採番）、CycleId（ULID）
//! - **state**: TaskStatus の状態遷移
//! - **task**: Task, NewTask, TaskSource
//! - **route**: タイトル → Capability のルーティング規則
//! - **health / validation / healing**: self-healing サイクルの結果型
//! - **memory**: MemoryLedger の永続化ドキュメント
//! - **outcome**: executor 実行結果
//! - **errors**: KaizenError と ErrorKind

pub mod errors;
pub mod events;
pub mod healing;
pub mod health;
pub mod ids;
pub mod memory;
pub mod outcome;
pub mod route;
pub mod state;
pub mod task;
pub mod validation;

pub use self::errors::{ErrorKind, KaizenError};
pub use self::events::{HealingEvent, HealingEventKind};
pub use self::healing::{CycleReport, FixReport, PublishStatus};
pub use self::health::{HealthReport, HealthStatus, Issue, PERFECT_SCORE, Severity, health_score};
pub use self::ids::{CycleId, Id, IdMarker, TaskId};
pub use self::memory::{LessonEntry, MAX_HEALING_EVENTS, MemoryDocument, MetricsSnapshot};
pub use self::outcome::{Artifact, Outcome, OutcomeKind};
pub use self::route::{Capability, ROUTE_RULES, RouteRule, classify, strip_marker};
pub use self::state::TaskStatus;
pub use self::task::{NewTask, Task, TaskSource};
pub use self::validation::{TestSummary, ValidationOutcome, ValidationResult};
