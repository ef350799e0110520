//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 各 trait は外部システム（SQLite, git, lint/test ツール, 生成 API など）への
//! インターフェースを提供し、実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - TaskStore が source of truth（正本）
//! - 外部プロセスは CommandRunner 経由（すべてタイムアウト付き）
//! - ワークスペースの書き換えは WorkspaceLock の下で行う

pub mod clock;
pub mod command;
pub mod event_sink;
pub mod executor;
pub mod generator;
pub mod healing;
pub mod id_generator;
pub mod task_store;
pub mod workspace;

// 主要な trait を再エクスポート
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::command::{CommandError, CommandOutput, CommandRunner, CommandSpec};
pub use self::event_sink::EventSink;
pub use self::executor::{Executor, PromptContext};
pub use self::generator::{GenerationError, GenerationService, TextGenerator};
pub use self::healing::{HealthCheck, Remediation, TestSuite};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::task_store::TaskStore;
pub use self::workspace::{Workspace, WorkspaceLock};
