//! Impls - ports の実装
//!
//! - ストア: SqliteTaskStore（本番）、InMemoryTaskStore（テスト・開発）
//! - 外部プロセス: TokioCommandRunner, GitWorkspace, LinterHealthMonitor,
//!   LintRemediator, PytestValidator
//! - 生成: HttpTextGenerator, ServiceClient, GenerativeExecutor
//! - イベント: TracingEventSink, FanoutEventSink

pub mod event_sink;
pub mod executors;
pub mod git;
pub mod health;
pub mod http_generator;
pub mod memory_store;
pub mod process;
pub mod remediator;
pub mod service_client;
pub mod sqlite_store;
pub mod validator;

pub use self::event_sink::{FanoutEventSink, TracingEventSink};
pub use self::executors::GenerativeExecutor;
pub use self::git::{GitOptions, GitWorkspace};
pub use self::health::LinterHealthMonitor;
pub use self::http_generator::HttpTextGenerator;
pub use self::memory_store::InMemoryTaskStore;
pub use self::process::TokioCommandRunner;
pub use self::remediator::LintRemediator;
pub use self::service_client::{CredentialPool, ServiceClient};
pub use self::sqlite_store::SqliteTaskStore;
pub use self::validator::PytestValidator;
