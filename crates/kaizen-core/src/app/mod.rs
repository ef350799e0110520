//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **OrchestratorBuilder**: 構築とワイヤリング（起動時検証）
//! - **Orchestrator**: タスク処理 + health サイクルのメインループ
//! - **Dispatcher**: タイトル → executor のルーティングと publish
//! - **SelfHealingCycle**: analyze → fix → validate → keep/rollback
//! - **MemoryLedger**: 成功・失敗パターンとメトリクスの永続化

pub mod builder;
pub mod dispatcher;
pub mod healing;
pub mod ledger;
pub mod orchestrator;
pub mod registry;
pub mod retry;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, DEFAULT_EXECUTOR_TIMEOUT, OrchestratorBuilder};
pub use self::dispatcher::Dispatcher;
pub use self::healing::SelfHealingCycle;
pub use self::ledger::{LedgerError, MemoryLedger, TaskRecord};
pub use self::orchestrator::{
    CycleSummary, INTERRUPTED_REASON, Orchestrator, RuntimeSettings, TaskReport, UNROUTABLE_REASON,
};
pub use self::registry::{ExecutorRegistry, RegistryError};
pub use self::retry::RetryPolicy;
