//! kaizen-core
//!
//! Core building blocks for the Kaizen autonomous improvement loop.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, state, task, route, health, validation, memory, errors, events）
//! - **ports**: 抽象化レイヤー（TaskStore, CommandRunner, Workspace, GenerationService, Executor, など）
//! - **impls**: 実装（SQLite / in-memory ストア、git、lint・テストツール、生成 API）
//! - **app**: アプリケーションロジック（builder, dispatcher, healing, ledger, orchestrator）
//! - **config**: 設定ファイル + 環境変数
//! - **telemetry**: tracing の初期化
//! - **observability**: 状態ビュー

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;
