//! Telemetry - tracing subscriber の初期化

use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
#[error("tracing init failed: {0}")]
pub struct TelemetryError(String);

/// グローバルな tracing subscriber を初期化する（プロセスで 1 回）
///
/// - `LOG_FORMAT=json`: 構造化 JSON（ログ集約向け）
/// - それ以外（未設定含む）: 人間向けの pretty 出力
///
/// フィルタは `RUST_LOG`。未設定なら `info`。
pub fn init_tracing() -> Result<(), TelemetryError> {
    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let result = match format.as_str() {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter())
            .with_current_span(true)
            .with_span_list(true)
            .try_init(),
        _ => tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(filter())
            .try_init(),
    };

    result.map_err(|e| TelemetryError(e.to_string()))
}
