//! TokioCommandRunner - tokio::process による CommandRunner
//!
//! タイムアウトしたプロセスは kill します。
//! stdout / stderr は別タスクで読み続ける（パイプが詰まって wait が返らないのを防ぐ）。

use std::io::ErrorKind as IoErrorKind;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::ports::{CommandError, CommandOutput, CommandRunner, CommandSpec};

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioCommandRunner;

fn drain<R>(reader: Option<R>) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(mut reader) = reader else {
            return String::new();
        };
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf).await;
        String::from_utf8_lossy(&buf).into_owned()
    })
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &spec.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd.spawn().map_err(|e| match e.kind() {
            IoErrorKind::NotFound => CommandError::NotFound(spec.program.clone()),
            _ => CommandError::Io(e),
        })?;
        debug!(command = %spec.display(), "spawned");

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        match tokio::time::timeout(spec.timeout, child.wait()).await {
            Ok(Ok(status)) => Ok(CommandOutput {
                code: status.code(),
                stdout: stdout.await.unwrap_or_default(),
                stderr: stderr.await.unwrap_or_default(),
            }),
            Ok(Err(e)) => Err(CommandError::Io(e)),
            Err(_) => {
                // タイムアウト：プロセスを止める
                if let Err(e) = child.kill().await {
                    warn!(command = %spec.display(), error = %e, "failed to kill timed-out process");
                }
                stdout.abort();
                stderr.abort();
                Err(CommandError::TimedOut(spec.timeout))
            }
        }
    }
}
