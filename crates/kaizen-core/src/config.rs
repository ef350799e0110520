//! Config - 設定の読み込み
//!
//! 優先順位（後勝ち）：
//! 1. デフォルト値
//! 2. 設定ファイル（`--config` 指定時は必須、無指定なら `kaizen.toml` があれば読む）
//! 3. 環境変数 `KAIZEN__SECTION__KEY`（例: `KAIZEN__RUNTIME__POLL_INTERVAL_SECS=5`）
//!
//! 認証情報は `KAIZEN__SERVICE__CREDENTIALS=key-a,key-b` のようにカンマ区切りで渡せます。

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::app::{RetryPolicy, RuntimeSettings};
use crate::impls::GitOptions;
use crate::ports::CommandSpec;

const ENV_PREFIX: &str = "KAIZEN";
const DEFAULT_FILE: &str = "kaizen";

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub store: StoreSettings,
    pub workspace: WorkspaceSettings,
    pub health: HealthSettings,
    pub remediation: RemediationSettings,
    pub validation: ValidationSettings,
    pub service: ServiceSettings,
    pub memory: MemorySettings,
    pub executors: ExecutorSettings,
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreSettings {
    /// sqlx の接続 URL（`sqlite://kaizen.db`）
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkspaceSettings {
    pub root: PathBuf,
    /// self-healing が書き換え・ロールバックしてよい範囲（root からの相対）
    pub managed_path: String,
    pub remote: Option<String>,
    pub branch: Option<String>,
    pub push: bool,
    pub git_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HealthSettings {
    /// JSON を出力する lint コマンド（空白区切り）
    pub command: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RemediationSettings {
    pub fix_command: String,
    /// 空なら整形ステップなし
    pub format_command: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ValidationSettings {
    pub command: String,
    pub report_path: PathBuf,
    pub no_tests_exit_code: i32,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceSettings {
    pub base_url: String,
    pub model: String,
    pub credentials: Vec<SecretString>,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MemorySettings {
    pub path: PathBuf,
    pub context_size: usize,
    /// 教訓を生成サービスで 1 文に要約するか
    pub summarize: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExecutorSettings {
    pub research_dir: PathBuf,
    pub site_dir: PathBuf,
    pub feature_dir: PathBuf,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RuntimeConfig {
    pub poll_interval_secs: u64,
    pub health_interval_secs: u64,
    pub backoff_base_secs: u64,
    pub backoff_max_secs: u64,
}

impl Settings {
    /// デフォルト + `kaizen.toml`（あれば）+ 環境変数
    pub fn new() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .set_default("store.url", "sqlite://kaizen.db")?
            .set_default("workspace.root", ".")?
            .set_default("workspace.managed_path", ".")?
            .set_default("workspace.push", true)?
            .set_default("workspace.git_timeout_secs", 120)?
            .set_default("health.command", "ruff check --output-format=json --exit-zero .")?
            .set_default("health.timeout_secs", 300)?
            .set_default("remediation.fix_command", "ruff check --fix --exit-non-zero-on-fix .")?
            .set_default("remediation.format_command", "ruff format .")?
            .set_default("remediation.timeout_secs", 300)?
            .set_default(
                "validation.command",
                "pytest -q --json-report --json-report-file=.kaizen/pytest-report.json",
            )?
            .set_default("validation.report_path", ".kaizen/pytest-report.json")?
            .set_default("validation.no_tests_exit_code", 5)?
            .set_default("validation.timeout_secs", 900)?
            .set_default("service.base_url", "https://api.openai.com/v1/")?
            .set_default("service.model", "gpt-4o-mini")?
            .set_default("service.credentials", Vec::<String>::new())?
            .set_default("service.timeout_secs", 120)?
            .set_default("memory.path", "kaizen-memory.json")?
            .set_default("memory.context_size", 5)?
            .set_default("memory.summarize", true)?
            .set_default("executors.research_dir", "research")?
            .set_default("executors.site_dir", "site")?
            .set_default("executors.feature_dir", "features")?
            .set_default("executors.timeout_secs", 600)?
            .set_default("runtime.poll_interval_secs", 10)?
            .set_default("runtime.health_interval_secs", 300)?
            .set_default("runtime.backoff_base_secs", 2)?
            .set_default("runtime.backoff_max_secs", 60)?;

        let builder = match path {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder.add_source(File::with_name(DEFAULT_FILE).required(false)),
        };

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("service.credentials")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.runtime.poll_interval_secs == 0 || self.runtime.health_interval_secs == 0 {
            return Err(ConfigError::Message(
                "runtime intervals must be greater than zero".to_string(),
            ));
        }
        if self.memory.context_size == 0 {
            return Err(ConfigError::Message(
                "memory.context_size must be greater than zero".to_string(),
            ));
        }
        self.health_command()?;
        self.remediation_steps()?;
        self.validation_command()?;
        self.service_base_url()?;
        Ok(())
    }

    pub fn health_command(&self) -> Result<CommandSpec, ConfigError> {
        command("health.command", &self.health.command, self.health.timeout_secs)
            .map(|spec| spec.current_dir(&self.workspace.root))
    }

    /// fix → format の順
    pub fn remediation_steps(&self) -> Result<Vec<CommandSpec>, ConfigError> {
        let timeout = self.remediation.timeout_secs;
        let mut steps = vec![command("remediation.fix_command", &self.remediation.fix_command, timeout)?];
        if !self.remediation.format_command.trim().is_empty() {
            steps.push(command(
                "remediation.format_command",
                &self.remediation.format_command,
                timeout,
            )?);
        }
        Ok(steps
            .into_iter()
            .map(|spec| spec.current_dir(&self.workspace.root))
            .collect())
    }

    pub fn validation_command(&self) -> Result<CommandSpec, ConfigError> {
        command(
            "validation.command",
            &self.validation.command,
            self.validation.timeout_secs,
        )
        .map(|spec| spec.current_dir(&self.workspace.root))
    }

    /// report_path は workspace.root からの相対でも絶対でもよい
    pub fn validation_report_path(&self) -> PathBuf {
        self.workspace.root.join(&self.validation.report_path)
    }

    pub fn git_options(&self) -> GitOptions {
        let mut options = GitOptions::new(&self.workspace.root);
        options.managed_path = self.workspace.managed_path.clone();
        options.remote = self.workspace.remote.clone();
        options.branch = self.workspace.branch.clone();
        options.push = self.workspace.push;
        options.timeout = Duration::from_secs(self.workspace.git_timeout_secs);
        options
    }

    /// 空文字の認証情報は捨てる（`KAIZEN__SERVICE__CREDENTIALS=` 対策）
    pub fn credentials(&self) -> Vec<SecretString> {
        self.service
            .credentials
            .iter()
            .filter(|c| !c.expose_secret().trim().is_empty())
            .cloned()
            .collect()
    }

    /// 相対パスの join が効くように末尾の `/` を補う
    pub fn service_base_url(&self) -> Result<Url, ConfigError> {
        let raw = self.service.base_url.trim();
        let raw = if raw.ends_with('/') {
            raw.to_string()
        } else {
            format!("{raw}/")
        };
        Url::parse(&raw)
            .map_err(|e| ConfigError::Message(format!("service.base_url is invalid: {e}")))
    }

    pub fn service_timeout(&self) -> Duration {
        Duration::from_secs(self.service.timeout_secs)
    }

    pub fn executor_timeout(&self) -> Duration {
        Duration::from_secs(self.executors.timeout_secs)
    }

    pub fn runtime_settings(&self) -> RuntimeSettings {
        RuntimeSettings {
            poll_interval: Duration::from_secs(self.runtime.poll_interval_secs),
            health_interval: Duration::from_secs(self.runtime.health_interval_secs),
            retry: RetryPolicy::new(
                Duration::from_secs(self.runtime.backoff_base_secs),
                2.0,
                Duration::from_secs(self.runtime.backoff_max_secs),
            ),
        }
    }
}

fn command(key: &str, line: &str, timeout_secs: u64) -> Result<CommandSpec, ConfigError> {
    let argv: Vec<String> = line.split_whitespace().map(str::to_string).collect();
    CommandSpec::from_argv(&argv, Duration::from_secs(timeout_secs))
        .ok_or_else(|| ConfigError::Message(format!("{key} must not be empty")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_are_complete() {
        let file = write_config("");
        let settings = Settings::load(Some(file.path())).unwrap();

        assert_eq!(settings.store.url, "sqlite://kaizen.db");
        assert_eq!(settings.validation.no_tests_exit_code, 5);
        assert!(settings.credentials().is_empty());
        assert_eq!(settings.remediation_steps().unwrap().len(), 2);

        let runtime = settings.runtime_settings();
        assert_eq!(runtime.poll_interval, Duration::from_secs(10));
        assert_eq!(runtime.retry.max_delay, Duration::from_secs(60));
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        let file = write_config("[service]\nbase_url = \"http://localhost:8080/v1\"\n");
        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(
            settings.service_base_url().unwrap().as_str(),
            "http://localhost:8080/v1/"
        );
    }

    #[test]
    fn file_overrides_defaults() {
        let file = write_config(
            r#"
[workspace]
root = "/srv/repo"
managed_path = "src"
push = false

[service]
credentials = ["key-a", "", "key-b"]

[remediation]
format_command = ""
"#,
        );
        let settings = Settings::load(Some(file.path())).unwrap();

        let options = settings.git_options();
        assert_eq!(options.repo_root, PathBuf::from("/srv/repo"));
        assert_eq!(options.managed_path, "src");
        assert!(!options.push);

        let credentials: Vec<String> = settings
            .credentials()
            .iter()
            .map(|c| c.expose_secret().to_string())
            .collect();
        assert_eq!(credentials, vec!["key-a", "key-b"]);

        let steps = settings.remediation_steps().unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].program, "ruff");
        assert_eq!(steps[0].cwd.as_deref(), Some(Path::new("/srv/repo")));
    }

    #[test]
    fn empty_command_is_rejected() {
        let file = write_config("[health]\ncommand = \"  \"\n");
        let err = Settings::load(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("health.command"));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let file = write_config("[runtime]\npoll_interval_secs = 0\n");
        assert!(Settings::load(Some(file.path())).is_err());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Settings::load(Some(&dir.path().join("nope.toml"))).is_err());
    }
}
