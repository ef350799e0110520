//! GenerativeExecutor - 生成サービスでアーティファクトを作る executor
//!
//! capability ごとに 1 インスタンス。やることは同じで、
//! プロンプトの指示・出力先・拡張子だけが違います：
//! 1. タイトル・説明・過去の学びからプロンプトを組み立てる
//! 2. GenerationService を呼ぶ（空なら Generation エラー）
//! 3. `<output_dir>/<slug>-<id>.<ext>` に書き出す

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::domain::{Artifact, Capability, KaizenError, Outcome, Task, strip_marker};
use crate::ports::{Executor, GenerationService, PromptContext};

/// スラッグの最大長
const MAX_SLUG_LEN: usize = 48;

/// タイトルからファイル名用のスラッグを作る（ASCII 英数字と `-` のみ）
pub fn slugify(title: &str) -> String {
    let mut slug = String::new();
    for c in strip_marker(title).chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
        if slug.len() >= MAX_SLUG_LEN {
            break;
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "task".to_string()
    } else {
        slug.to_string()
    }
}

/// 生成結果を囲むコードフェンスを外す
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // 最初の行（```html など）を捨てる
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn instructions(capability: Capability) -> &'static str {
    match capability {
        Capability::Research => {
            "Write a concise research brief in Markdown: key findings, options, and a recommendation."
        }
        Capability::SiteBuild => {
            "Produce a single self-contained HTML page (inline CSS, no external assets)."
        }
        Capability::FeatureBuild => {
            "Write an implementation plan and the code for the requested change in Markdown."
        }
    }
}

pub struct GenerativeExecutor {
    capability: Capability,
    service: Arc<dyn GenerationService>,
    context: Option<Arc<dyn PromptContext>>,
    output_dir: PathBuf,
    extension: String,
}

impl GenerativeExecutor {
    pub fn new(
        capability: Capability,
        service: Arc<dyn GenerationService>,
        output_dir: impl Into<PathBuf>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            capability,
            service,
            context: None,
            output_dir: output_dir.into(),
            extension: extension.into(),
        }
    }

    pub fn with_context(mut self, context: Arc<dyn PromptContext>) -> Self {
        self.context = Some(context);
        self
    }

    /// capability ごとのデフォルト拡張子
    pub fn default_extension(capability: Capability) -> &'static str {
        match capability {
            Capability::SiteBuild => "html",
            Capability::Research | Capability::FeatureBuild => "md",
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    async fn build_prompt(&self, task: &Task) -> String {
        let mut prompt = format!(
            "{}\n\nTask: {}\n",
            instructions(self.capability),
            strip_marker(&task.title)
        );
        if let Some(description) = task.description.as_deref().filter(|d| !d.trim().is_empty()) {
            prompt.push_str(&format!("Details: {description}\n"));
        }
        if let Some(context) = &self.context {
            let lessons = context.prompt_context().await;
            if !lessons.trim().is_empty() {
                prompt.push_str(&format!("\nLessons from previous tasks:\n{lessons}\n"));
            }
        }
        prompt
    }
}

#[async_trait]
impl Executor for GenerativeExecutor {
    fn capability(&self) -> Capability {
        self.capability
    }

    async fn execute(&self, task: &Task) -> Result<Outcome, KaizenError> {
        let prompt = self.build_prompt(task).await;
        let Some(text) = self.service.generate(&prompt).await else {
            return Err(KaizenError::Generation(format!(
                "no content for {} task {}",
                self.capability, task.id
            )));
        };
        let body = strip_code_fence(&text);
        if body.is_empty() {
            return Err(KaizenError::Generation(format!(
                "only a code fence for {} task {}",
                self.capability, task.id
            )));
        }

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let file_name = format!(
            "{}-{}.{}",
            slugify(&task.title),
            task.id.as_i64(),
            self.extension
        );
        let path = self.output_dir.join(file_name);
        tokio::fs::write(&path, body).await?;

        info!(task_id = %task.id, capability = %self.capability, path = %path.display(), "artifact written");
        Ok(Outcome::success()
            .with_capability(self.capability)
            .with_artifact(Artifact::FilePath(path.display().to_string())))
    }
}
