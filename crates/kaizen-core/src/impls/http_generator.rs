//! HttpTextGenerator - OpenAI 互換の chat-completions バックエンド
//!
//! HTTP ステータス → GenerationError：
//! - 429 / 529、または本文にクォータ系のメッセージ → RateLimited
//! - それ以外の非 2xx → Failed

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::ports::{GenerationError, TextGenerator};

/// 本文に含まれていたらクォータ切れとみなす語
const QUOTA_MARKERS: [&str; 4] = ["quota", "rate limit", "rate_limit", "resource_exhausted"];

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

pub struct HttpTextGenerator {
    client: Client,
    base_url: Url,
    model: String,
}

impl HttpTextGenerator {
    pub fn new(base_url: Url, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url,
            model: model.into(),
        }
    }
}

/// ステータスと本文からエラーを分類
pub fn classify_failure(status: StatusCode, body: &str) -> GenerationError {
    let lower = body.to_ascii_lowercase();
    let quota_status = status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 529;
    if quota_status || QUOTA_MARKERS.iter().any(|m| lower.contains(m)) {
        GenerationError::RateLimited(format!("HTTP {status}"))
    } else {
        GenerationError::Failed(format!("HTTP {status}: {}", body.trim()))
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(
        &self,
        credential: &SecretString,
        prompt: &str,
    ) -> Result<String, GenerationError> {
        let url = self
            .base_url
            .join("chat/completions")
            .map_err(|e| GenerationError::Failed(format!("invalid url: {e}")))?;

        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let res = self
            .client
            .post(url)
            .bearer_auth(credential.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::RateLimited(format!("request timed out: {e}"))
                } else {
                    GenerationError::Failed(e.to_string())
                }
            })?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(classify_failure(status, &body));
        }

        let body: ChatResponse = res
            .json()
            .await
            .map_err(|e| GenerationError::Failed(format!("parse error: {e}")))?;
        Ok(body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}
