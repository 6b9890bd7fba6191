use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::timeout;

use crate::models::{GenerateRequest, GenerateResponse, Usage};

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream did not answer within the deadline")]
    Timeout,

    #[error("insufficient upstream credits: {message}")]
    InsufficientCredits { message: String },

    #[error("upstream returned {status}: {message}")]
    Failed { status: u16, message: String },

    #[error("upstream request failed: {0}")]
    Transport(reqwest::Error),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamError::Timeout
        } else {
            UpstreamError::Transport(err)
        }
    }
}

// OpenAI-style chat completion wire format
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

/// Client for the paid completion API.
///
/// Every call is bounded by `deadline`. When it fires the in-flight request
/// future is dropped, which closes the outbound connection instead of leaving
/// it running in the background.
#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    deadline: Duration,
}

impl UpstreamClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        deadline: Duration,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            deadline,
        }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    // Key used when the caller has no brand-specific one
    pub fn default_api_key(&self) -> &str {
        &self.api_key
    }

    pub async fn complete(
        &self,
        req: &GenerateRequest,
        api_key: &str,
    ) -> Result<GenerateResponse, UpstreamError> {
        match timeout(self.deadline, self.exchange(req, api_key)).await {
            Ok(result) => result,
            Err(_) => Err(UpstreamError::Timeout),
        }
    }

    async fn exchange(
        &self,
        req: &GenerateRequest,
        api_key: &str,
    ) -> Result<GenerateResponse, UpstreamError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(context) = req.context.as_deref().filter(|c| !c.is_empty()) {
            messages.push(ChatMessage {
                role: "system",
                content: context,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &req.prompt,
        });

        let body = ChatRequest {
            model: &self.model,
            messages,
            max_tokens: req.max_tokens,
        };

        let res = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let message = res
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error.message)
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("upstream request failed")
                        .to_string()
                });

            if status == StatusCode::PAYMENT_REQUIRED {
                return Err(UpstreamError::InsufficientCredits { message });
            }
            return Err(UpstreamError::Failed {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = res.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        Ok(GenerateResponse {
            content,
            usage: body.usage.map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
        })
    }
}
