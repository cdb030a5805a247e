//! OpenAI-compatible adapter (chat completions).
//!
//! Works against any server exposing `POST {base_url}/chat/completions`
//! (OpenAI, OpenRouter, Ollama, vLLM, ...).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use a1news_core::{config::ModelEndpoint, errors::Error, ports::ChatModel, Result};

/// Body characters kept in error messages.
const ERROR_BODY_LEN: usize = 300;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ChatCompletionsClient {
    endpoint: ModelEndpoint,
    url: String,
    http: reqwest::Client,
}

impl ChatCompletionsClient {
    pub fn new(endpoint: ModelEndpoint, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::External(format!("http client build error: {e}")))?;
        let url = format!("{}/chat/completions", endpoint.base_url.trim_end_matches('/'));
        Ok(Self {
            endpoint,
            url,
            http,
        })
    }
}

#[async_trait]
impl ChatModel for ChatCompletionsClient {
    fn model_name(&self) -> &str {
        &self.endpoint.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.endpoint.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        debug!(model = %self.endpoint.model, prompt_chars = prompt.chars().count(), "chat completion request");
        let resp = self
            .http
            .post(&self.url)
            .bearer_auth(&self.endpoint.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::External(format!("model request error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::External(format!(
                "model request failed: {status} {}",
                body.chars().take(ERROR_BODY_LEN).collect::<String>()
            )));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| Error::External(format!("model response json error: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(Error::Model(format!(
                "model {} returned empty content",
                self.endpoint.model
            )));
        }
        Ok(content)
    }
}
