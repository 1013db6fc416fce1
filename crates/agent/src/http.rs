//! HTTP language generation client for OpenAI-compatible, Anthropic and
//! Ollama endpoints.

use std::time::Duration;

use advisor_core::config::{LlmConfig, LlmProvider};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::llm::{LlmClient, PromptSpec};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_OUTPUT_TOKENS: u32 = 4096;

pub struct HttpLlmClient {
    client: Client,
    provider: LlmProvider,
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
    max_retries: u32,
}

impl HttpLlmClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build http client")?;
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| config.provider.default_base_url().to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client,
            provider: config.provider,
            base_url,
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            max_retries: config.max_retries,
        })
    }

    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    async fn complete_once(&self, prompt: &PromptSpec) -> Result<String> {
        match self.provider {
            LlmProvider::OpenAi => self.openai(prompt).await,
            LlmProvider::Anthropic => self.anthropic(prompt).await,
            LlmProvider::Ollama => self.ollama(prompt).await,
        }
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_ref()
            .map(|key| key.expose_secret())
            .ok_or_else(|| anyhow!("{} provider requires an api key", self.provider.as_str()))
    }

    async fn openai(&self, prompt: &PromptSpec) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: chat_messages(prompt),
            stream: None,
            max_tokens: Some(MAX_OUTPUT_TOKENS),
        };
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key()?)
            .json(&request)
            .send()
            .await?;
        let response = check_status("openai", response).await?;

        let body: OpenAiResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("openai response contained no message content"))
    }

    async fn anthropic(&self, prompt: &PromptSpec) -> Result<String> {
        let request = AnthropicRequest {
            model: &self.model,
            max_tokens: MAX_OUTPUT_TOKENS,
            system: &prompt.system,
            messages: vec![ChatMessage { role: "user", content: &prompt.user }],
        };
        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", self.api_key()?)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await?;
        let response = check_status("anthropic", response).await?;

        let body: AnthropicResponse = response.json().await?;
        if let Some(error) = body.error {
            bail!("anthropic error: {}", error.message);
        }
        let text = body
            .content
            .unwrap_or_default()
            .into_iter()
            .filter(|block| block.content_type.as_deref() == Some("text"))
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");
        if text.trim().is_empty() {
            bail!("anthropic response contained no text");
        }
        Ok(text)
    }

    async fn ollama(&self, prompt: &PromptSpec) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: chat_messages(prompt),
            stream: Some(false),
            max_tokens: None,
        };
        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await?;
        let response = check_status("ollama", response).await?;

        let body: OllamaResponse = response.json().await?;
        Ok(body.message.content)
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, prompt: &PromptSpec) -> Result<String> {
        let mut attempt = 0;
        loop {
            debug!(
                event_name = "llm.request",
                provider = self.provider.as_str(),
                purpose = prompt.purpose.as_str(),
                attempt,
                "sending completion request"
            );
            match self.complete_once(prompt).await {
                Ok(text) => return Ok(text),
                Err(error) if attempt < self.max_retries => {
                    warn!(
                        event_name = "llm.retry",
                        provider = self.provider.as_str(),
                        attempt,
                        error = %error,
                        "completion failed, retrying"
                    );
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

async fn check_status(provider: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    bail!("{provider} API error: {status} - {body}")
}

fn chat_messages(prompt: &PromptSpec) -> Vec<ChatMessage<'_>> {
    vec![
        ChatMessage { role: "system", content: &prompt.system },
        ChatMessage { role: "user", content: &prompt.user },
    ]
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Option<Vec<AnthropicContent>>,
    error: Option<AnthropicError>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    #[serde(rename = "type")]
    content_type: Option<String>,
    text: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicError {
    message: String,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
}

#[derive(Deserialize)]
struct OllamaMessage {
    content: String,
}
