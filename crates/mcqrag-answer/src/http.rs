//! OpenAI-compatible chat completions client.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use mcqrag_core::config::GenerationSettings;
use mcqrag_core::traits::Generator;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

pub struct HttpGenerator {
    client: Client,
    url: String,
    settings: GenerationSettings,
}

impl HttpGenerator {
    pub fn new(settings: &GenerationSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .context("building HTTP client")?;
        let url = format!("{}/chat/completions", settings.endpoint.trim_end_matches('/'));
        Ok(Self { client, url, settings: settings.clone() })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    fn generator_id(&self) -> String {
        format!("openai-chat:{}", self.settings.model)
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.settings.model,
            messages: [ChatMessage { role: "user", content: prompt }],
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            seed: self.settings.seed,
        };
        let mut request = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.settings.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await.with_context(|| format!("POST {}", self.url))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("generation service returned {status}: {}", text.trim());
        }
        let parsed: ChatResponse = response.json().await.context("decoding chat completion")?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("chat completion has no message content"))
    }
}
