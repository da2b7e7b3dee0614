use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Config;

pub const FALLBACK_REPLY: &str = "Sorry, I couldn't get an answer right now.";

#[async_trait]
pub trait ReplyEngine: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

pub struct PromptInput<'a> {
    pub message: &'a str,
    pub history: &'a str,
    pub web_context: &'a str,
    pub attachment_text: &'a str,
}

pub fn build_prompt(input: &PromptInput<'_>) -> String {
    format!(
        "You are ASK AI, a friendly conversational assistant.\n\
         Match the tone to the question: light and playful for casual questions, \
         clear and concise for factual or technical ones.\n\
         Use the conversation for context, the web results only to verify or update facts, \
         and the attached file only when it is relevant. Keep answers short.\n\n\
         Conversation (most recent first):\n{}\n\n\
         Web results:\n{}\n\n\
         Attached file:\n{}\n\n\
         User question: {}\n",
        input.history, input.web_context, input.attachment_text, input.message
    )
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

/// Gemini `generateContent` over HTTP.
#[derive(Clone, Debug)]
pub struct GeminiEngine {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiEngine {
    pub fn from_config(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.gemini_base_url.trim_end_matches('/').to_string(),
            model: config.gemini_model.clone(),
            api_key: config.gemini_api_key.clone(),
        }
    }
}

#[async_trait]
impl ReplyEngine for GeminiEngine {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .context("GEMINI_API_KEY is not set")?;
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);
        let body = GenerateRequest {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("request to {} failed", url))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            bail!("Gemini returned {}: {}", status, detail);
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .context("malformed Gemini response")?;
        Ok(parsed.text().trim().to_string())
    }
}
