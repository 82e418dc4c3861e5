use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use docqa_core::config::GenerationSettings;
use docqa_core::traits::Generator;

use crate::prompt::render_prompt;

pub struct OpenAiGenerator {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiGenerator {
    pub fn new(api_key: Option<String>, model: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            temperature: 0.7,
            max_tokens: 512,
        }
    }

    pub fn from_settings(settings: &GenerationSettings) -> Self {
        let mut g = Self::new(settings.api_key.clone(), settings.model.clone(), settings.base_url.clone());
        g.temperature = settings.temperature;
        g.max_tokens = settings.max_tokens;
        g
    }

    pub fn model(&self) -> &str { &self.model }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.header("Authorization", format!("Bearer {key}")),
            None => req,
        }
    }

    /// Model ids the endpoint exposes. Used as a connectivity check.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/v1/models", self.base_url);
        debug!("listing models at {}", url);
        let response = self.authorized(self.client.get(&url)).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("models endpoint returned {status}: {body}");
        }
        parse_model_ids(&response.json::<Value>().await?)
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    async fn generate(&self, question: &str, context: &str) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": render_prompt(question, context) }],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        debug!(model = %self.model, context_chars = context.chars().count(), "chat completion request");

        let response = self
            .authorized(self.client.post(&url))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("chat completion returned {status}: {body}");
        }
        parse_completion(&response.json::<Value>().await?)
    }
}

/// Pull `choices[0].message.content` out of a chat completion response.
pub fn parse_completion(resp: &Value) -> Result<String> {
    resp["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.trim().to_string())
        .ok_or_else(|| anyhow!("missing choices[0].message.content"))
}

pub fn parse_model_ids(resp: &Value) -> Result<Vec<String>> {
    let data = resp["data"].as_array().ok_or_else(|| anyhow!("models response has no data array"))?;
    Ok(data.iter().filter_map(|m| m["id"].as_str().map(str::to_string)).collect())
}
