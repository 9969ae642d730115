use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};

use super::generator::TextGenerator;
use super::ollama::{read_json, recognition_error, send_error};
use super::GenerationError;
use crate::config::GenerationConfig;
use crate::pipeline::extraction::{ExtractionError, VisionClient};

pub const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Client for OpenAI-compatible `/chat/completions` endpoints.
pub struct OpenAiClient {
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
    recognition_timeout_secs: u64,
}

impl OpenAiClient {
    pub fn new(base_url: &str, model: &str, api_key: &str, timeout_secs: u64) -> Result<Self, GenerationError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| GenerationError::Configuration(format!("HTTP client setup failed: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
            temperature: 0.7,
            client,
            timeout_secs,
            recognition_timeout_secs: timeout_secs,
        })
    }

    /// Requires `api_key`. A `base_url` left at the local Ollama default is
    /// replaced by the public OpenAI endpoint.
    pub fn from_config(config: &GenerationConfig) -> Result<Self, GenerationError> {
        let api_key = config.api_key.as_deref().ok_or_else(|| {
            GenerationError::Configuration("no api_key configured for the openai backend".into())
        })?;
        let base_url = if config.base_url == GenerationConfig::default().base_url {
            OPENAI_DEFAULT_BASE_URL
        } else {
            config.base_url.as_str()
        };
        Ok(Self::new(base_url, &config.model, api_key, config.timeout_secs)?
            .with_temperature(config.temperature))
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_recognition_timeout(mut self, secs: u64) -> Self {
        self.recognition_timeout_secs = secs;
        self
    }

    fn chat(&self, body: &Value, timeout_secs: u64) -> Result<String, GenerationError> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(timeout_secs))
            .json(body)
            .send()
            .map_err(|e| send_error(e, &self.base_url, timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatCompletionResponse = read_json(response, timeout_secs)?;
        first_choice(parsed)
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

fn first_choice(response: ChatCompletionResponse) -> Result<String, GenerationError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or(GenerationError::EmptyResponse)
}

fn text_request(model: &str, system: &str, user: &str, temperature: f32) -> Value {
    json!({
        "model": model,
        "temperature": temperature,
        "messages": [
            {"role": "system", "content": system},
            {"role": "user", "content": user},
        ],
    })
}

fn vision_request(model: &str, system: &str, prompt: &str, image_base64: &str) -> Value {
    json!({
        "model": model,
        "temperature": 0.0,
        "messages": [
            {"role": "system", "content": system},
            {"role": "user", "content": [
                {"type": "text", "text": prompt},
                {"type": "image_url", "image_url": {"url": format!("data:image/png;base64,{image_base64}")}},
            ]},
        ],
    })
}

impl TextGenerator for OpenAiClient {
    fn complete(&self, system: &str, user: &str) -> Result<String, GenerationError> {
        let body = text_request(&self.model, system, user, self.temperature);
        self.chat(&body, self.timeout_secs)
    }
}

impl VisionClient for OpenAiClient {
    fn transcribe_image(
        &self,
        model: &str,
        system: &str,
        prompt: &str,
        image_base64: &str,
    ) -> Result<String, ExtractionError> {
        let body = vision_request(model, system, prompt, image_base64);
        self.chat(&body, self.recognition_timeout_secs)
            .map_err(recognition_error)
    }
}
