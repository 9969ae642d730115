use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::generator::TextGenerator;
use super::GenerationError;
use crate::config::GenerationConfig;
use crate::pipeline::extraction::{ExtractionError, VisionClient};

/// Ollama HTTP client for local inference (`/api/generate`).
///
/// Serves both reply stages and, with a vision model, page recognition.
pub struct OllamaClient {
    base_url: String,
    model: String,
    temperature: f32,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
    recognition_timeout_secs: u64,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Result<Self, GenerationError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| GenerationError::Configuration(format!("HTTP client setup failed: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            temperature: 0.7,
            client,
            timeout_secs,
            recognition_timeout_secs: timeout_secs,
        })
    }

    pub fn from_config(config: &GenerationConfig) -> Result<Self, GenerationError> {
        Ok(Self::new(&config.base_url, &config.model, config.timeout_secs)?
            .with_temperature(config.temperature))
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Per-page deadline for vision calls, independent of the reply timeout.
    pub fn with_recognition_timeout(mut self, secs: u64) -> Self {
        self.recognition_timeout_secs = secs;
        self
    }

    fn post_generate(
        &self,
        body: &OllamaGenerateRequest<'_>,
        timeout_secs: u64,
    ) -> Result<String, GenerationError> {
        let url = format!("{}/api/generate", self.base_url);
        let response = self
            .client
            .post(&url)
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

        let parsed: OllamaGenerateResponse = read_json(response, timeout_secs)?;
        Ok(parsed.response)
    }
}

pub(crate) fn send_error(e: reqwest::Error, base_url: &str, timeout_secs: u64) -> GenerationError {
    if e.is_connect() {
        GenerationError::Connection(format!("cannot connect to {base_url}"))
    } else if e.is_timeout() {
        GenerationError::Timeout(timeout_secs)
    } else {
        GenerationError::Connection(e.to_string())
    }
}

/// Decode a JSON body. The request deadline still runs while the body
/// streams in, so a stalled body is a timeout rather than a parse error.
pub(crate) fn read_json<T: DeserializeOwned>(
    response: reqwest::blocking::Response,
    timeout_secs: u64,
) -> Result<T, GenerationError> {
    response.json().map_err(|e| {
        if e.is_timeout() {
            GenerationError::Timeout(timeout_secs)
        } else {
            GenerationError::ResponseParsing(e.to_string())
        }
    })
}

/// Request body for Ollama /api/generate
#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<Vec<&'a str>>,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Response body from Ollama /api/generate
#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

impl TextGenerator for OllamaClient {
    fn complete(&self, system: &str, user: &str) -> Result<String, GenerationError> {
        let body = OllamaGenerateRequest {
            model: &self.model,
            prompt: user,
            system,
            stream: false,
            images: None,
            options: OllamaOptions {
                temperature: self.temperature,
            },
        };
        self.post_generate(&body, self.timeout_secs)
    }
}

impl VisionClient for OllamaClient {
    fn transcribe_image(
        &self,
        model: &str,
        system: &str,
        prompt: &str,
        image_base64: &str,
    ) -> Result<String, ExtractionError> {
        let body = OllamaGenerateRequest {
            model,
            prompt,
            system,
            stream: false,
            images: Some(vec![image_base64]),
            // Transcription should be literal.
            options: OllamaOptions { temperature: 0.0 },
        };
        self.post_generate(&body, self.recognition_timeout_secs)
            .map_err(recognition_error)
    }
}

/// Deadline overruns fail the document; everything else means the
/// recognition capability is unusable and extraction degrades.
pub(crate) fn recognition_error(err: GenerationError) -> ExtractionError {
    match err {
        GenerationError::Timeout(secs) => {
            ExtractionError::MalformedDocument(format!("page recognition timed out after {secs}s"))
        }
        other => ExtractionError::RecognitionUnavailable(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructor_trims_trailing_slash() {
        let client = OllamaClient::new("http://localhost:11434/", "llama3.1:8b", 60).unwrap();
        assert_eq!(client.base_url, "http://localhost:11434");
        assert_eq!(client.timeout_secs, 60);
        assert_eq!(client.recognition_timeout_secs, 60);
    }

    #[test]
    fn from_config_carries_model_and_temperature() {
        let config = GenerationConfig {
            model: "mistral".into(),
            temperature: 0.2,
            ..GenerationConfig::default()
        };
        let client = OllamaClient::from_config(&config)
            .unwrap()
            .with_recognition_timeout(90);
        assert_eq!(client.model, "mistral");
        assert!((client.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(client.recognition_timeout_secs, 90);
    }

    #[test]
    fn request_omits_images_for_text() {
        let body = OllamaGenerateRequest {
            model: "m",
            prompt: "p",
            system: "s",
            stream: false,
            images: None,
            options: OllamaOptions { temperature: 0.5 },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("images").is_none());
        assert_eq!(json["options"]["temperature"], 0.5);
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn request_carries_images_for_vision() {
        let body = OllamaGenerateRequest {
            model: "llava",
            prompt: "p",
            system: "s",
            stream: false,
            images: Some(vec!["AQID"]),
            options: OllamaOptions { temperature: 0.0 },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["images"][0], "AQID");
    }

    /// Serve one response whose headers arrive but whose body never finishes.
    fn stalled_body_server() -> String {
        use std::io::{Read, Write};
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 8192];
                let _ = stream.read(&mut buf);
                let _ = stream.write_all(
                    b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 1000\r\n\r\n{\"response\": \"par",
                );
                let _ = stream.flush();
                std::thread::sleep(Duration::from_secs(4));
            }
        });
        format!("http://{addr}")
    }

    #[test]
    fn stalled_body_is_a_recognition_timeout() {
        let base_url = stalled_body_server();
        let client = OllamaClient {
            client: reqwest::blocking::Client::builder().no_proxy().build().unwrap(),
            ..OllamaClient::new(&base_url, "llava", 1).unwrap()
        };

        let err = client
            .transcribe_image("llava", "sys", "read", "AQID")
            .unwrap_err();
        assert!(matches!(err, ExtractionError::MalformedDocument(_)), "got {err:?}");
    }

    #[test]
    fn connection_error_names_the_target() {
        assert_eq!(
            GenerationError::Connection("cannot connect to http://localhost:11434".into())
                .to_string(),
            "Generation service unreachable: cannot connect to http://localhost:11434"
        );
    }

    #[test]
    fn timeout_maps_to_malformed_document() {
        assert!(matches!(
            recognition_error(GenerationError::Timeout(120)),
            ExtractionError::MalformedDocument(_)
        ));
        assert!(matches!(
            recognition_error(GenerationError::Api {
                status: 404,
                body: "model not found".into()
            }),
            ExtractionError::RecognitionUnavailable(_)
        ));
    }
}
