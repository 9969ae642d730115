//! Recognition capability: page bitmap in, text out.
//!
//! The production engine asks a vision-capable model to transcribe the page
//! (`VisionRecognizer`). The model transport lives behind `VisionClient` so
//! the extraction layer stays independent of the generation backends.

use std::sync::Arc;
use std::time::Instant;

use base64::Engine as _;

use super::types::Recognizer;
use super::ExtractionError;

const RECOGNITION_SYSTEM_PROMPT: &str = "\
You are a document transcription engine. Extract ALL visible text from the \
provided page image in natural reading order. Output only the text itself, \
with no commentary, no descriptions of images and no Markdown fences.";

const RECOGNITION_USER_PROMPT: &str = "Transcribe every word of text on this page.";

/// Transport for image-conditioned generation.
///
/// Implementations map their own failures onto the recognition taxonomy:
/// unreachable service or unknown model → `RecognitionUnavailable`,
/// deadline overrun → `MalformedDocument`.
pub trait VisionClient: Send + Sync {
    fn transcribe_image(
        &self,
        model: &str,
        system: &str,
        prompt: &str,
        image_base64: &str,
    ) -> Result<String, ExtractionError>;
}

/// Recognizer backed by a vision model.
pub struct VisionRecognizer {
    client: Arc<dyn VisionClient>,
    model: String,
}

impl VisionRecognizer {
    pub fn new(client: Arc<dyn VisionClient>, model: String) -> Self {
        Self { client, model }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl Recognizer for VisionRecognizer {
    fn recognize(&self, page_image: &[u8]) -> Result<String, ExtractionError> {
        if page_image.is_empty() {
            return Ok(String::new());
        }

        let start = Instant::now();
        let encoded = base64::engine::general_purpose::STANDARD.encode(page_image);
        let raw = self.client.transcribe_image(
            &self.model,
            RECOGNITION_SYSTEM_PROMPT,
            RECOGNITION_USER_PROMPT,
            &encoded,
        )?;
        let text = strip_code_fences(&raw);

        tracing::debug!(
            model = %self.model,
            elapsed_ms = %start.elapsed().as_millis(),
            image_size = page_image.len(),
            text_len = text.len(),
            "Page recognized"
        );
        Ok(text)
    }
}

/// Vision models sometimes wrap the transcription in a Markdown fence.
fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    // Drop the info string (e.g. "text") on the opening fence line.
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
        .to_string()
}

/// Mock recognizer for tests: returns scripted text per call, in order.
/// Once the script runs out, the last entry repeats.
pub struct MockRecognizer {
    outputs: Vec<Result<String, String>>,
    calls: std::sync::atomic::AtomicUsize,
}

impl MockRecognizer {
    pub fn new(text: &str) -> Self {
        Self::scripted(vec![Ok(text.to_string())])
    }

    /// Every call fails with `RecognitionUnavailable`.
    pub fn unavailable(reason: &str) -> Self {
        Self::scripted(vec![Err(reason.to_string())])
    }

    pub fn scripted(outputs: Vec<Result<String, String>>) -> Self {
        Self {
            outputs,
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl Recognizer for MockRecognizer {
    fn recognize(&self, _page_image: &[u8]) -> Result<String, ExtractionError> {
        let n = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let entry = self
            .outputs
            .get(n)
            .or_else(|| self.outputs.last())
            .cloned()
            .unwrap_or_else(|| Ok(String::new()));
        entry.map_err(ExtractionError::RecognitionUnavailable)
    }
}
