use serde::{Deserialize, Serialize};

use super::ExtractionError;

/// An incoming attachment, borrowed for the duration of one extraction.
#[derive(Debug, Clone, Copy)]
pub struct RawDocument<'a> {
    pub bytes: &'a [u8],
    pub page_count: usize,
}

/// Which extraction path produced the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionSource {
    DirectText,
    ImageRecognition,
}

/// Raw text pulled out of a PDF, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedText {
    pub content: String,
    pub source: ExtractionSource,
    pub word_count: usize,
    pub page_count: usize,
}

impl ExtractedText {
    pub fn new(content: String, source: ExtractionSource, page_count: usize) -> Self {
        let word_count = count_words(&content);
        Self {
            content,
            source,
            word_count,
            page_count,
        }
    }
}

/// Whitespace-delimited word count.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Direct text-layer extraction, one string per page.
pub trait PdfExtractor {
    fn extract_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractionError>;
}

/// Renders a single PDF page to PNG bytes.
pub trait PageRenderer {
    /// `page_index` is zero-based.
    fn render_page(
        &self,
        pdf_bytes: &[u8],
        page_index: usize,
        dpi: u32,
    ) -> Result<Vec<u8>, ExtractionError>;
}

/// External recognition capability (OCR as a black box).
///
/// Unreadable input yields `Ok(String::new())`. Errors are reserved for a
/// missing capability (`RecognitionUnavailable`) or a deadline overrun
/// (`MalformedDocument`).
pub trait Recognizer {
    fn recognize(&self, page_image: &[u8]) -> Result<String, ExtractionError>;
}
