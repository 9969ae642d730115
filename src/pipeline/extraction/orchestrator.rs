use std::time::Instant;

use super::types::{
    count_words, ExtractedText, ExtractionSource, PageRenderer, PdfExtractor, RawDocument,
    Recognizer,
};
use super::ExtractionError;
use crate::config::ExtractionConfig;

/// Turns PDF bytes into raw text, choosing between the direct text layer and
/// page-by-page recognition.
///
/// Capabilities are trait objects so tests can inject mocks. Renderer and
/// recognizer are optional: without them, sparse documents keep their
/// direct text.
pub struct DocumentExtractor {
    pdf_extractor: Box<dyn PdfExtractor + Send + Sync>,
    page_renderer: Option<Box<dyn PageRenderer + Send + Sync>>,
    recognizer: Option<Box<dyn Recognizer + Send + Sync>>,
    words_per_page_threshold: usize,
    render_dpi: u32,
}

impl DocumentExtractor {
    pub fn new(pdf_extractor: Box<dyn PdfExtractor + Send + Sync>, config: &ExtractionConfig) -> Self {
        Self {
            pdf_extractor,
            page_renderer: None,
            recognizer: None,
            words_per_page_threshold: config.ocr_words_per_page_threshold,
            render_dpi: config.render_dpi,
        }
    }

    /// Enable recognition of sparse (scanned) documents.
    pub fn with_recognition(
        mut self,
        renderer: Box<dyn PageRenderer + Send + Sync>,
        recognizer: Box<dyn Recognizer + Send + Sync>,
    ) -> Self {
        self.page_renderer = Some(renderer);
        self.recognizer = Some(recognizer);
        self
    }

    pub fn recognition_enabled(&self) -> bool {
        self.page_renderer.is_some() && self.recognizer.is_some()
    }

    /// Extract raw (un-normalized) text from PDF bytes.
    ///
    /// Fails with `MalformedDocument` when the bytes are not a page-structured
    /// document or recognition overruns its deadline. A missing recognition
    /// capability only degrades to the direct text layer.
    pub fn extract(&self, pdf_bytes: &[u8]) -> Result<ExtractedText, ExtractionError> {
        let start = Instant::now();
        let pages = self.pdf_extractor.extract_pages(pdf_bytes)?;
        let document = RawDocument {
            bytes: pdf_bytes,
            page_count: pages.len(),
        };

        let direct_text = pages.join("\n");
        let direct_words = count_words(&direct_text);
        let words_per_page = direct_words as f64 / document.page_count.max(1) as f64;

        tracing::info!(
            pages = document.page_count,
            direct_words,
            words_per_page,
            size_bytes = pdf_bytes.len(),
            "Starting text extraction"
        );

        let (content, source) = if words_per_page < self.words_per_page_threshold as f64 {
            match self.recognize_pages(&document) {
                Ok(ocr_text) => choose_longer(direct_text, ocr_text),
                Err(ExtractionError::RecognitionUnavailable(reason)) => {
                    tracing::warn!(
                        reason = %reason,
                        "Sparse text layer but recognition unavailable, keeping direct text"
                    );
                    (direct_text, ExtractionSource::DirectText)
                }
                Err(e) => return Err(e),
            }
        } else {
            (direct_text, ExtractionSource::DirectText)
        };

        let extracted = ExtractedText::new(content, source, document.page_count);
        tracing::info!(
            source = ?extracted.source,
            words = extracted.word_count,
            pages = extracted.page_count,
            elapsed_ms = %start.elapsed().as_millis(),
            "Text extraction complete"
        );
        Ok(extracted)
    }

    /// Render and recognize each page in order, joining results with newlines.
    fn recognize_pages(&self, document: &RawDocument<'_>) -> Result<String, ExtractionError> {
        let (Some(renderer), Some(recognizer)) = (&self.page_renderer, &self.recognizer) else {
            return Err(ExtractionError::RecognitionUnavailable(
                "no page renderer or recognizer configured".into(),
            ));
        };

        let mut texts = Vec::with_capacity(document.page_count);
        for page_index in 0..document.page_count {
            let _span = tracing::info_span!("recognize_page", page = page_index + 1).entered();

            // The text layer already parsed, so any render failure only costs this page.
            let image = match renderer.render_page(document.bytes, page_index, self.render_dpi) {
                Ok(image) => image,
                Err(e) => {
                    tracing::warn!(page = page_index + 1, error = %e, "Page render failed, skipping");
                    texts.push(String::new());
                    continue;
                }
            };

            texts.push(recognizer.recognize(&image)?);
        }

        Ok(texts.join("\n"))
    }
}

/// Recognition output wins only when it carries more text than the direct
/// layer; otherwise recognition noise would displace a legitimately short
/// document.
fn choose_longer(direct_text: String, ocr_text: String) -> (String, ExtractionSource) {
    let direct_len = direct_text.trim().chars().count();
    let ocr_len = ocr_text.trim().chars().count();
    if ocr_len > direct_len {
        tracing::debug!(direct_len, ocr_len, "Recognition text selected");
        (ocr_text, ExtractionSource::ImageRecognition)
    } else {
        tracing::debug!(direct_len, ocr_len, "Direct text kept over recognition");
        (direct_text, ExtractionSource::DirectText)
    }
}
