use std::panic::{self, AssertUnwindSafe};

use super::types::PdfExtractor;
use super::ExtractionError;

/// PDF text-layer extractor using the pdf-extract crate.
/// Handles digital PDFs; scanned pages come back empty or near-empty.
pub struct PdfTextExtractor;

impl PdfExtractor for PdfTextExtractor {
    fn extract_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
        // pdf-extract panics on some broken xref tables instead of erroring.
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem_by_pages(pdf_bytes)
        }));

        match result {
            Ok(Ok(pages)) => {
                tracing::debug!(pages = pages.len(), "Direct text layer extracted");
                Ok(pages)
            }
            Ok(Err(e)) => Err(ExtractionError::MalformedDocument(e.to_string())),
            Err(_) => Err(ExtractionError::MalformedDocument(
                "PDF parser aborted on malformed input".into(),
            )),
        }
    }
}

/// PDF extractor returning fixed pages regardless of input.
pub struct MockPdfExtractor {
    pages: Vec<String>,
}

impl MockPdfExtractor {
    pub fn with_pages(pages: &[&str]) -> Self {
        Self {
            pages: pages.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl PdfExtractor for MockPdfExtractor {
    fn extract_pages(&self, _pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
        Ok(self.pages.clone())
    }
}
