pub mod types;
pub mod sanitize;
pub mod pdf;
pub mod pdfium;
pub mod recognition;
pub mod orchestrator;

pub use types::*;
pub use sanitize::*;
pub use pdf::*;
pub use pdfium::*;
pub use recognition::*;
pub use orchestrator::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    /// The byte stream is not a page-structured document. Not retried.
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    /// Recognition capability missing or misconfigured. The extractor
    /// absorbs this and keeps the direct text layer.
    #[error("Recognition unavailable: {0}")]
    RecognitionUnavailable(String),

    #[error("Failed to render page {page}: {reason}")]
    Rendering { page: usize, reason: String },

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
