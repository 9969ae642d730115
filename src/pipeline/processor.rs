//! Reply orchestrator.
//!
//! Single entry point that drives the full pipeline:
//! extract → condense → draft → style.
//!
//! Engines are injected as trait objects so the orchestrator stays fully
//! testable with mock implementations. `ReplyAssistant::from_config` wires
//! the production engines.

use std::sync::Arc;

use serde::Serialize;

use crate::config::{AppConfig, ConfigError, GenerationBackend};
use crate::mailbox::{Mailbox, MailboxError, MessageId, MessageSummary};
use crate::pipeline::condense::{CondensedText, SalienceCondenser};
use crate::pipeline::extraction::{
    DocumentExtractor, ExtractionError, ExtractionSource, PdfTextExtractor, PdfiumRenderer,
    VisionClient, VisionRecognizer,
};
use crate::pipeline::reply::{
    GenerationError, OllamaClient, OpenAiClient, ReplyResult, ReplySynthesizer, TextGenerator,
};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Reply generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("Mailbox error: {0}")]
    Mailbox(#[from] MailboxError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// A PDF after extraction and condensation.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedDocument {
    pub source: ExtractionSource,
    pub page_count: usize,
    pub word_count: usize,
    pub condensed: CondensedText,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentReply {
    pub reply: ReplyResult,
    /// Present when a PDF was supplied.
    pub document: Option<ProcessedDocument>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThreadReply {
    pub reply: ReplyResult,
    pub thread: Vec<MessageSummary>,
    pub attachment_filename: Option<String>,
    pub document: Option<CondensedText>,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct ReplyAssistant {
    extractor: DocumentExtractor,
    condenser: SalienceCondenser,
    synthesizer: ReplySynthesizer,
}

impl ReplyAssistant {
    pub fn new(
        extractor: DocumentExtractor,
        condenser: SalienceCondenser,
        synthesizer: ReplySynthesizer,
    ) -> Self {
        Self {
            extractor,
            condenser,
            synthesizer,
        }
    }

    /// Wire production engines from configuration.
    ///
    /// Recognition is enabled only when a vision model is configured and
    /// PDFium loads; otherwise sparse documents keep their text layer.
    pub fn from_config(config: &AppConfig) -> Result<Self, ProcessingError> {
        config.validate()?;
        let generation = &config.generation;
        let recognition_timeout = config.extraction.recognition_timeout_secs;

        let (generator, vision) = match generation.backend {
            GenerationBackend::Ollama => {
                let client = Arc::new(
                    OllamaClient::from_config(generation)?
                        .with_recognition_timeout(recognition_timeout),
                );
                (
                    client.clone() as Arc<dyn TextGenerator>,
                    client as Arc<dyn VisionClient>,
                )
            }
            GenerationBackend::OpenAi => {
                let client = Arc::new(
                    OpenAiClient::from_config(generation)?
                        .with_recognition_timeout(recognition_timeout),
                );
                (
                    client.clone() as Arc<dyn TextGenerator>,
                    client as Arc<dyn VisionClient>,
                )
            }
        };

        let mut extractor = DocumentExtractor::new(Box::new(PdfTextExtractor), &config.extraction);
        if let Some(model) = &generation.vision_model {
            match PdfiumRenderer::new(config.extraction.pdfium_library_path.as_deref()) {
                Ok(renderer) => {
                    let recognizer = VisionRecognizer::new(vision, model.clone());
                    tracing::info!(model = %recognizer.model(), "Page recognition enabled");
                    extractor = extractor.with_recognition(Box::new(renderer), Box::new(recognizer));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "PDFium unavailable, scanned pages will not be recognized");
                }
            }
        }

        tracing::info!(
            backend = ?generation.backend,
            model = %generation.model,
            strategy = %config.condense.strategy,
            "Reply assistant ready"
        );
        Ok(Self::new(
            extractor,
            SalienceCondenser::new(&config.condense),
            ReplySynthesizer::new(generator, config.style.clone()),
        ))
    }

    /// Extract and condense a PDF.
    pub fn process_document(&self, pdf_bytes: &[u8]) -> Result<ProcessedDocument, ProcessingError> {
        let extracted = self.extractor.extract(pdf_bytes)?;
        let condensed = self.condenser.condense(&extracted.content);
        Ok(ProcessedDocument {
            source: extracted.source,
            page_count: extracted.page_count,
            word_count: extracted.word_count,
            condensed,
        })
    }

    /// Reply to pasted email text with an optional uploaded PDF.
    pub fn reply_with_document(
        &self,
        email_text: &str,
        pdf_bytes: Option<&[u8]>,
    ) -> Result<DocumentReply, ProcessingError> {
        let document = pdf_bytes
            .map(|bytes| self.process_document(bytes))
            .transpose()?;
        let context = document
            .as_ref()
            .map(|d| d.condensed.content.as_str())
            .filter(|c| !c.trim().is_empty());

        let reply = self.synthesizer.synthesize(email_text, context)?;
        Ok(DocumentReply { reply, document })
    }

    /// Reply to a mailbox message using its whole thread as context and its
    /// first PDF attachment, if any, as document context.
    pub fn reply_to_message(
        &self,
        mailbox: &dyn Mailbox,
        message: &MessageSummary,
    ) -> Result<ThreadReply, ProcessingError> {
        let thread = mailbox.get_thread(&message.thread_id)?;
        let email_text = thread_context(&thread, &message.snippet);

        let (attachment_filename, document) = match message.first_pdf() {
            Some(attachment) => {
                let bytes = mailbox.get_attachment(&message.id, &attachment.id)?;
                tracing::info!(
                    message_id = %message.id,
                    size_bytes = bytes.len(),
                    "Processing PDF attachment"
                );
                let processed = self.process_document(&bytes)?;
                (Some(attachment.filename.clone()), Some(processed.condensed))
            }
            None => (None, None),
        };

        let context = document
            .as_ref()
            .map(|d| d.content.as_str())
            .filter(|c| !c.trim().is_empty());
        let reply = self.synthesizer.synthesize(&email_text, context)?;

        Ok(ThreadReply {
            reply,
            thread,
            attachment_filename,
            document,
        })
    }

    pub fn send_reply(
        &self,
        mailbox: &dyn Mailbox,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<MessageId, ProcessingError> {
        Ok(mailbox.send(to, subject, body)?)
    }
}

/// Thread snippets oldest first, then the message being answered.
pub fn thread_context(thread: &[MessageSummary], latest_snippet: &str) -> String {
    let mut text = String::from("Email Thread Context:\n");
    for message in thread {
        text.push_str("\n---\n");
        text.push_str(&message.snippet);
    }
    text.push_str("\n\nLatest Message:\n");
    text.push_str(latest_snippet);
    text
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CondenseConfig, ExtractionConfig};
    use crate::mailbox::{AttachmentRef, InMemoryMailbox};
    use crate::pipeline::condense::CondenseStrategy;
    use crate::pipeline::extraction::{MockPageRenderer, MockPdfExtractor, MockRecognizer};
    use crate::pipeline::reply::{MockTextGenerator, StageRole, StyleProfile};

    fn assistant(pages: &[&str], generator: Arc<MockTextGenerator>) -> ReplyAssistant {
        ReplyAssistant::new(
            DocumentExtractor::new(
                Box::new(MockPdfExtractor::with_pages(pages)),
                &ExtractionConfig::default(),
            ),
            SalienceCondenser::new(&CondenseConfig::default()),
            ReplySynthesizer::new(generator, StyleProfile::default()),
        )
    }

    fn message(id: &str, snippet: &str, attachments: Vec<AttachmentRef>) -> MessageSummary {
        MessageSummary {
            id: id.into(),
            thread_id: "t1".into(),
            subject: "Contract".into(),
            from: "ana@example.com".into(),
            snippet: snippet.into(),
            attachments,
        }
    }

    #[test]
    fn thread_context_layout() {
        let thread = vec![message("m1", "First note", vec![]), message("m2", "Follow-up", vec![])];
        assert_eq!(
            thread_context(&thread, "Follow-up"),
            "Email Thread Context:\n\n---\nFirst note\n---\nFollow-up\n\nLatest Message:\nFollow-up"
        );
    }

    #[test]
    fn reply_without_document() {
        let mock = Arc::new(MockTextGenerator::new("Sounds good."));
        let result = assistant(&[], mock.clone())
            .reply_with_document("Lunch Tuesday?", None)
            .unwrap();

        assert!(result.document.is_none());
        assert_eq!(result.reply.final_reply, "Sounds good.");
        assert!(!mock.seen()[0].1.contains("Additional context"));
    }

    #[test]
    fn reply_with_document_passes_condensed_text() {
        let mock = Arc::new(MockTextGenerator::new("ok"));
        let result = assistant(&["Invoice 42 total 310 EUR due March"], mock.clone())
            .reply_with_document("Please confirm the invoice.", Some(b"%PDF"))
            .unwrap();

        let document = result.document.unwrap();
        assert_eq!(document.condensed.strategy, CondenseStrategy::Verbatim);
        assert_eq!(document.page_count, 1);
        assert!(mock.seen()[0]
            .1
            .contains("Additional context from attached PDF:\nInvoice 42 total 310 EUR due March"));
    }

    #[test]
    fn empty_document_adds_no_context() {
        let mock = Arc::new(MockTextGenerator::new("ok"));
        let result = assistant(&["", ""], mock.clone())
            .reply_with_document("Scan attached", Some(b"%PDF"))
            .unwrap();

        assert!(result.document.unwrap().condensed.is_empty());
        assert!(!mock.seen()[0].1.contains("Additional context"));
    }

    #[test]
    fn extraction_failure_stops_before_generation() {
        struct Broken;
        impl crate::pipeline::extraction::PdfExtractor for Broken {
            fn extract_pages(&self, _: &[u8]) -> Result<Vec<String>, ExtractionError> {
                Err(ExtractionError::MalformedDocument("not a pdf".into()))
            }
        }

        let mock = Arc::new(MockTextGenerator::new("unused"));
        let assistant = ReplyAssistant::new(
            DocumentExtractor::new(Box::new(Broken), &ExtractionConfig::default()),
            SalienceCondenser::new(&CondenseConfig::default()),
            ReplySynthesizer::new(mock.clone(), StyleProfile::default()),
        );

        let err = assistant
            .reply_with_document("hi", Some(b"garbage"))
            .unwrap_err();
        assert!(matches!(
            err,
            ProcessingError::Extraction(ExtractionError::MalformedDocument(_))
        ));
        assert_eq!(mock.calls(), 0);
    }

    #[test]
    fn generation_failure_surfaces_with_stage() {
        let mock = Arc::new(MockTextGenerator::failing("connection refused"));
        let err = assistant(&[], mock)
            .reply_with_document("hi", None)
            .unwrap_err();
        match err {
            ProcessingError::Generation(e) => assert_eq!(e.stage_role(), Some(StageRole::Writer)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn reply_to_message_uses_thread_and_first_pdf() {
        let attachments = vec![
            AttachmentRef {
                id: "a0".into(),
                filename: "photo.jpg".into(),
            },
            AttachmentRef {
                id: "a1".into(),
                filename: "Quote.pdf".into(),
            },
        ];
        let latest = message("m2", "Any update on the quote?", attachments);
        let mailbox = InMemoryMailbox::new()
            .with_message(message("m1", "Sending the quote soon", vec![]), false)
            .with_message(latest.clone(), true)
            .with_attachment("m2", "a1", b"%PDF-1.4".to_vec());

        let mock = Arc::new(MockTextGenerator::new("Thanks, reviewing now."));
        let result = assistant(&["Quote total 1200 USD"], mock.clone())
            .reply_to_message(&mailbox, &latest)
            .unwrap();

        assert_eq!(result.attachment_filename.as_deref(), Some("Quote.pdf"));
        assert_eq!(result.thread.len(), 2);
        assert_eq!(result.document.unwrap().content, "Quote total 1200 USD");

        let draft_input = &mock.seen()[0].1;
        assert!(draft_input.contains("Email Thread Context:\n\n---\nSending the quote soon"));
        assert!(draft_input.contains("\n\nLatest Message:\nAny update on the quote?"));
        assert!(draft_input.contains("Additional context from attached PDF:\nQuote total 1200 USD"));
    }

    #[test]
    fn missing_attachment_is_mailbox_error() {
        let latest = message(
            "m1",
            "See attached",
            vec![AttachmentRef {
                id: "gone".into(),
                filename: "a.pdf".into(),
            }],
        );
        let mailbox = InMemoryMailbox::new().with_message(latest.clone(), true);
        let err = assistant(&[], Arc::new(MockTextGenerator::new("ok")))
            .reply_to_message(&mailbox, &latest)
            .unwrap_err();
        assert!(matches!(err, ProcessingError::Mailbox(MailboxError::AttachmentNotFound { .. })));
    }

    #[test]
    fn scanned_attachment_goes_through_recognition() {
        let ocr_text = (0..120).map(|i| format!("line{i}")).collect::<Vec<_>>().join(" ");
        let mock = Arc::new(MockTextGenerator::new("ok"));
        let assistant = ReplyAssistant::new(
            DocumentExtractor::new(
                Box::new(MockPdfExtractor::with_pages(&[""])),
                &ExtractionConfig::default(),
            )
            .with_recognition(
                Box::new(MockPageRenderer::new(1)),
                Box::new(MockRecognizer::new(&ocr_text)),
            ),
            SalienceCondenser::new(&CondenseConfig::default()),
            ReplySynthesizer::new(mock, StyleProfile::default()),
        );

        let document = assistant.process_document(b"%PDF").unwrap();
        assert_eq!(document.source, ExtractionSource::ImageRecognition);
        assert_eq!(document.word_count, 120);
    }

    #[test]
    fn send_reply_delegates_to_mailbox() {
        let mailbox = InMemoryMailbox::new();
        let id = assistant(&[], Arc::new(MockTextGenerator::new("ok")))
            .send_reply(&mailbox, "ana@example.com", "Re: Contract", "Signed copy attached.")
            .unwrap();
        assert_eq!(id, "sent-1");
        assert_eq!(mailbox.sent()[0].subject, "Re: Contract");
    }

    #[test]
    fn from_config_rejects_invalid_configuration() {
        let mut config = AppConfig::default();
        config.condense.max_units = 0;
        assert!(matches!(
            ReplyAssistant::from_config(&config),
            Err(ProcessingError::Config(_))
        ));
    }

    #[test]
    fn from_config_builds_without_vision_model() {
        assert!(ReplyAssistant::from_config(&AppConfig::default()).is_ok());
    }
}
