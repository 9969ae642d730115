//! External mailbox collaborator.
//!
//! Listing, fetching and sending mail is delegated to whatever mail service
//! the host application talks to. The reply pipeline only depends on the
//! `Mailbox` trait; `InMemoryMailbox` backs tests and the CLI.

use std::collections::HashMap;
use std::sync::Mutex;

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type MessageId = String;

#[derive(Error, Debug)]
pub enum MailboxError {
    #[error("Message not found: {0}")]
    MessageNotFound(String),

    #[error("Attachment {attachment_id} not found on message {message_id}")]
    AttachmentNotFound {
        message_id: String,
        attachment_id: String,
    },

    #[error("Thread not found: {0}")]
    ThreadNotFound(String),

    #[error("Invalid header {field}: line breaks are not allowed")]
    InvalidHeader { field: &'static str },

    #[error("Mail service error: {0}")]
    Service(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub id: String,
    pub filename: String,
}

impl AttachmentRef {
    pub fn is_pdf(&self) -> bool {
        self.filename.to_ascii_lowercase().ends_with(".pdf")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSummary {
    pub id: MessageId,
    pub thread_id: String,
    pub subject: String,
    pub from: String,
    pub snippet: String,
    #[serde(default)]
    pub attachments: Vec<AttachmentRef>,
}

impl MessageSummary {
    pub fn first_pdf(&self) -> Option<&AttachmentRef> {
        self.attachments.iter().find(|a| a.is_pdf())
    }
}

pub trait Mailbox: Send + Sync {
    fn list_unread(&self) -> Result<Vec<MessageSummary>, MailboxError>;

    fn get_attachment(&self, message_id: &str, attachment_id: &str) -> Result<Vec<u8>, MailboxError>;

    fn send(&self, to: &str, subject: &str, body: &str) -> Result<MessageId, MailboxError>;

    /// Messages of a thread, oldest first.
    fn get_thread(&self, thread_id: &str) -> Result<Vec<MessageSummary>, MailboxError>;
}

/// RFC 822 plain-text message, base64url-encoded for mail APIs that take a
/// raw message.
pub fn compose_raw_message(to: &str, subject: &str, body: &str) -> Result<String, MailboxError> {
    if to.contains(['\r', '\n']) {
        return Err(MailboxError::InvalidHeader { field: "To" });
    }
    if subject.contains(['\r', '\n']) {
        return Err(MailboxError::InvalidHeader { field: "Subject" });
    }
    let message = format!(
        "To: {to}\r\nSubject: {subject}\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n{body}"
    );
    Ok(base64::engine::general_purpose::URL_SAFE.encode(message.as_bytes()))
}

// ── In-memory implementation ──────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub id: MessageId,
    pub to: String,
    pub subject: String,
    pub body: String,
    /// `compose_raw_message` output.
    pub raw: String,
}

/// Mailbox held entirely in memory.
#[derive(Default)]
pub struct InMemoryMailbox {
    messages: Vec<MessageSummary>,
    unread: Vec<MessageId>,
    attachments: HashMap<(String, String), Vec<u8>>,
    sent: Mutex<Vec<SentMessage>>,
}

impl InMemoryMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message; unread messages show up in `list_unread`.
    pub fn with_message(mut self, message: MessageSummary, unread: bool) -> Self {
        if unread {
            self.unread.push(message.id.clone());
        }
        self.messages.push(message);
        self
    }

    pub fn with_attachment(mut self, message_id: &str, attachment_id: &str, bytes: Vec<u8>) -> Self {
        self.attachments
            .insert((message_id.to_string(), attachment_id.to_string()), bytes);
        self
    }

    pub fn message(&self, id: &str) -> Option<&MessageSummary> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Mailbox for InMemoryMailbox {
    fn list_unread(&self) -> Result<Vec<MessageSummary>, MailboxError> {
        Ok(self
            .messages
            .iter()
            .filter(|m| self.unread.contains(&m.id))
            .cloned()
            .collect())
    }

    fn get_attachment(&self, message_id: &str, attachment_id: &str) -> Result<Vec<u8>, MailboxError> {
        self.attachments
            .get(&(message_id.to_string(), attachment_id.to_string()))
            .cloned()
            .ok_or_else(|| MailboxError::AttachmentNotFound {
                message_id: message_id.to_string(),
                attachment_id: attachment_id.to_string(),
            })
    }

    fn send(&self, to: &str, subject: &str, body: &str) -> Result<MessageId, MailboxError> {
        let raw = compose_raw_message(to, subject, body)?;
        let mut sent = self
            .sent
            .lock()
            .map_err(|e| MailboxError::Service(format!("outbox lock poisoned: {e}")))?;
        let id = format!("sent-{}", sent.len() + 1);
        sent.push(SentMessage {
            id: id.clone(),
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            raw,
        });
        tracing::info!(message_id = %id, "Message sent");
        Ok(id)
    }

    fn get_thread(&self, thread_id: &str) -> Result<Vec<MessageSummary>, MailboxError> {
        let thread: Vec<MessageSummary> = self
            .messages
            .iter()
            .filter(|m| m.thread_id == thread_id)
            .cloned()
            .collect();
        if thread.is_empty() {
            return Err(MailboxError::ThreadNotFound(thread_id.to_string()));
        }
        Ok(thread)
    }
}
