use std::fmt;

use serde::{Deserialize, Serialize};

use super::GenerationError;

/// Length preference applied by the style stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyLength {
    Concise,
    Standard,
    Detailed,
}

impl ReplyLength {
    pub fn describe(self) -> &'static str {
        match self {
            Self::Concise => "concise and short",
            Self::Standard => "moderate length, covering each point briefly",
            Self::Detailed => "detailed and thorough",
        }
    }
}

/// Process-wide writing style, read-only after startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleProfile {
    pub tone: String,
    pub length: ReplyLength,
    pub signature: String,
}

impl Default for StyleProfile {
    fn default() -> Self {
        Self {
            tone: "professional but friendly".to_string(),
            length: ReplyLength::Concise,
            signature: "Best regards".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageRole {
    /// Drafts content, favoring factual accuracy over styling.
    Writer,
    /// Rewrites the draft to the style profile without changing meaning.
    Reviewer,
}

impl fmt::Display for StageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Writer => write!(f, "writer"),
            Self::Reviewer => write!(f, "reviewer"),
        }
    }
}

/// One generation call, built fresh for each request and consumed by value.
/// Nothing carries over between requests.
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    pub role: StageRole,
    pub instruction: String,
    pub message: String,
}

impl Stage {
    /// Record the stage's output. Whitespace-only output is not usable.
    pub fn complete_with(self, output: String) -> Result<ConversationTurn, GenerationError> {
        let output_text = output.trim().to_string();
        if output_text.is_empty() {
            return Err(GenerationError::EmptyResponse.in_stage(self.role));
        }
        Ok(ConversationTurn {
            role: self.role,
            input_context: self.message,
            output_text,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: StageRole,
    pub input_context: String,
    pub output_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyResult {
    pub draft_reply: String,
    pub final_reply: String,
    pub feedback: String,
}
