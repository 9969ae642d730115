use super::types::{Stage, StageRole, StyleProfile};

pub const WRITER_SYSTEM_PROMPT: &str = "\
You are an email response generator. Write a reply to the given email.
Focus on:
- Responding accurately to what the email actually asks or states
- Clear communication
- An appropriate level of detail
- Using facts from any attached document context; never invent figures, dates or commitments
Do not worry about tone or formatting. Styling is handled in a separate step.";

pub const STYLE_FEEDBACK: &str = "Automatically styled to match guidelines";

const EMAIL_LABEL: &str = "Email to reply to:\n";
const DOCUMENT_LABEL: &str = "\n\nAdditional context from attached PDF:\n";
const DRAFT_REQUEST: &str = "Please draft a content-appropriate reply to this email:\n";
const STYLE_REQUEST: &str = "Rewrite this to match our style guide:\n";

/// Reviewer instruction with the style profile spelled out.
pub fn reviewer_system_prompt(style: &StyleProfile) -> String {
    format!(
        "You are a draft email improver. Rewrite the email draft to match these style guidelines exactly:\n\
         - Tone: {tone}\n\
         - Length: {length}\n\
         - Sign off with:\n{signature}\n\
         Your output must:\n\
         1. Keep every piece of the draft's content and meaning\n\
         2. Apply all style rules exactly\n\
         3. Contain ONLY the final email text, with no commentary, preamble or notes",
        tone = style.tone,
        length = style.length.describe(),
        signature = style.signature,
    )
}

/// Email text, plus the condensed document under its own label when present.
pub fn draft_context(email_text: &str, document: Option<&str>) -> String {
    let mut context = format!("{EMAIL_LABEL}{email_text}");
    if let Some(doc) = document.filter(|d| !d.trim().is_empty()) {
        context.push_str(DOCUMENT_LABEL);
        context.push_str(doc);
    }
    context
}

pub fn draft_stage(email_text: &str, document: Option<&str>) -> Stage {
    Stage {
        role: StageRole::Writer,
        instruction: WRITER_SYSTEM_PROMPT.to_string(),
        message: format!("{DRAFT_REQUEST}{}", draft_context(email_text, document)),
    }
}

pub fn style_stage(draft: &str, style: &StyleProfile) -> Stage {
    Stage {
        role: StageRole::Reviewer,
        instruction: reviewer_system_prompt(style),
        message: format!("{STYLE_REQUEST}{draft}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::reply::ReplyLength;

    #[test]
    fn context_without_document() {
        assert_eq!(
            draft_context("Can we meet Friday?", None),
            "Email to reply to:\nCan we meet Friday?"
        );
    }

    #[test]
    fn context_with_document_uses_label() {
        assert_eq!(
            draft_context("See attached.", Some("Total due: 120 EUR")),
            "Email to reply to:\nSee attached.\n\nAdditional context from attached PDF:\nTotal due: 120 EUR"
        );
    }

    #[test]
    fn blank_document_is_omitted() {
        assert_eq!(draft_context("Hi", Some("  ")), "Email to reply to:\nHi");
    }

    #[test]
    fn draft_stage_wraps_context() {
        let stage = draft_stage("Hi", None);
        assert_eq!(stage.role, StageRole::Writer);
        assert_eq!(
            stage.message,
            "Please draft a content-appropriate reply to this email:\nEmail to reply to:\nHi"
        );
        assert_eq!(stage.instruction, WRITER_SYSTEM_PROMPT);
    }

    #[test]
    fn style_stage_serializes_profile() {
        let style = StyleProfile {
            tone: "warm".into(),
            length: ReplyLength::Detailed,
            signature: "Cheers,\nSam".into(),
        };
        let stage = style_stage("Draft body", &style);

        assert_eq!(stage.role, StageRole::Reviewer);
        assert_eq!(stage.message, "Rewrite this to match our style guide:\nDraft body");
        assert!(stage.instruction.contains("Tone: warm"));
        assert!(stage.instruction.contains("detailed and thorough"));
        assert!(stage.instruction.contains("Cheers,\nSam"));
    }
}
