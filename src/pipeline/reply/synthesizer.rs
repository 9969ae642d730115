//! Two-stage reply synthesis: content draft, then style revision.
//!
//! Each request builds its own `Stage` values and passes them by value to a
//! stateless `TextGenerator`, so concurrent requests share nothing mutable.

use std::sync::Arc;
use std::time::Instant;

use tracing::info_span;
use uuid::Uuid;

use super::generator::TextGenerator;
use super::prompt::{draft_stage, style_stage, STYLE_FEEDBACK};
use super::types::{ConversationTurn, ReplyResult, Stage, StyleProfile};
use super::GenerationError;

pub struct ReplySynthesizer {
    generator: Arc<dyn TextGenerator>,
    style: StyleProfile,
}

impl ReplySynthesizer {
    pub fn new(generator: Arc<dyn TextGenerator>, style: StyleProfile) -> Self {
        Self { generator, style }
    }

    /// Draft a reply to `email_text`, optionally grounded in condensed
    /// document text, then restyle it.
    ///
    /// Fails with `GenerationError::Stage` if either call errors or returns
    /// nothing usable. The style stage never runs after a failed draft, and
    /// an unstyled draft is never returned as final.
    pub fn synthesize(
        &self,
        email_text: &str,
        document: Option<&str>,
    ) -> Result<ReplyResult, GenerationError> {
        let request_id = Uuid::new_v4();
        let span = info_span!("reply_request", %request_id);
        let _guard = span.enter();

        let draft = self.run(draft_stage(email_text, document))?;
        let styled = self.run(style_stage(&draft.output_text, &self.style))?;

        tracing::info!(
            draft_len = draft.output_text.len(),
            final_len = styled.output_text.len(),
            with_document = document.is_some(),
            "Reply synthesized"
        );

        Ok(ReplyResult {
            draft_reply: draft.output_text,
            final_reply: styled.output_text,
            feedback: STYLE_FEEDBACK.to_string(),
        })
    }

    fn run(&self, stage: Stage) -> Result<ConversationTurn, GenerationError> {
        let start = Instant::now();
        let role = stage.role;
        tracing::trace!(%role, message = %stage.message, "Stage input");

        let output = self
            .generator
            .complete(&stage.instruction, &stage.message)
            .map_err(|e| {
                tracing::warn!(%role, error = %e, "Stage failed");
                e.in_stage(role)
            })?;
        let turn = stage.complete_with(output)?;

        tracing::info!(
            %role,
            elapsed_ms = %start.elapsed().as_millis(),
            output_len = turn.output_text.len(),
            "Stage complete"
        );
        Ok(turn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::reply::{MockTextGenerator, StageRole, WRITER_SYSTEM_PROMPT};

    fn synthesizer(mock: Arc<MockTextGenerator>) -> ReplySynthesizer {
        ReplySynthesizer::new(mock, StyleProfile::default())
    }

    #[test]
    fn runs_draft_then_style() {
        let mock = Arc::new(MockTextGenerator::scripted(vec![
            Ok("Draft: yes, Friday works.".into()),
            Ok("Hi Ana,\n\nFriday works for me.\n\nBest regards".into()),
        ]));
        let result = synthesizer(mock.clone())
            .synthesize("Can we meet Friday?", None)
            .unwrap();

        assert_eq!(result.draft_reply, "Draft: yes, Friday works.");
        assert_eq!(result.final_reply, "Hi Ana,\n\nFriday works for me.\n\nBest regards");
        assert_eq!(result.feedback, "Automatically styled to match guidelines");

        let seen = mock.seen();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, WRITER_SYSTEM_PROMPT);
        assert!(seen[0].1.ends_with("Email to reply to:\nCan we meet Friday?"));
        assert!(seen[1].0.contains("professional but friendly"));
        assert_eq!(
            seen[1].1,
            "Rewrite this to match our style guide:\nDraft: yes, Friday works."
        );
    }

    #[test]
    fn document_context_reaches_draft_stage_only() {
        let mock = Arc::new(MockTextGenerator::new("ok"));
        synthesizer(mock.clone())
            .synthesize("Thoughts?", Some("Budget: 40k"))
            .unwrap();

        let seen = mock.seen();
        assert!(seen[0]
            .1
            .contains("\n\nAdditional context from attached PDF:\nBudget: 40k"));
        assert!(!seen[1].1.contains("Budget: 40k"));
    }

    #[test]
    fn draft_failure_skips_style_stage() {
        let mock = Arc::new(MockTextGenerator::failing("network down"));
        let err = synthesizer(mock.clone())
            .synthesize("Hello", None)
            .unwrap_err();

        assert_eq!(err.stage_role(), Some(StageRole::Writer));
        assert_eq!(mock.calls(), 1);
    }

    #[test]
    fn empty_draft_is_failure() {
        let mock = Arc::new(MockTextGenerator::scripted(vec![Ok("   ".into()), Ok("styled".into())]));
        let err = synthesizer(mock.clone()).synthesize("Hello", None).unwrap_err();

        assert_eq!(err.stage_role(), Some(StageRole::Writer));
        assert_eq!(mock.calls(), 1);
    }

    #[test]
    fn style_failure_returns_no_partial_reply() {
        let mock = Arc::new(MockTextGenerator::scripted(vec![
            Ok("A perfectly good draft".into()),
            Err("quota exceeded".into()),
        ]));
        let err = synthesizer(mock.clone()).synthesize("Hello", None).unwrap_err();

        assert_eq!(err.stage_role(), Some(StageRole::Reviewer));
        assert!(err.to_string().contains("quota exceeded"));
        assert_eq!(mock.calls(), 2);
    }

    #[test]
    fn concurrent_requests_do_not_share_stage_state() {
        let synth = synthesizer(Arc::new(MockTextGenerator::echo()));
        let emails: Vec<String> = (0..8).map(|i| format!("request number {i}")).collect();

        let results: Vec<ReplyResult> = std::thread::scope(|scope| {
            let handles: Vec<_> = emails
                .iter()
                .map(|email| {
                    let synth = &synth;
                    scope.spawn(move || synth.synthesize(email, None).unwrap())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for (i, result) in results.iter().enumerate() {
            let own = format!("request number {i}");
            assert!(result.final_reply.ends_with(&own));
            assert!(result.draft_reply.ends_with(&own));
            for j in (0..8).filter(|&j| j != i) {
                assert!(!result.final_reply.contains(&format!("request number {j}")));
            }
        }
    }
}
