//! Bounds document text before it reaches the generation prompt.
//!
//! Policy, in order:
//! 1. normalized text within `max_text_length` → returned verbatim
//! 2. more than `max_units` units → first `max_units` units + truncation marker
//! 3. at least `min_units_for_selection` units → salience strategy
//! 4. otherwise → all units joined
//!
//! Strategy failures never escape: they degrade to a truncated head with
//! the fallback marker.

use std::time::Instant;

use crate::config::CondenseConfig;
use crate::pipeline::extraction::normalize;

use super::strategy::{strategy_for, SalienceStrategy, ScoredUnit};
use super::types::{CondenseStrategy, CondensedText, Granularity};
use super::units::split_units;

pub const FALLBACK_MARKER: &str = "[Document processed with fallback method]";

pub fn truncation_marker(max_units: usize, granularity: Granularity) -> String {
    format!(
        "[Document truncated - showing first {max_units} {}]",
        granularity.noun()
    )
}

pub struct SalienceCondenser {
    config: CondenseConfig,
    strategy: Box<dyn SalienceStrategy>,
}

impl SalienceCondenser {
    pub fn new(config: &CondenseConfig) -> Self {
        let strategy = strategy_for(config.strategy, config.cluster_count, config.top_n);
        Self::with_strategy(config, strategy)
    }

    pub fn with_strategy(config: &CondenseConfig, strategy: Box<dyn SalienceStrategy>) -> Self {
        Self {
            config: config.clone(),
            strategy,
        }
    }

    pub fn condense(&self, text: &str) -> CondensedText {
        self.condense_with(text, self.config.max_text_length, self.config.max_units)
    }

    /// Condense with explicit budgets, overriding the configured ones.
    pub fn condense_with(&self, text: &str, max_length: usize, max_units: usize) -> CondensedText {
        let start = Instant::now();
        let normalized = normalize(text);
        let original_length = normalized.chars().count();

        if original_length <= max_length {
            return CondensedText {
                units_kept: usize::from(!normalized.is_empty()),
                content: normalized,
                strategy: CondenseStrategy::Verbatim,
                original_length,
            };
        }

        let granularity = self.config.granularity;
        let units = split_units(text, granularity);

        let result = if units.len() > max_units {
            truncated_head(
                &units,
                max_units,
                granularity,
                &truncation_marker(max_units, granularity),
                None,
            )
        } else if units.len() >= self.config.min_units_for_selection {
            match self.strategy.select(&units) {
                Ok(picks) if !picks.is_empty() => self.assemble(&units, picks, max_length),
                Ok(_) => {
                    tracing::warn!(units = units.len(), "Strategy selected nothing, using fallback");
                    truncated_head(&units, max_units, granularity, FALLBACK_MARKER, Some(max_length))
                }
                Err(e) => {
                    tracing::warn!(error = %e, units = units.len(), "Condensation fell back to truncation");
                    truncated_head(&units, max_units, granularity, FALLBACK_MARKER, Some(max_length))
                }
            }
        } else {
            CondensedText {
                content: units.join(head_separator(granularity)),
                strategy: CondenseStrategy::Verbatim,
                units_kept: units.len(),
                original_length: 0,
            }
        };

        let result = CondensedText {
            original_length,
            ..result
        };
        tracing::info!(
            strategy = ?result.strategy,
            original_length,
            condensed_length = result.content.chars().count(),
            units = units.len(),
            kept = result.units_kept,
            elapsed_ms = %start.elapsed().as_millis(),
            "Document condensed"
        );
        result
    }

    /// Join strategy picks under the strategy header, dropping the
    /// lowest-scored picks until the text fits.
    fn assemble(&self, units: &[String], mut picks: Vec<ScoredUnit>, max_length: usize) -> CondensedText {
        let header = self.strategy.header();
        let separator = selection_separator(self.config.granularity);

        let render = |picks: &[ScoredUnit]| -> String {
            let body: Vec<&str> = picks.iter().map(|p| units[p.index].as_str()).collect();
            format!("{header}{}", body.join(separator))
        };

        let mut content = render(&picks);
        while content.chars().count() > max_length && picks.len() > 1 {
            if let Some(weakest) = weakest_pick(&picks) {
                picks.remove(weakest);
            }
            content = render(&picks);
        }

        CondensedText {
            content: truncate_chars(&content, max_length),
            strategy: self.strategy.output_kind(),
            original_length: 0,
            units_kept: picks.len(),
        }
    }
}

/// Lowest score; among equals, the latest in output order.
fn weakest_pick(picks: &[ScoredUnit]) -> Option<usize> {
    picks
        .iter()
        .enumerate()
        .min_by(|(ia, a), (ib, b)| a.score.total_cmp(&b.score).then(ib.cmp(ia)))
        .map(|(i, _)| i)
}

fn head_separator(granularity: Granularity) -> &'static str {
    match granularity {
        Granularity::Paragraph => "\n",
        Granularity::Sentence => " ",
    }
}

fn selection_separator(granularity: Granularity) -> &'static str {
    granularity.separator()
}

/// First `limit` units plus `marker`. With `budget`, trailing units are
/// dropped (keeping at least one, then cutting chars) until it fits.
fn truncated_head(
    units: &[String],
    limit: usize,
    granularity: Granularity,
    marker: &str,
    budget: Option<usize>,
) -> CondensedText {
    let mut kept = units.len().min(limit);
    let render = |kept: usize| format!("{}\n\n{marker}", units[..kept].join(head_separator(granularity)));

    let mut content = render(kept);
    if let Some(max_length) = budget {
        while content.chars().count() > max_length && kept > 1 {
            kept -= 1;
            content = render(kept);
        }
        content = truncate_chars(&content, max_length);
    }

    CondensedText {
        content,
        strategy: CondenseStrategy::TruncatedHead,
        original_length: 0,
        units_kept: kept,
    }
}

/// Cut to at most `max_chars` chars without splitting a code point.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}
