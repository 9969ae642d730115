use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which selection algorithm runs when a document has a workable number of units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// k-means over TF-IDF vectors, one representative per cluster.
    /// Output follows cluster order, not document order.
    ClusterCentroid,
    /// Top-N units by summed TF-IDF weight, restored to document order.
    TopScoredOrdered,
}

impl fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClusterCentroid => write!(f, "cluster_centroid"),
            Self::TopScoredOrdered => write!(f, "top_scored_ordered"),
        }
    }
}

impl FromStr for SelectionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cluster_centroid" | "cluster" => Ok(Self::ClusterCentroid),
            "top_scored_ordered" | "top_scored" => Ok(Self::TopScoredOrdered),
            other => Err(format!("unknown condense strategy '{other}'")),
        }
    }
}

/// Atomic item of condensation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Paragraph,
    Sentence,
}

impl Granularity {
    /// Separator used when units are joined back into text.
    pub fn separator(self) -> &'static str {
        match self {
            Self::Paragraph => "\n\n",
            Self::Sentence => " ",
        }
    }

    /// Plural noun used in the truncation marker.
    pub fn noun(self) -> &'static str {
        match self {
            Self::Paragraph => "paragraphs",
            Self::Sentence => "sentences",
        }
    }
}

/// How a `CondensedText` was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CondenseStrategy {
    /// Input already within budget, or too few units to select from.
    Verbatim,
    /// Leading units kept, remainder dropped with a marker.
    TruncatedHead,
    ClusterRepresentatives,
    TopScoredSentences,
}

/// Bounded-length excerpt handed to reply synthesis.
///
/// `content.chars().count() <= max_text_length` holds for every strategy
/// except `Verbatim` and the many-units `TruncatedHead` path, which keeps
/// exactly `max_units` units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CondensedText {
    pub content: String,
    pub strategy: CondenseStrategy,
    /// Char count of the normalized input.
    pub original_length: usize,
    /// Units present in `content` (1 for an unsplit verbatim document).
    pub units_kept: usize,
}

impl CondensedText {
    pub fn is_reduced(&self) -> bool {
        self.strategy != CondenseStrategy::Verbatim
    }

    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}
