use super::kmeans::{self, squared_distance};
use super::tfidf::TfIdfMatrix;
use super::types::{CondenseStrategy, SelectionStrategy};
use super::CondenseError;

/// A unit picked by a strategy. `score` ranks picks against each other when
/// the condenser has to drop some to meet the length budget.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredUnit {
    pub index: usize,
    pub score: f64,
}

/// Salience selection over a document's units.
///
/// Returns picks in output order. Implementations never return duplicates
/// or out-of-range indices.
pub trait SalienceStrategy: Send + Sync {
    fn select(&self, units: &[String]) -> Result<Vec<ScoredUnit>, CondenseError>;

    /// Strategy label recorded on the condensed output.
    fn output_kind(&self) -> CondenseStrategy;

    /// Text placed before the joined picks.
    fn header(&self) -> &'static str {
        ""
    }
}

pub fn strategy_for(selection: SelectionStrategy, cluster_count: usize, top_n: usize) -> Box<dyn SalienceStrategy> {
    match selection {
        SelectionStrategy::ClusterCentroid => Box::new(ClusterCentroid::new(cluster_count)),
        SelectionStrategy::TopScoredOrdered => Box::new(TopScoredOrdered::new(top_n)),
    }
}

// ──────────────────────────────────────────────
// Cluster representatives
// ──────────────────────────────────────────────

pub const CLUSTER_HEADER: &str = "Key sections from document:\n\n";

/// One representative per k-means cluster: the unit nearest the centroid,
/// searched over all units. Picks follow cluster order.
pub struct ClusterCentroid {
    clusters: usize,
    seed: u64,
}

impl ClusterCentroid {
    pub fn new(clusters: usize) -> Self {
        Self {
            clusters,
            seed: kmeans::DEFAULT_SEED,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

impl SalienceStrategy for ClusterCentroid {
    fn select(&self, units: &[String]) -> Result<Vec<ScoredUnit>, CondenseError> {
        if units.is_empty() {
            return Err(CondenseError::TooFewUnits {
                found: 0,
                required: 1,
            });
        }
        let matrix = TfIdfMatrix::fit(units)?;
        let k = self.clusters.min(units.len());
        let clustering = kmeans::kmeans(&matrix.rows, k, self.seed)?;

        let mut picks: Vec<ScoredUnit> = Vec::with_capacity(clustering.centroids.len());
        for (cluster, centroid) in clustering.centroids.iter().enumerate() {
            let Some(index) = closest_row(&matrix.rows, centroid) else {
                continue;
            };
            if picks.iter().any(|p| p.index == index) {
                continue;
            }
            picks.push(ScoredUnit {
                index,
                score: clustering.cluster_size(cluster) as f64,
            });
        }

        tracing::debug!(
            units = units.len(),
            clusters = clustering.centroids.len(),
            picked = picks.len(),
            "Cluster representatives selected"
        );
        Ok(picks)
    }

    fn output_kind(&self) -> CondenseStrategy {
        CondenseStrategy::ClusterRepresentatives
    }

    fn header(&self) -> &'static str {
        CLUSTER_HEADER
    }
}

/// Nearest row to `centroid`; ties go to the earliest row.
fn closest_row(rows: &[Vec<f64>], centroid: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, row) in rows.iter().enumerate() {
        let d = squared_distance(row, centroid);
        if best.map_or(true, |(_, bd)| d < bd) {
            best = Some((i, d));
        }
    }
    best.map(|(i, _)| i)
}

// ──────────────────────────────────────────────
// Top-scored, document order
// ──────────────────────────────────────────────

/// The `top_n` units with the highest summed TF-IDF weight, returned in
/// their original document order.
pub struct TopScoredOrdered {
    top_n: usize,
}

impl TopScoredOrdered {
    pub fn new(top_n: usize) -> Self {
        Self { top_n }
    }
}

impl SalienceStrategy for TopScoredOrdered {
    fn select(&self, units: &[String]) -> Result<Vec<ScoredUnit>, CondenseError> {
        let matrix = TfIdfMatrix::fit(units)?;

        let mut ranked: Vec<ScoredUnit> = (0..matrix.len())
            .map(|index| ScoredUnit {
                index,
                score: matrix.row_score(index),
            })
            .collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.index.cmp(&b.index)));
        ranked.truncate(self.top_n);
        ranked.sort_by_key(|p| p.index);

        tracing::debug!(units = units.len(), picked = ranked.len(), "Top-scored units selected");
        Ok(ranked)
    }

    fn output_kind(&self) -> CondenseStrategy {
        CondenseStrategy::TopScoredSentences
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn topical_units() -> Vec<String> {
        units(&[
            "Invoice payment overdue, invoice total outstanding.",
            "Payment invoice reminder for outstanding balance.",
            "Quarterly sales revenue grew strongly.",
            "Revenue sales figures beat quarterly targets.",
            "Office relocation planned downtown building.",
            "Building relocation moving office downtown.",
        ])
    }

    #[test]
    fn cluster_picks_are_unique_and_bounded() {
        let picks = ClusterCentroid::new(3).select(&topical_units()).unwrap();
        assert!(!picks.is_empty() && picks.len() <= 3);
        let mut indices: Vec<usize> = picks.iter().map(|p| p.index).collect();
        indices.sort_unstable();
        indices.dedup();
        assert_eq!(indices.len(), picks.len());
        assert!(indices.iter().all(|&i| i < 6));
    }

    #[test]
    fn cluster_selection_is_deterministic() {
        let u = topical_units();
        let a = ClusterCentroid::new(3).select(&u).unwrap();
        let b = ClusterCentroid::new(3).select(&u).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn cluster_count_capped_at_unit_count() {
        let u = units(&["alpha beta", "gamma delta"]);
        let picks = ClusterCentroid::new(5).select(&u).unwrap();
        assert_eq!(picks.len(), 2);
    }

    #[test]
    fn explicit_seed_is_reproducible() {
        let u = topical_units();
        let a = ClusterCentroid::new(3).with_seed(7).select(&u).unwrap();
        let b = ClusterCentroid::new(3).with_seed(7).select(&u).unwrap();
        assert_eq!(a, b);
        assert!(a.len() <= 3);
    }

    #[test]
    fn cluster_scores_reflect_cluster_size() {
        let picks = ClusterCentroid::new(3).select(&topical_units()).unwrap();
        let total: f64 = picks.iter().map(|p| p.score).sum();
        assert!(total <= 6.0);
        assert!(picks.iter().all(|p| p.score >= 1.0));
    }

    #[test]
    fn cluster_on_stop_words_only_fails() {
        let u = units(&["the and", "of the", "to be", "or not", "it is"]);
        assert!(matches!(
            ClusterCentroid::new(2).select(&u),
            Err(CondenseError::EmptyVocabulary)
        ));
    }

    #[test]
    fn top_scored_returns_document_order() {
        let u = units(&[
            "ok",
            "detailed contract renewal pricing schedule clauses",
            "thanks",
            "shipment tracking warehouse customs delays",
            "fine",
        ]);
        let picks = TopScoredOrdered::new(2).select(&u).unwrap();
        let indices: Vec<usize> = picks.iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![1, 3]);
    }

    #[test]
    fn top_scored_never_exceeds_n() {
        let picks = TopScoredOrdered::new(4).select(&topical_units()).unwrap();
        assert_eq!(picks.len(), 4);
        assert!(picks.windows(2).all(|w| w[0].index < w[1].index));
    }

    #[test]
    fn strategy_for_maps_configuration() {
        let s = strategy_for(SelectionStrategy::ClusterCentroid, 5, 5);
        assert_eq!(s.output_kind(), CondenseStrategy::ClusterRepresentatives);
        assert_eq!(s.header(), CLUSTER_HEADER);

        let s = strategy_for(SelectionStrategy::TopScoredOrdered, 5, 5);
        assert_eq!(s.output_kind(), CondenseStrategy::TopScoredSentences);
        assert_eq!(s.header(), "");
    }
}
