use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::CondenseError;

/// Seed used by the condenser so identical inputs select identical units.
pub const DEFAULT_SEED: u64 = 42;

const MAX_ITERATIONS: usize = 300;

#[derive(Debug, Clone)]
pub struct Clustering {
    pub centroids: Vec<Vec<f64>>,
    /// Cluster index for each input point.
    pub assignments: Vec<usize>,
    pub iterations: usize,
}

impl Clustering {
    pub fn cluster_size(&self, cluster: usize) -> usize {
        self.assignments.iter().filter(|&&a| a == cluster).count()
    }
}

pub fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Index of the closest centroid; ties go to the lower index.
pub fn nearest(point: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let d = squared_distance(point, c);
        if d < best_dist {
            best = i;
            best_dist = d;
        }
    }
    best
}

/// Seeded k-means (k-means++ initialization, Lloyd iterations).
///
/// `k` is capped at the number of distinct points, so duplicate-heavy input
/// yields fewer clusters instead of empty ones.
pub fn kmeans(points: &[Vec<f64>], k: usize, seed: u64) -> Result<Clustering, CondenseError> {
    if points.is_empty() || k == 0 {
        return Err(CondenseError::Clustering(format!(
            "cannot form {k} clusters from {} points",
            points.len()
        )));
    }
    let dims = points[0].len();
    if points.iter().any(|p| p.len() != dims) {
        return Err(CondenseError::Clustering("ragged input vectors".into()));
    }
    if points.iter().flatten().any(|v| !v.is_finite()) {
        return Err(CondenseError::Clustering("non-finite vector component".into()));
    }

    let k = k.min(distinct_count(points));
    let mut rng = StdRng::seed_from_u64(seed);
    let mut centroids = init_plus_plus(points, k, &mut rng)?;
    let mut assignments = vec![usize::MAX; points.len()];
    let mut iterations = 0;

    while iterations < MAX_ITERATIONS {
        iterations += 1;
        let next: Vec<usize> = points.iter().map(|p| nearest(p, &centroids)).collect();
        if next == assignments {
            break;
        }
        assignments = next;
        recompute_centroids(points, &assignments, &mut centroids);
    }

    tracing::debug!(points = points.len(), k, iterations, "k-means converged");
    Ok(Clustering {
        centroids,
        assignments,
        iterations,
    })
}

fn distinct_count(points: &[Vec<f64>]) -> usize {
    let mut seen: Vec<Vec<u64>> = Vec::new();
    for p in points {
        let bits: Vec<u64> = p.iter().map(|v| v.to_bits()).collect();
        if !seen.contains(&bits) {
            seen.push(bits);
        }
    }
    seen.len()
}

fn init_plus_plus(
    points: &[Vec<f64>],
    k: usize,
    rng: &mut StdRng,
) -> Result<Vec<Vec<f64>>, CondenseError> {
    let first = rng.gen_range(0..points.len());
    let mut centroids = vec![points[first].clone()];
    let mut d2: Vec<f64> = points
        .iter()
        .map(|p| squared_distance(p, &centroids[0]))
        .collect();

    while centroids.len() < k {
        let dist = WeightedIndex::new(&d2)
            .map_err(|e| CondenseError::Clustering(format!("seeding failed: {e}")))?;
        let chosen = points[dist.sample(rng)].clone();
        for (d, p) in d2.iter_mut().zip(points) {
            *d = d.min(squared_distance(p, &chosen));
        }
        centroids.push(chosen);
    }
    Ok(centroids)
}

fn recompute_centroids(points: &[Vec<f64>], assignments: &[usize], centroids: &mut [Vec<f64>]) {
    let dims = centroids.first().map_or(0, Vec::len);
    let mut sums = vec![vec![0.0; dims]; centroids.len()];
    let mut counts = vec![0usize; centroids.len()];

    for (p, &a) in points.iter().zip(assignments) {
        counts[a] += 1;
        for (s, v) in sums[a].iter_mut().zip(p) {
            *s += v;
        }
    }

    for (cluster, (sum, count)) in sums.into_iter().zip(&counts).enumerate() {
        if *count == 0 {
            // Empty cluster: restart it on the point worst served by its centroid.
            if let Some(far) = farthest_point(points, assignments, centroids) {
                centroids[cluster] = points[far].clone();
            }
            continue;
        }
        centroids[cluster] = sum.into_iter().map(|s| s / *count as f64).collect();
    }
}

fn farthest_point(points: &[Vec<f64>], assignments: &[usize], centroids: &[Vec<f64>]) -> Option<usize> {
    points
        .iter()
        .zip(assignments)
        .map(|(p, &a)| squared_distance(p, &centroids[a]))
        .enumerate()
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(i, _)| i)
}
