use rand::rngs::StdRng;
use rand::Rng;

/// Result of a batch K-means run.
#[derive(Debug, Clone)]
pub struct KmeansResult {
    /// Cluster index of each input point, in input order.
    pub assignments: Vec<usize>,
    /// Final centroid vectors, indexed by cluster id.
    pub centroids: Vec<Vec<f64>>,
    /// Number of clusters.
    pub k: usize,
    /// Number of Lloyd's iterations performed.
    pub iterations: usize,
    /// Sum of squared distances from each point to its assigned centroid.
    pub inertia: f64,
}

/// Run Lloyd's K-means algorithm.
///
/// Uses K-means++ initialization driven by `rng`, so different generator
/// states give different (perturbed) starting centroids. Iterates until
/// assignments stabilize or `max_iterations` is reached.
///
/// # Panics
/// Panics if `k` is 0, `points` is empty, or `k > points.len()`.
pub fn kmeans(points: &[Vec<f64>], k: usize, max_iterations: usize, rng: &mut StdRng) -> KmeansResult {
    assert!(!points.is_empty(), "kmeans: points must not be empty");
    assert!(k >= 1, "kmeans: k must be at least 1");
    assert!(k <= points.len(), "kmeans: k must be <= number of points");

    let dim = points[0].len();
    let n = points.len();

    let mut centroids = kmeanspp_init(points, k, rng);

    let mut assignments = vec![0usize; n];
    let mut iterations = 0;

    for _ in 0..max_iterations {
        iterations += 1;

        // Assignment step: assign each point to nearest centroid.
        let mut changed = false;
        for (i, vec) in points.iter().enumerate() {
            let nearest = nearest_centroid(vec, &centroids);
            if assignments[i] != nearest {
                assignments[i] = nearest;
                changed = true;
            }
        }

        if !changed && iterations > 1 {
            break;
        }

        // Update step: recompute centroids as mean of assigned points.
        let mut new_centroids = vec![vec![0.0; dim]; k];
        let mut counts = vec![0usize; k];

        for (i, vec) in points.iter().enumerate() {
            let cluster = assignments[i];
            counts[cluster] += 1;
            for (j, &val) in vec.iter().enumerate() {
                new_centroids[cluster][j] += val;
            }
        }

        for (c, centroid) in new_centroids.iter_mut().enumerate() {
            if counts[c] > 0 {
                let count = counts[c] as f64;
                for val in centroid.iter_mut() {
                    *val /= count;
                }
            } else {
                // Empty cluster: keep previous centroid.
                centroid.clone_from(&centroids[c]);
            }
        }

        centroids = new_centroids;
    }

    let inertia = points
        .iter()
        .zip(&assignments)
        .map(|(vec, &c)| squared_euclidean(vec, &centroids[c]))
        .sum();

    KmeansResult {
        assignments,
        centroids,
        k,
        iterations,
        inertia,
    }
}

// ── Internal helpers ─────────────────────────────────────────

/// K-means++ initialization: pick k centroids with D²-weighted sampling.
fn kmeanspp_init(points: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let n = points.len();
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[rng.gen_range(0..n)].clone());

    let mut min_dist: Vec<f64> = points
        .iter()
        .map(|p| squared_euclidean(p, &centroids[0]))
        .collect();

    for _ in 1..k {
        let total: f64 = min_dist.iter().sum();
        let idx = if total > 0.0 {
            let mut target = rng.gen::<f64>() * total;
            let mut chosen = n - 1;
            for (i, &d) in min_dist.iter().enumerate() {
                if target < d {
                    chosen = i;
                    break;
                }
                target -= d;
            }
            chosen
        } else {
            // Every point coincides with a centroid already.
            rng.gen_range(0..n)
        };

        let centroid = points[idx].clone();
        for (d, p) in min_dist.iter_mut().zip(points) {
            *d = d.min(squared_euclidean(p, &centroid));
        }
        centroids.push(centroid);
    }

    centroids
}

/// Find the index of the nearest centroid.
pub(crate) fn nearest_centroid(point: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut best_idx = 0;
    let mut best_dist = f64::MAX;
    for (i, centroid) in centroids.iter().enumerate() {
        let dist = squared_euclidean(point, centroid);
        if dist < best_dist {
            best_dist = dist;
            best_idx = i;
        }
    }
    best_idx
}

/// Squared Euclidean distance.
#[inline]
pub(crate) fn squared_euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
