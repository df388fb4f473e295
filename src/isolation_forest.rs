//! Isolation forest for unsupervised outlier detection
//!
//! Anomalies are easier to isolate with random axis-aligned splits than
//! normal points, so the average partitioning depth across an ensemble of
//! randomized trees is the anomaly signal. Scores fall in (0, 1]: values
//! near 1 isolate quickly (anomalous), values around 0.5 and below look
//! like the bulk of the training data.
//!
//! The outlier cutoff is not a fixed constant. [`IsolationForest::fit`]
//! calibrates it from the training score distribution so that the requested
//! contamination fraction of training records lands at or above it.
//!
//! # References
//!
//! Liu, F. T., Ting, K. M., & Zhou, Z. H. (2008). Isolation forest.
//! In 2008 Eighth IEEE International Conference on Data Mining (pp. 413-422).

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Subsampling cap per tree, following the original paper. Keeps trees
/// shallow and training cost independent of total record count.
pub const DEFAULT_SUBSAMPLE_SIZE: usize = 256;

/// Errors for forest training and scoring
#[derive(Error, Debug)]
pub enum ForestError {
    #[error("insufficient training data: need at least {required} records, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("forest is not fitted; train or load a model first")]
    NotFitted,

    #[error("invalid contamination {0}: must be in (0.0, 0.5]")]
    InvalidContamination(f64),

    #[error("invalid tree count {0}: must be at least 1")]
    InvalidTreeCount(usize),
}

pub type Result<T> = std::result::Result<T, ForestError>;

/// Training parameters for [`IsolationForest::fit`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestConfig {
    /// Number of trees in the ensemble.
    pub n_estimators: usize,
    /// Expected fraction of anomalous records; calibrates the score cutoff.
    pub contamination: f64,
    /// Seed for reproducible fits. `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 150,
            contamination: 0.1,
            seed: None,
        }
    }
}

/// A node in an isolation tree
#[derive(Debug, Clone, Serialize, Deserialize)]
enum IsolationNode {
    /// Internal node with split condition
    Internal {
        feature_idx: usize,
        split_value: f64,
        left: Box<IsolationNode>,
        right: Box<IsolationNode>,
    },
    /// Leaf holding the size of the unresolved subset
    Leaf { size: usize },
}

impl IsolationNode {
    fn path_length(&self, sample: &[f64], depth: usize) -> f64 {
        match self {
            IsolationNode::Internal {
                feature_idx,
                split_value,
                left,
                right,
            } => {
                if sample[*feature_idx] < *split_value {
                    left.path_length(sample, depth + 1)
                } else {
                    right.path_length(sample, depth + 1)
                }
            }
            // Unresolved leaves extend the path by the expected depth of a
            // random search over the remaining points.
            IsolationNode::Leaf { size } => depth as f64 + average_path_length(*size),
        }
    }
}

/// Expected path length of an unsuccessful search in a binary search tree
/// over n points: c(n) = 2H(n-1) - 2(n-1)/n, with the harmonic number
/// H(m) approximated by ln(m) + Euler's constant.
pub(crate) fn average_path_length(n: usize) -> f64 {
    const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let m = (n - 1) as f64;
            2.0 * (m.ln() + EULER_GAMMA) - 2.0 * m / n as f64
        }
    }
}

/// Single isolation tree built over one subsample
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IsolationTree {
    root: IsolationNode,
}

impl IsolationTree {
    fn build(samples: &[Vec<f64>], max_depth: usize, rng: &mut StdRng) -> Self {
        IsolationTree {
            root: Self::build_node(samples, 0, max_depth, rng),
        }
    }

    fn build_node(
        samples: &[Vec<f64>],
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> IsolationNode {
        if depth >= max_depth || samples.len() <= 1 {
            return IsolationNode::Leaf {
                size: samples.len(),
            };
        }

        let num_features = samples[0].len();
        let feature_idx = rng.gen_range(0..num_features);

        let mut min_val = f64::MAX;
        let mut max_val = f64::MIN;
        for sample in samples {
            let value = sample[feature_idx];
            min_val = min_val.min(value);
            max_val = max_val.max(value);
        }

        // The chosen feature is constant across this subset; no split exists.
        if (max_val - min_val).abs() < f64::EPSILON {
            return IsolationNode::Leaf {
                size: samples.len(),
            };
        }

        let split_value = rng.gen_range(min_val..max_val);

        let (left_samples, right_samples): (Vec<Vec<f64>>, Vec<Vec<f64>>) = samples
            .iter()
            .cloned()
            .partition(|s| s[feature_idx] < split_value);

        if left_samples.is_empty() || right_samples.is_empty() {
            return IsolationNode::Leaf {
                size: samples.len(),
            };
        }

        IsolationNode::Internal {
            feature_idx,
            split_value,
            left: Box::new(Self::build_node(&left_samples, depth + 1, max_depth, rng)),
            right: Box::new(Self::build_node(&right_samples, depth + 1, max_depth, rng)),
        }
    }

    fn path_length(&self, sample: &[f64]) -> f64 {
        self.root.path_length(sample, 0)
    }
}

/// Ensemble of isolation trees plus the calibrated outlier cutoff.
///
/// Immutable after [`fit`](IsolationForest::fit): scoring takes `&self`, so
/// one forest can be shared across threads without locking, and repeated
/// scoring of the same sample always returns the same value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    subsample_size: usize,
    threshold: f64,
    contamination: f64,
}

impl IsolationForest {
    /// Train an ensemble over `samples` and calibrate the cutoff so that
    /// roughly `config.contamination` of the training points score at or
    /// above it.
    ///
    /// Every sample must have the same nonzero width; the encoder layer
    /// guarantees this for authentication records.
    pub fn fit(samples: &[Vec<f64>], config: &ForestConfig) -> Result<Self> {
        if samples.len() < 2 {
            return Err(ForestError::InsufficientData {
                required: 2,
                actual: samples.len(),
            });
        }
        if config.n_estimators == 0 {
            return Err(ForestError::InvalidTreeCount(0));
        }
        if !(config.contamination > 0.0 && config.contamination <= 0.5) {
            return Err(ForestError::InvalidContamination(config.contamination));
        }

        let mut master_rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let subsample_size = DEFAULT_SUBSAMPLE_SIZE.min(samples.len());
        let max_depth = (subsample_size as f64).log2().ceil() as usize;

        // Per-tree seeds drawn up front so each tree's randomness is
        // self-contained and the whole fit replays from one seed.
        let tree_seeds: Vec<u64> = (0..config.n_estimators).map(|_| master_rng.gen()).collect();

        let mut trees = Vec::with_capacity(config.n_estimators);
        for seed in tree_seeds {
            let mut rng = StdRng::seed_from_u64(seed);

            // Subsample without replacement
            let mut indices: Vec<usize> = (0..samples.len()).collect();
            indices.shuffle(&mut rng);
            let subsample: Vec<Vec<f64>> = indices[..subsample_size]
                .iter()
                .map(|&i| samples[i].clone())
                .collect();

            trees.push(IsolationTree::build(&subsample, max_depth, &mut rng));
        }

        let mut forest = IsolationForest {
            trees,
            subsample_size,
            threshold: 0.0,
            contamination: config.contamination,
        };

        // Calibrate the cutoff as the k-th highest training score for
        // k = round(contamination * n), clamped to [1, n]. Ties at the
        // cutoff may flag slightly more than the requested fraction.
        let mut train_scores = forest.score_batch(samples)?;
        train_scores.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
        let k = ((config.contamination * samples.len() as f64).round() as usize)
            .clamp(1, samples.len());
        forest.threshold = train_scores[k - 1];

        tracing::debug!(
            "fitted isolation forest: {} trees, subsample {}, threshold {:.4}",
            forest.trees.len(),
            forest.subsample_size,
            forest.threshold
        );

        Ok(forest)
    }

    /// Anomaly score for one sample.
    pub fn score(&self, sample: &[f64]) -> Result<f64> {
        if self.trees.is_empty() {
            return Err(ForestError::NotFitted);
        }

        let total_path: f64 = self.trees.iter().map(|t| t.path_length(sample)).sum();
        let avg_path = total_path / self.trees.len() as f64;
        let c = average_path_length(self.subsample_size);

        Ok(2.0_f64.powf(-avg_path / c))
    }

    /// Scores for a batch of samples, in input order.
    pub fn score_batch(&self, samples: &[Vec<f64>]) -> Result<Vec<f64>> {
        samples.iter().map(|s| self.score(s)).collect()
    }

    /// Outlier verdict for a score produced by [`score`](Self::score).
    pub fn is_outlier(&self, score: f64) -> bool {
        score >= self.threshold
    }

    /// Score cutoff calibrated from the training distribution.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Contamination fraction the cutoff was calibrated for.
    pub fn contamination(&self) -> f64 {
        self.contamination
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn subsample_size(&self) -> usize {
        self.subsample_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tight cluster around (10, 10, ..) plus one far-away point.
    fn cluster_with_outlier(n: usize) -> Vec<Vec<f64>> {
        let mut rng = StdRng::seed_from_u64(7);
        let mut samples: Vec<Vec<f64>> = (0..n)
            .map(|_| {
                vec![
                    10.0 + rng.gen_range(-1.0..1.0),
                    10.0 + rng.gen_range(-1.0..1.0),
                    10.0 + rng.gen_range(-1.0..1.0),
                ]
            })
            .collect();
        samples.push(vec![500.0, -500.0, 500.0]);
        samples
    }

    fn config(seed: u64) -> ForestConfig {
        ForestConfig {
            n_estimators: 100,
            contamination: 0.1,
            seed: Some(seed),
        }
    }

    #[test]
    fn test_average_path_length_known_values() {
        assert_eq!(average_path_length(0), 0.0);
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        // c(256) is about 10.24 for the paper's default subsample
        let c256 = average_path_length(256);
        assert!((c256 - 10.24).abs() < 0.1, "c(256) = {}", c256);
    }

    #[test]
    fn test_average_path_length_monotonic() {
        let mut prev = average_path_length(2);
        for n in 3..1000 {
            let c = average_path_length(n);
            assert!(c > prev, "c({}) = {} not above c({}) = {}", n, c, n - 1, prev);
            prev = c;
        }
    }

    #[test]
    fn test_outlier_scores_higher_than_cluster() {
        let samples = cluster_with_outlier(100);
        let forest = IsolationForest::fit(&samples, &config(42)).unwrap();

        let outlier_score = forest.score(&[500.0, -500.0, 500.0]).unwrap();
        let inlier_score = forest.score(&[10.0, 10.0, 10.0]).unwrap();

        assert!(
            outlier_score > inlier_score,
            "outlier {} should beat inlier {}",
            outlier_score,
            inlier_score
        );
        assert!(outlier_score > 0.6);
    }

    #[test]
    fn test_scores_in_unit_interval() {
        let samples = cluster_with_outlier(100);
        let forest = IsolationForest::fit(&samples, &config(42)).unwrap();

        for score in forest.score_batch(&samples).unwrap() {
            assert!(score > 0.0 && score <= 1.0, "score {} out of range", score);
        }
    }

    #[test]
    fn test_insufficient_data() {
        let err = IsolationForest::fit(&[], &config(42)).unwrap_err();
        assert!(matches!(
            err,
            ForestError::InsufficientData { required: 2, actual: 0 }
        ));

        let err = IsolationForest::fit(&[vec![1.0, 2.0]], &config(42)).unwrap_err();
        assert!(matches!(
            err,
            ForestError::InsufficientData { required: 2, actual: 1 }
        ));
    }

    #[test]
    fn test_invalid_contamination() {
        let samples = cluster_with_outlier(10);
        for bad in [0.0, -0.1, 0.51, 1.0] {
            let cfg = ForestConfig {
                contamination: bad,
                ..config(42)
            };
            assert!(matches!(
                IsolationForest::fit(&samples, &cfg).unwrap_err(),
                ForestError::InvalidContamination(_)
            ));
        }
    }

    #[test]
    fn test_invalid_tree_count() {
        let samples = cluster_with_outlier(10);
        let cfg = ForestConfig {
            n_estimators: 0,
            ..config(42)
        };
        assert!(matches!(
            IsolationForest::fit(&samples, &cfg).unwrap_err(),
            ForestError::InvalidTreeCount(0)
        ));
    }

    #[test]
    fn test_seeded_fit_is_reproducible() {
        let samples = cluster_with_outlier(100);
        let forest_a = IsolationForest::fit(&samples, &config(42)).unwrap();
        let forest_b = IsolationForest::fit(&samples, &config(42)).unwrap();

        assert_eq!(forest_a.threshold(), forest_b.threshold());
        let scores_a = forest_a.score_batch(&samples).unwrap();
        let scores_b = forest_b.score_batch(&samples).unwrap();
        assert_eq!(scores_a, scores_b);
    }

    #[test]
    fn test_different_seeds_differ() {
        let samples = cluster_with_outlier(100);
        let forest_a = IsolationForest::fit(&samples, &config(1)).unwrap();
        let forest_b = IsolationForest::fit(&samples, &config(2)).unwrap();

        // Thresholds are calibrated per fit; distinct seeds should not agree
        // to the last bit.
        assert_ne!(forest_a.threshold(), forest_b.threshold());
    }

    #[test]
    fn test_repeated_scoring_is_deterministic() {
        let samples = cluster_with_outlier(50);
        let forest = IsolationForest::fit(&samples, &config(42)).unwrap();

        let first = forest.score(&[10.5, 9.5, 10.0]).unwrap();
        for _ in 0..5 {
            assert_eq!(forest.score(&[10.5, 9.5, 10.0]).unwrap(), first);
        }
    }

    #[test]
    fn test_threshold_flags_contamination_fraction() {
        let mut rng = StdRng::seed_from_u64(99);
        let samples: Vec<Vec<f64>> = (0..200)
            .map(|_| {
                vec![
                    rng.gen_range(0.0..100.0),
                    rng.gen_range(0.0..100.0),
                    rng.gen_range(0.0..100.0),
                ]
            })
            .collect();

        let forest = IsolationForest::fit(&samples, &config(42)).unwrap();
        let scores = forest.score_batch(&samples).unwrap();
        let outliers = scores.iter().filter(|&&s| forest.is_outlier(s)).count();

        // k = round(0.1 * 200) = 20; ties can only push the count up
        assert!(
            (20..=24).contains(&outliers),
            "expected about 20 outliers, got {}",
            outliers
        );
    }

    #[test]
    fn test_outlier_iff_score_at_or_above_threshold() {
        let samples = cluster_with_outlier(100);
        let forest = IsolationForest::fit(&samples, &config(42)).unwrap();

        for score in forest.score_batch(&samples).unwrap() {
            assert_eq!(forest.is_outlier(score), score >= forest.threshold());
        }
    }

    #[test]
    fn test_subsample_capped_at_default() {
        let mut rng = StdRng::seed_from_u64(5);
        let samples: Vec<Vec<f64>> = (0..600)
            .map(|_| vec![rng.gen_range(0.0..1.0), rng.gen_range(0.0..1.0)])
            .collect();

        let forest = IsolationForest::fit(&samples, &config(42)).unwrap();
        assert_eq!(forest.subsample_size(), DEFAULT_SUBSAMPLE_SIZE);

        let small = cluster_with_outlier(40);
        let forest = IsolationForest::fit(&small, &config(42)).unwrap();
        assert_eq!(forest.subsample_size(), 41);
    }

    #[test]
    fn test_score_unfitted_forest() {
        let forest = IsolationForest {
            trees: Vec::new(),
            subsample_size: 0,
            threshold: 0.0,
            contamination: 0.1,
        };
        assert!(matches!(
            forest.score(&[1.0, 2.0]).unwrap_err(),
            ForestError::NotFitted
        ));
    }

    #[test]
    fn test_serde_round_trip_preserves_scores() {
        let samples = cluster_with_outlier(80);
        let forest = IsolationForest::fit(&samples, &config(42)).unwrap();

        let json = serde_json::to_string(&forest).unwrap();
        let restored: IsolationForest = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.threshold(), forest.threshold());
        assert_eq!(restored.num_trees(), forest.num_trees());
        assert_eq!(
            restored.score_batch(&samples).unwrap(),
            forest.score_batch(&samples).unwrap()
        );
    }

    #[test]
    fn test_identical_samples_leaf_out() {
        // All-constant data cannot be split; every path ends in one leaf
        let samples: Vec<Vec<f64>> = (0..50).map(|_| vec![3.0, 3.0]).collect();
        let forest = IsolationForest::fit(&samples, &config(42)).unwrap();

        let score = forest.score(&[3.0, 3.0]).unwrap();
        assert!(score > 0.0 && score <= 1.0);
    }
}
