//! Random forest classifier.
//!
//! Bagged CART trees split on Gini impurity, each considering a random
//! `sqrt(n_features)` subset of features per node. Class probabilities are the
//! mean of the leaf distributions reached in every tree. All randomness comes
//! from `random_seed`, so a refit on the same data reproduces the same forest
//! regardless of how many worker threads build it.

use crate::error::{PredictorError, TrainingError};
use crate::models::Predictor;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Deepest tree a persisted forest may contain
pub const MAX_TREE_DEPTH: usize = 32;

/// Forest hyperparameters, persisted with the model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    /// Number of trees
    pub ensemble_size: usize,
    /// Maximum depth of each tree
    pub max_depth: usize,
    /// Nodes with fewer samples become leaves
    pub min_samples_split: usize,
    /// Seed for bootstrap sampling and feature selection
    pub random_seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            ensemble_size: 100,
            max_depth: 10,
            min_samples_split: 2,
            random_seed: 42,
        }
    }
}

impl ForestParams {
    pub fn validate(&self) -> Result<(), TrainingError> {
        if self.ensemble_size == 0 {
            return Err(TrainingError::InvalidConfig(
                "ensemble_size must be at least 1".to_string(),
            ));
        }
        if self.max_depth == 0 || self.max_depth > MAX_TREE_DEPTH {
            return Err(TrainingError::InvalidConfig(format!(
                "max_depth must be in 1..={MAX_TREE_DEPTH}, got {}",
                self.max_depth
            )));
        }
        if self.min_samples_split < 2 {
            return Err(TrainingError::InvalidConfig(format!(
                "min_samples_split must be at least 2, got {}",
                self.min_samples_split
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        distribution: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn leaf(counts: &[usize]) -> Self {
        let total: usize = counts.iter().sum();
        let distribution = counts
            .iter()
            .map(|&c| c as f64 / total.max(1) as f64)
            .collect();
        Node::Leaf { distribution }
    }

    fn check(&self, n_features: usize, n_classes: usize) -> Result<(), String> {
        match self {
            Node::Leaf { distribution } if distribution.len() != n_classes => Err(format!(
                "leaf has {} classes, forest has {n_classes}",
                distribution.len()
            )),
            Node::Leaf { .. } => Ok(()),
            Node::Split { feature, .. } if *feature >= n_features => Err(format!(
                "split on feature {feature}, forest has {n_features}"
            )),
            Node::Split { left, right, .. } => {
                left.check(n_features, n_classes)?;
                right.check(n_features, n_classes)
            }
        }
    }
}

/// A single fitted decision tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct DecisionTree {
    root: Node,
}

impl DecisionTree {
    fn leaf_distribution(&self, features: &[f64]) -> &[f64] {
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf { distribution } => return distribution,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if features[*feature] <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }
}

struct CandidateSplit {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

/// Shared, read-only inputs for growing trees
struct TreeGrower<'a> {
    rows: &'a [&'a [f64]],
    targets: &'a [usize],
    n_classes: usize,
    n_features: usize,
    max_features: usize,
    params: &'a ForestParams,
}

impl TreeGrower<'_> {
    fn grow(&self, seed: u64) -> DecisionTree {
        let mut rng = StdRng::seed_from_u64(seed);
        let n = self.rows.len();
        let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();

        DecisionTree {
            root: self.grow_node(bootstrap, 0, &mut rng),
        }
    }

    fn grow_node(&self, indices: Vec<usize>, depth: usize, rng: &mut StdRng) -> Node {
        let counts = self.class_counts(&indices);
        let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;

        if pure || depth >= self.params.max_depth || indices.len() < self.params.min_samples_split
        {
            return Node::leaf(&counts);
        }

        let Some(split) = self.best_split(&indices, &counts, rng) else {
            return Node::leaf(&counts);
        };

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| self.rows[i][split.feature] <= split.threshold);

        Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: Box::new(self.grow_node(left, depth + 1, rng)),
            right: Box::new(self.grow_node(right, depth + 1, rng)),
        }
    }

    /// Lowest weighted Gini split among a random feature subset. Keeps looking
    /// past the subset while no feature has produced a valid split.
    fn best_split(
        &self,
        indices: &[usize],
        counts: &[usize],
        rng: &mut StdRng,
    ) -> Option<CandidateSplit> {
        let n = indices.len();
        let mut features: Vec<usize> = (0..self.n_features).collect();
        features.shuffle(rng);

        let mut best: Option<CandidateSplit> = None;
        let mut sorted = indices.to_vec();

        for (visited, &feature) in features.iter().enumerate() {
            if visited >= self.max_features && best.is_some() {
                break;
            }

            sorted.sort_by(|&a, &b| self.rows[a][feature].total_cmp(&self.rows[b][feature]));

            let mut left = vec![0usize; self.n_classes];
            let mut right = counts.to_vec();

            for pos in 0..n - 1 {
                let class = self.targets[sorted[pos]];
                left[class] += 1;
                right[class] -= 1;

                let value = self.rows[sorted[pos]][feature];
                let next = self.rows[sorted[pos + 1]][feature];
                if value == next {
                    continue;
                }

                let n_left = pos + 1;
                let n_right = n - n_left;
                let impurity = (n_left as f64 * gini(&left, n_left)
                    + n_right as f64 * gini(&right, n_right))
                    / n as f64;

                if best.as_ref().map_or(true, |b| impurity < b.impurity) {
                    let mut threshold = value + (next - value) / 2.0;
                    if threshold >= next {
                        threshold = value;
                    }
                    best = Some(CandidateSplit {
                        feature,
                        threshold,
                        impurity,
                    });
                }
            }
        }

        best
    }

    fn class_counts(&self, indices: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.n_classes];
        for &i in indices {
            counts[self.targets[i]] += 1;
        }
        counts
    }
}

fn gini(counts: &[usize], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / total;
            p * p
        })
        .sum::<f64>()
}

/// Fitted random forest over integer class labels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    params: ForestParams,
    n_features: usize,
    /// Sorted distinct labels seen during fitting; distribution positions
    /// follow this order
    classes: Vec<u8>,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Fit a forest on rows `x` with labels `y`.
    ///
    /// `workers` threads grow trees in parallel (0 = one per available core).
    pub fn fit<R: AsRef<[f64]>>(
        x: &[R],
        y: &[u8],
        params: &ForestParams,
        workers: usize,
    ) -> Result<Self, TrainingError> {
        params.validate()?;

        if x.is_empty() {
            return Err(TrainingError::EmptyDataset);
        }
        if x.len() != y.len() {
            return Err(TrainingError::InvalidConfig(format!(
                "{} feature rows but {} labels",
                x.len(),
                y.len()
            )));
        }

        let rows: Vec<&[f64]> = x.iter().map(AsRef::as_ref).collect();
        let n_features = rows[0].len();
        if n_features == 0 || rows.iter().any(|r| r.len() != n_features) {
            return Err(TrainingError::InvalidConfig(
                "feature rows must be non-empty and of equal length".to_string(),
            ));
        }
        if rows.iter().any(|r| r.iter().any(|v| !v.is_finite())) {
            return Err(TrainingError::InvalidConfig(
                "feature rows contain non-finite values".to_string(),
            ));
        }

        let mut classes = y.to_vec();
        classes.sort_unstable();
        classes.dedup();
        if classes.len() < 2 {
            return Err(TrainingError::InsufficientClasses {
                found: classes.len(),
            });
        }

        let targets: Vec<usize> = y
            .iter()
            .map(|label| classes.binary_search(label).unwrap_or_else(|pos| pos))
            .collect();

        let grower = TreeGrower {
            rows: &rows,
            targets: &targets,
            n_classes: classes.len(),
            n_features,
            max_features: ((n_features as f64).sqrt() as usize).max(1),
            params,
        };

        let mut master = StdRng::seed_from_u64(params.random_seed);
        let seeds: Vec<u64> = (0..params.ensemble_size).map(|_| master.gen()).collect();

        let workers = resolve_workers(workers).min(seeds.len());
        debug!(
            trees = seeds.len(),
            workers = workers,
            rows = rows.len(),
            classes = classes.len(),
            "Growing random forest"
        );

        let trees: Vec<DecisionTree> = if workers <= 1 {
            seeds.iter().map(|&s| grower.grow(s)).collect()
        } else {
            let chunk_size = seeds.len().div_ceil(workers);
            let grower = &grower;
            std::thread::scope(|scope| {
                let handles: Vec<_> = seeds
                    .chunks(chunk_size)
                    .map(|chunk| {
                        scope.spawn(move || {
                            chunk.iter().map(|&s| grower.grow(s)).collect::<Vec<_>>()
                        })
                    })
                    .collect();

                handles
                    .into_iter()
                    .flat_map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
                    .collect()
            })
        };

        Ok(Self {
            params: *params,
            n_features,
            classes,
            trees,
        })
    }

    /// Hyperparameters the forest was fit with
    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    /// Number of trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Structural check after deserialization
    pub fn validate(&self) -> Result<(), String> {
        if self.trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        if self.classes.len() < 2 {
            return Err(format!("forest knows {} classes", self.classes.len()));
        }
        for tree in &self.trees {
            tree.root.check(self.n_features, self.classes.len())?;
        }
        Ok(())
    }
}

impl Predictor for RandomForest {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn classes(&self) -> &[u8] {
        &self.classes
    }

    fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>, PredictorError> {
        if features.len() != self.n_features {
            return Err(PredictorError::FeatureCountMismatch {
                expected: self.n_features,
                got: features.len(),
            });
        }
        if let Some(index) = features.iter().position(|v| !v.is_finite()) {
            return Err(PredictorError::NonFiniteFeature { index });
        }

        let mut proba = vec![0.0; self.classes.len()];
        for tree in &self.trees {
            for (acc, p) in proba.iter_mut().zip(tree.leaf_distribution(features)) {
                *acc += p;
            }
        }

        let n_trees = self.trees.len() as f64;
        proba.iter_mut().for_each(|p| *p /= n_trees);
        Ok(proba)
    }
}

fn resolve_workers(workers: usize) -> usize {
    if workers > 0 {
        return workers;
    }
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One tight cluster per class along the first feature; the second
    /// feature is constant and can never be split on
    fn toy_data() -> (Vec<Vec<f64>>, Vec<u8>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..40 {
            let class = (i % 4) as u8;
            let jitter = (i / 4) as f64 * 0.01;
            x.push(vec![class as f64 * 10.0 + jitter, 1.0]);
            y.push(class);
        }
        (x, y)
    }

    fn small_params() -> ForestParams {
        ForestParams {
            ensemble_size: 15,
            max_depth: 6,
            min_samples_split: 2,
            random_seed: 7,
        }
    }

    #[test]
    fn test_fits_separable_data() {
        let (x, y) = toy_data();
        let forest = RandomForest::fit(&x, &y, &small_params(), 1).unwrap();

        assert_eq!(forest.classes(), &[0, 1, 2, 3]);
        assert_eq!(forest.n_trees(), 15);
        for (row, label) in x.iter().zip(&y) {
            let (predicted, _) = forest.predict(row).unwrap();
            assert_eq!(predicted, *label);
        }
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let (x, y) = toy_data();
        let forest = RandomForest::fit(&x, &y, &small_params(), 1).unwrap();

        for row in [[0.0, 1.0], [15.0, 0.5], [35.0, 0.0], [-4.0, 9.0]] {
            let proba = forest.predict_proba(&row).unwrap();
            assert_eq!(proba.len(), 4);
            assert!((proba.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_same_seed_same_forest_any_worker_count() {
        let (x, y) = toy_data();
        let single = RandomForest::fit(&x, &y, &small_params(), 1).unwrap();
        let parallel = RandomForest::fit(&x, &y, &small_params(), 4).unwrap();
        assert_eq!(single, parallel);
    }

    #[test]
    fn test_single_class_rejected() {
        let x = vec![vec![1.0], vec![2.0], vec![3.0]];
        let y = vec![2, 2, 2];
        let err = RandomForest::fit(&x, &y, &small_params(), 1).unwrap_err();
        assert!(matches!(err, TrainingError::InsufficientClasses { found: 1 }));
    }

    #[test]
    fn test_empty_input_rejected() {
        let x: Vec<Vec<f64>> = Vec::new();
        let err = RandomForest::fit(&x, &[], &small_params(), 1).unwrap_err();
        assert!(matches!(err, TrainingError::EmptyDataset));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let (x, y) = toy_data();
        let params = ForestParams {
            max_depth: 0,
            ..small_params()
        };
        assert!(matches!(
            RandomForest::fit(&x, &y, &params, 1),
            Err(TrainingError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_feature_count_checked_at_inference() {
        let (x, y) = toy_data();
        let forest = RandomForest::fit(&x, &y, &small_params(), 1).unwrap();
        assert_eq!(
            forest.predict_proba(&[1.0]),
            Err(PredictorError::FeatureCountMismatch {
                expected: 2,
                got: 1
            })
        );
        assert_eq!(
            forest.predict_proba(&[f64::NAN, 1.0]),
            Err(PredictorError::NonFiniteFeature { index: 0 })
        );
    }

    #[test]
    fn test_sparse_labels_keep_their_codes() {
        let x = vec![vec![0.0], vec![0.1], vec![5.0], vec![5.1]];
        let y = vec![0, 0, 3, 3];
        let forest = RandomForest::fit(&x, &y, &small_params(), 1).unwrap();
        assert_eq!(forest.classes(), &[0, 3]);
        assert_eq!(forest.predict(&[5.05]).unwrap().0, 3);
    }

    #[test]
    fn test_json_round_trip_is_exact() {
        let (x, y) = toy_data();
        let forest = RandomForest::fit(&x, &y, &small_params(), 1).unwrap();
        let json = serde_json::to_string(&forest).unwrap();
        let restored: RandomForest = serde_json::from_str(&json).unwrap();
        assert_eq!(forest, restored);
        assert!(restored.validate().is_ok());
    }
}
