//! Random Forest regression: bagged CART trees averaged at prediction time

use crate::config::TrainingConfig;
use crate::error::{ForecastError, Result};
use crate::models::tree::{RegressionTree, TreeParams};
use crate::models::{validate_features, validate_training_data, RegressionModel, Regressor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Random Forest hyperparameters
#[derive(Debug, Clone, PartialEq)]
pub struct RandomForestParams {
    /// Name of the model
    name: String,
    /// Number of trees
    n_estimators: usize,
    /// Per-tree growth limits
    tree: TreeParams,
    /// Seed for bootstrap sampling
    seed: u64,
}

/// Fitted Random Forest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
    n_features: usize,
    /// Normalised impurity-based importance per feature
    feature_importances: Vec<f64>,
}

impl RandomForestParams {
    /// Create a new Random Forest configuration
    pub fn new(n_estimators: usize, seed: u64) -> Result<Self> {
        if n_estimators == 0 {
            return Err(ForecastError::InvalidParameter(
                "Number of trees must be positive".to_string(),
            ));
        }

        Ok(Self {
            name: format!("Random Forest (trees={})", n_estimators),
            n_estimators,
            tree: TreeParams {
                max_depth: None,
                min_samples_split: 2,
                min_samples_leaf: 1,
            },
            seed,
        })
    }

    /// Build from the training section of the pipeline configuration
    pub fn from_config(config: &TrainingConfig) -> Result<Self> {
        Self::new(config.n_estimators, config.seed)?
            .with_max_depth(config.max_depth)?
            .with_min_samples(config.min_samples_split, config.min_samples_leaf)
    }

    /// Limit tree depth
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Result<Self> {
        if max_depth == Some(0) {
            return Err(ForecastError::InvalidParameter(
                "Maximum depth must be positive".to_string(),
            ));
        }
        self.tree.max_depth = max_depth;
        Ok(self)
    }

    /// Set the minimum samples needed to split a node and to form a leaf
    pub fn with_min_samples(mut self, split: usize, leaf: usize) -> Result<Self> {
        if split < 2 || leaf == 0 {
            return Err(ForecastError::InvalidParameter(format!(
                "min_samples_split must be >= 2 and min_samples_leaf >= 1, got {} and {}",
                split, leaf
            )));
        }
        self.tree.min_samples_split = split;
        self.tree.min_samples_leaf = leaf;
        Ok(self)
    }

    pub fn n_estimators(&self) -> usize {
        self.n_estimators
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl RegressionModel for RandomForestParams {
    type Fitted = RandomForest;

    fn fit(&self, x: &[Vec<f64>], y: &[f64]) -> Result<Self::Fitted> {
        let n_features = validate_training_data(x, y)?;
        let n = x.len();
        let mut rng = StdRng::seed_from_u64(self.seed);

        let mut trees = Vec::with_capacity(self.n_estimators);
        let mut importances = vec![0.0; n_features];

        for t in 0..self.n_estimators {
            let samples: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            let (tree, tree_importances) =
                RegressionTree::grow(x, y, samples, n_features, self.tree);

            let total: f64 = tree_importances.iter().sum();
            if total > 0.0 {
                for (acc, v) in importances.iter_mut().zip(&tree_importances) {
                    *acc += v / total;
                }
            }
            debug!(tree = t, nodes = tree.node_count(), depth = tree.depth(), "grew tree");
            trees.push(tree);
        }

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|v| *v /= total);
        }

        Ok(RandomForest {
            trees,
            n_features,
            feature_importances: importances,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl RandomForest {
    /// Impurity-based feature importances, summing to 1 unless every tree is a single leaf
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    /// Number of trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Check a deserialised forest: at least one tree, every tree valid and
    /// fitted on the forest's feature width
    pub fn validate(&self) -> Result<()> {
        if self.trees.is_empty() {
            return Err(ForecastError::DataError(
                "Random Forest has no trees".to_string(),
            ));
        }
        if self.feature_importances.len() != self.n_features {
            return Err(ForecastError::DataError(format!(
                "Random Forest has {} importances for {} features",
                self.feature_importances.len(),
                self.n_features
            )));
        }

        for (t, tree) in self.trees.iter().enumerate() {
            if tree.n_features() != self.n_features {
                return Err(ForecastError::DataError(format!(
                    "Tree {} expects {} features, forest expects {}",
                    t,
                    tree.n_features(),
                    self.n_features
                )));
            }
            tree.validate()?;
        }

        Ok(())
    }
}

impl Regressor for RandomForest {
    fn predict(&self, features: &[f64]) -> Result<f64> {
        validate_features(features, self.n_features)?;
        if self.trees.is_empty() {
            return Err(ForecastError::InferenceError(
                "Random Forest has no trees".to_string(),
            ));
        }

        let mut sum = 0.0;
        for tree in &self.trees {
            sum += tree.predict(features)?;
        }
        Ok(sum / self.trees.len() as f64)
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn name(&self) -> &str {
        "Random Forest"
    }
}
