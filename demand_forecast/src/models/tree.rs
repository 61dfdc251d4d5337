//! CART regression tree with variance-reduction splits

use crate::error::{ForecastError, Result};
use crate::models::validate_features;
use serde::{Deserialize, Serialize};

/// Growth limits for a single tree
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Fitted regression tree stored as a flat node arena, root at index 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
    n_features: usize,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    children_sse: f64,
}

struct Builder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [f64],
    params: TreeParams,
    nodes: Vec<Node>,
    importances: Vec<f64>,
}

impl RegressionTree {
    /// Grow a tree on the rows of `x` listed in `samples` (duplicates allowed).
    ///
    /// Returns the tree and its unnormalised impurity decrease per feature.
    pub(crate) fn grow(
        x: &[Vec<f64>],
        y: &[f64],
        samples: Vec<usize>,
        n_features: usize,
        params: TreeParams,
    ) -> (Self, Vec<f64>) {
        let mut builder = Builder {
            x,
            y,
            params,
            nodes: Vec::new(),
            importances: vec![0.0; n_features],
        };
        builder.build(samples, 0);

        (
            Self {
                nodes: builder.nodes,
                n_features,
            },
            builder.importances,
        )
    }

    /// Predict by walking from the root to a leaf
    pub fn predict(&self, features: &[f64]) -> Result<f64> {
        validate_features(features, self.n_features)?;

        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return Ok(*value),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    /// Number of nodes, leaves included
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Length of the longest root-to-leaf path
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Check the arena of a deserialised tree.
    ///
    /// Children must come after their parent and inside the arena, and split
    /// features must be below `n_features`. This rules out cycles and
    /// out-of-range lookups in `predict`.
    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(ForecastError::DataError("Tree has no nodes".to_string()));
        }

        for (idx, node) in self.nodes.iter().enumerate() {
            if let Node::Split {
                feature,
                left,
                right,
                threshold,
            } = node
            {
                if *feature >= self.n_features {
                    return Err(ForecastError::DataError(format!(
                        "Node {} splits on feature {} of {}",
                        idx, feature, self.n_features
                    )));
                }
                if !threshold.is_finite() {
                    return Err(ForecastError::DataError(format!(
                        "Node {} has a non-finite threshold",
                        idx
                    )));
                }
                for child in [*left, *right] {
                    if child <= idx || child >= self.nodes.len() {
                        return Err(ForecastError::DataError(format!(
                            "Node {} points to invalid child {} ({} nodes)",
                            idx,
                            child,
                            self.nodes.len()
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

impl Builder<'_> {
    fn build(&mut self, samples: Vec<usize>, depth: usize) -> usize {
        let n = samples.len() as f64;
        let sum: f64 = samples.iter().map(|&i| self.y[i]).sum();
        let mean = sum / n;
        let sse: f64 = samples.iter().map(|&i| (self.y[i] - mean).powi(2)).sum();

        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { value: mean });

        let depth_reached = self.params.max_depth.is_some_and(|max| depth >= max);
        if depth_reached || samples.len() < self.params.min_samples_split || sse <= 0.0 {
            return id;
        }

        let Some(best) = self.best_split(&samples, sse) else {
            return id;
        };

        self.importances[best.feature] += sse - best.children_sse;

        let (left, right): (Vec<usize>, Vec<usize>) = samples
            .into_iter()
            .partition(|&i| self.x[i][best.feature] <= best.threshold);

        let left_id = self.build(left, depth + 1);
        let right_id = self.build(right, depth + 1);
        self.nodes[id] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left: left_id,
            right: right_id,
        };

        id
    }

    fn best_split(&self, samples: &[usize], parent_sse: f64) -> Option<BestSplit> {
        let n = samples.len();
        let min_leaf = self.params.min_samples_leaf;
        if n < 2 * min_leaf {
            return None;
        }

        let total_sum: f64 = samples.iter().map(|&i| self.y[i]).sum();
        let total_sq: f64 = samples.iter().map(|&i| self.y[i] * self.y[i]).sum();

        let mut best: Option<BestSplit> = None;
        let mut order = samples.to_vec();

        for feature in 0..self.importances.len() {
            order.sort_by(|&a, &b| self.x[a][feature].total_cmp(&self.x[b][feature]));

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for k in 1..n {
                let y = self.y[order[k - 1]];
                left_sum += y;
                left_sq += y * y;

                if k < min_leaf || n - k < min_leaf {
                    continue;
                }
                let lo = self.x[order[k - 1]][feature];
                let hi = self.x[order[k]][feature];
                if lo >= hi {
                    continue;
                }

                let nl = k as f64;
                let nr = (n - k) as f64;
                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;
                let children_sse = (left_sq - left_sum * left_sum / nl)
                    + (right_sq - right_sum * right_sum / nr);

                if best
                    .as_ref()
                    .map_or(true, |b| children_sse < b.children_sse)
                {
                    let mid = lo + (hi - lo) / 2.0;
                    // Keep `hi` on the right side even when the midpoint rounds up
                    let threshold = if mid >= hi { lo } else { mid };
                    best = Some(BestSplit {
                        feature,
                        threshold,
                        children_sse,
                    });
                }
            }
        }

        best.filter(|b| b.children_sse < parent_sse)
    }
}
