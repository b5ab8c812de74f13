//! CART (Classification and Regression Tree) builder
//!
//! Exact-greedy regression tree construction on gradient/hessian statistics.
//! With `gradient = -target` and unit hessians the leaves are target means
//! (bagging); with `gradient = prediction - target` they are mean residuals
//! (least-squares boosting). Split gain is the usual
//! `G_L²/H_L + G_R²/H_R - G²/H`, which for unit hessians equals the drop in
//! squared error.

use crate::deterministic::SplitTieBreaker;
use crate::tree::{Node, Tree};

/// Growth limits for a single tree
#[derive(Clone, Debug, PartialEq)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 6,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

/// A built tree together with the gain it attributed to each feature
#[derive(Clone, Debug)]
pub struct FittedTree {
    pub tree: Tree,
    pub gains: Vec<f64>,
}

/// Split candidate with gain and tie-breaker
#[derive(Debug, Clone)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
    tie_breaker: SplitTieBreaker,
}

impl SplitCandidate {
    fn beats(&self, other: &SplitCandidate) -> bool {
        self.gain > other.gain || (self.gain == other.gain && self.tie_breaker < other.tie_breaker)
    }
}

/// Minimum gain for a split to be worth making
const MIN_GAIN: f64 = 1e-12;

/// Build a regression tree using the exact-greedy CART algorithm
pub struct CartBuilder<'a> {
    config: TreeConfig,
    features: &'a [Vec<f64>],
    gradients: &'a [f64],
    hessians: &'a [f64],
    feature_count: usize,
}

struct BuildState {
    nodes: Vec<Node>,
    gains: Vec<f64>,
}

impl<'a> CartBuilder<'a> {
    pub fn new(
        features: &'a [Vec<f64>],
        gradients: &'a [f64],
        hessians: &'a [f64],
        config: TreeConfig,
    ) -> Self {
        assert_eq!(features.len(), gradients.len());
        assert_eq!(features.len(), hessians.len());

        let feature_count = features.first().map(Vec::len).unwrap_or(0);

        Self {
            config,
            features,
            gradients,
            hessians,
            feature_count,
        }
    }

    /// Build a tree over every sample
    pub fn build(&self) -> FittedTree {
        let indices: Vec<usize> = (0..self.features.len()).collect();
        self.build_on(&indices)
    }

    /// Build a tree over a sample multiset (indices may repeat, as in a bootstrap)
    pub fn build_on(&self, indices: &[usize]) -> FittedTree {
        let mut state = BuildState {
            nodes: Vec::new(),
            gains: vec![0.0; self.feature_count],
        };

        self.build_node(indices, 0, 0, &mut state);

        FittedTree {
            tree: Tree::new(state.nodes),
            gains: state.gains,
        }
    }

    fn build_node(&self, indices: &[usize], depth: usize, node_id: usize, state: &mut BuildState) -> i32 {
        let current_idx = state.nodes.len() as i32;
        let leaf_value = self.calculate_leaf_value(indices);

        if depth >= self.config.max_depth
            || indices.len() < self.config.min_samples_split.max(2)
            || indices.len() < 2 * self.config.min_samples_leaf.max(1)
        {
            state.nodes.push(Node::leaf(current_idx, leaf_value));
            return current_idx;
        }

        let Some(split) = self.find_best_split(indices, node_id) else {
            state.nodes.push(Node::leaf(current_idx, leaf_value));
            return current_idx;
        };

        let (left_indices, right_indices) =
            self.split_samples(indices, split.feature_idx, split.threshold);

        // Reserve the slot, children are appended after it
        state.nodes.push(Node::internal(
            current_idx,
            split.feature_idx as i32,
            split.threshold,
            -1,
            -1,
        ));
        state.gains[split.feature_idx] += split.gain;

        let left_idx = self.build_node(&left_indices, depth + 1, node_id * 2 + 1, state);
        let right_idx = self.build_node(&right_indices, depth + 1, node_id * 2 + 2, state);

        let node = &mut state.nodes[current_idx as usize];
        node.left = left_idx;
        node.right = right_idx;

        current_idx
    }

    /// Scan every feature's sorted values for the best boundary
    fn find_best_split(&self, indices: &[usize], node_id: usize) -> Option<SplitCandidate> {
        let (g_total, h_total) = self.sum_gradients_hessians(indices);
        let parent_score = score(g_total, h_total);
        let min_leaf = self.config.min_samples_leaf.max(1);
        let n = indices.len();

        let mut best: Option<SplitCandidate> = None;
        let mut sorted = indices.to_vec();

        for feature_idx in 0..self.feature_count {
            sorted.sort_by(|&a, &b| {
                self.features[a][feature_idx]
                    .total_cmp(&self.features[b][feature_idx])
                    .then(a.cmp(&b))
            });

            let mut g_left = 0.0;
            let mut h_left = 0.0;

            for pos in 0..n - 1 {
                let idx = sorted[pos];
                g_left += self.gradients[idx];
                h_left += self.hessians[idx];

                let left_count = pos + 1;
                let right_count = n - left_count;
                if left_count < min_leaf {
                    continue;
                }
                if right_count < min_leaf {
                    break;
                }

                let current = self.features[idx][feature_idx];
                let next = self.features[sorted[pos + 1]][feature_idx];
                if current >= next {
                    continue;
                }

                let g_right = g_total - g_left;
                let h_right = h_total - h_left;
                let gain = score(g_left, h_left) + score(g_right, h_right) - parent_score;
                if !(gain > MIN_GAIN) {
                    continue;
                }

                let candidate = SplitCandidate {
                    feature_idx,
                    threshold: midpoint(current, next),
                    gain,
                    tie_breaker: SplitTieBreaker::new(feature_idx, pos, node_id),
                };

                if best.as_ref().map_or(true, |b| candidate.beats(b)) {
                    best = Some(candidate);
                }
            }
        }

        best
    }

    fn split_samples(&self, indices: &[usize], feature_idx: usize, threshold: f64) -> (Vec<usize>, Vec<usize>) {
        indices
            .iter()
            .partition(|&&idx| self.features[idx][feature_idx] <= threshold)
    }

    fn sum_gradients_hessians(&self, indices: &[usize]) -> (f64, f64) {
        indices.iter().fold((0.0, 0.0), |(g, h), &idx| {
            (g + self.gradients[idx], h + self.hessians[idx])
        })
    }

    /// Optimal leaf value: -G/H
    fn calculate_leaf_value(&self, indices: &[usize]) -> f64 {
        let (sum_g, sum_h) = self.sum_gradients_hessians(indices);
        if sum_h <= 0.0 {
            return 0.0;
        }
        -sum_g / sum_h
    }
}

fn score(g: f64, h: f64) -> f64 {
    if h > 0.0 {
        g * g / h
    } else {
        0.0
    }
}

/// Threshold between two distinct sorted values that still separates them
fn midpoint(low: f64, high: f64) -> f64 {
    let mid = low + (high - low) / 2.0;
    if mid >= high || !mid.is_finite() {
        low
    } else {
        mid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mean_targets_builder<'a>(
        features: &'a [Vec<f64>],
        gradients: &'a [f64],
        hessians: &'a [f64],
        config: TreeConfig,
    ) -> CartBuilder<'a> {
        CartBuilder::new(features, gradients, hessians, config)
    }

    #[test]
    fn test_simple_tree_separates_step() {
        let features = vec![vec![1.0], vec![2.0], vec![3.0], vec![4.0]];
        let targets = [10.0, 10.0, 20.0, 20.0];
        let gradients: Vec<f64> = targets.iter().map(|t| -t).collect();
        let hessians = vec![1.0; 4];

        let config = TreeConfig {
            max_depth: 2,
            min_samples_split: 2,
            min_samples_leaf: 1,
        };
        let fitted = mean_targets_builder(&features, &gradients, &hessians, config).build();

        assert_eq!(fitted.tree.nodes[0].threshold, 2.5);
        assert_eq!(fitted.tree.evaluate(&[1.5]), 10.0);
        assert_eq!(fitted.tree.evaluate(&[3.5]), 20.0);
        assert!(fitted.gains[0] > 0.0);
        assert!(fitted.tree.validate(1).is_ok());
    }

    #[test]
    fn test_leaf_only_tree() {
        let features = vec![vec![1.0]];
        let gradients = vec![-5.0];
        let hessians = vec![1.0];

        let fitted = CartBuilder::new(&features, &gradients, &hessians, TreeConfig::default()).build();

        assert_eq!(fitted.tree.nodes.len(), 1);
        assert_eq!(fitted.tree.nodes[0].leaf, Some(5.0));
    }

    #[test]
    fn test_pure_node_is_not_split() {
        let features = vec![vec![1.0], vec![2.0], vec![3.0]];
        let gradients = vec![-7.0; 3];
        let hessians = vec![1.0; 3];

        let fitted = CartBuilder::new(&features, &gradients, &hessians, TreeConfig::default()).build();
        assert_eq!(fitted.tree.nodes.len(), 1);
    }

    #[test]
    fn test_min_samples_leaf_respected() {
        let features: Vec<Vec<f64>> = (0..6).map(|i| vec![i as f64]).collect();
        let gradients = vec![-1.0, -1.0, -1.0, -1.0, -1.0, -100.0];
        let hessians = vec![1.0; 6];
        let config = TreeConfig {
            max_depth: 4,
            min_samples_split: 2,
            min_samples_leaf: 2,
        };

        let fitted = CartBuilder::new(&features, &gradients, &hessians, config).build();
        // The outlier cannot be isolated into a single-sample leaf
        assert!(fitted.tree.evaluate(&[5.0]) < 100.0);
    }

    #[test]
    fn test_depth_limit() {
        let features: Vec<Vec<f64>> = (0..32).map(|i| vec![i as f64]).collect();
        let gradients: Vec<f64> = (0..32).map(|i| -(i as f64)).collect();
        let hessians = vec![1.0; 32];
        let config = TreeConfig {
            max_depth: 3,
            min_samples_split: 2,
            min_samples_leaf: 1,
        };

        let fitted = CartBuilder::new(&features, &gradients, &hessians, config).build();
        assert!(fitted.tree.depth() <= 3);
        assert!(fitted.tree.leaf_count() <= 8);
    }

    #[test]
    fn test_bootstrap_multiset_weights_duplicates() {
        let features = vec![vec![0.0], vec![1.0]];
        let gradients = vec![-0.0, -10.0];
        let hessians = vec![1.0, 1.0];

        let builder = CartBuilder::new(&features, &gradients, &hessians, TreeConfig {
            max_depth: 0,
            ..TreeConfig::default()
        });
        let fitted = builder.build_on(&[1, 1, 1, 0]);
        assert_eq!(fitted.tree.nodes[0].leaf, Some(7.5));
    }

    #[test]
    fn test_build_is_deterministic() {
        let features: Vec<Vec<f64>> = (0..20)
            .map(|i| vec![(i % 7) as f64, (i * 3 % 5) as f64])
            .collect();
        let gradients: Vec<f64> = (0..20).map(|i| -((i % 4) as f64)).collect();
        let hessians = vec![1.0; 20];

        let a = CartBuilder::new(&features, &gradients, &hessians, TreeConfig::default()).build();
        let b = CartBuilder::new(&features, &gradients, &hessians, TreeConfig::default()).build();
        assert_eq!(a.tree, b.tree);
        assert_eq!(a.gains, b.gains);
    }
}
