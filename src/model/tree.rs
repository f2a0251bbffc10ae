//! CART regression tree with squared-error splits, shared by both tree ensembles.

use ndarray::{ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxFeatures {
    All,
    Sqrt,
}

impl MaxFeatures {
    fn count(self, n_features: usize) -> usize {
        match self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => ((n_features as f64).sqrt() as usize).max(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
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

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    n_features: usize,
    nodes: Vec<Node>,
    /// Impurity decrease per feature, normalized to sum to one (all zero for a stump).
    importances: Vec<f64>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    position: usize,
    decrease: f64,
}

struct Grower<'a> {
    x: ArrayView2<'a, f64>,
    y: &'a [f64],
    params: TreeParams,
    nodes: Vec<Node>,
    importances: Vec<f64>,
}

impl RegressionTree {
    /// Fit on the rows listed in `rows` (duplicates allowed, as in a bootstrap sample).
    pub fn fit(
        x: ArrayView2<f64>,
        y: &[f64],
        rows: &[usize],
        params: TreeParams,
        rng: &mut StdRng,
    ) -> Self {
        let n_features = x.ncols();
        let mut grower = Grower {
            x: x.view(),
            y,
            params,
            nodes: Vec::new(),
            importances: vec![0.0; n_features],
        };
        let mut rows = rows.to_vec();
        grower.grow(&mut rows, 0, rng);

        let total: f64 = grower.importances.iter().sum();
        if total > 0.0 {
            grower.importances.iter_mut().for_each(|v| *v /= total);
        }
        Self {
            n_features,
            nodes: grower.nodes,
            importances: grower.importances,
        }
    }

    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut id = 0;
        loop {
            match self.nodes.get(id) {
                Some(Node::Leaf { value }) => return *value,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    id = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                None => return 0.0,
            }
        }
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn importances(&self) -> &[f64] {
        &self.importances
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], id: usize) -> usize {
            match nodes.get(id) {
                Some(Node::Split { left, right, .. }) => 1 + walk(nodes, *left).max(walk(nodes, *right)),
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }
}

impl Grower<'_> {
    fn grow(&mut self, rows: &mut [usize], depth: usize, rng: &mut StdRng) -> usize {
        let id = self.nodes.len();
        let value = rows.iter().map(|&r| self.y[r]).sum::<f64>() / rows.len().max(1) as f64;
        self.nodes.push(Node::Leaf { value });

        if depth >= self.params.max_depth || rows.len() < self.params.min_samples_split {
            return id;
        }
        let Some(split) = self.best_split(rows, rng) else {
            return id;
        };

        self.importances[split.feature] += split.decrease;
        let feature = split.feature;
        rows.sort_by(|&a, &b| self.x[[a, feature]].total_cmp(&self.x[[b, feature]]));
        let (left_rows, right_rows) = rows.split_at_mut(split.position);
        let left = self.grow(left_rows, depth + 1, rng);
        let right = self.grow(right_rows, depth + 1, rng);
        self.nodes[id] = Node::Split {
            feature,
            threshold: split.threshold,
            left,
            right,
        };
        id
    }

    fn best_split(&self, rows: &[usize], rng: &mut StdRng) -> Option<BestSplit> {
        let n = rows.len();
        let min_leaf = self.params.min_samples_leaf.max(1);
        if n < 2 * min_leaf {
            return None;
        }
        let (sum, sum_sq) = rows.iter().fold((0.0, 0.0), |(s, q), &r| {
            (s + self.y[r], q + self.y[r] * self.y[r])
        });
        let parent_sse = sum_sq - sum * sum / n as f64;
        if parent_sse <= f64::EPSILON {
            return None;
        }

        let mut candidates: Vec<usize> = (0..self.x.ncols()).collect();
        candidates.shuffle(rng);
        let budget = self.params.max_features.count(self.x.ncols());

        let mut best: Option<BestSplit> = None;
        let mut order = rows.to_vec();
        // Past the feature budget, keep drawing only until some valid split exists.
        for (visited, feature) in candidates.into_iter().enumerate() {
            if visited >= budget && best.is_some() {
                break;
            }
            order.sort_by(|&a, &b| self.x[[a, feature]].total_cmp(&self.x[[b, feature]]));
            let (mut left_sum, mut left_sq) = (0.0, 0.0);
            for position in 1..n {
                let previous = order[position - 1];
                left_sum += self.y[previous];
                left_sq += self.y[previous] * self.y[previous];
                if position < min_leaf || n - position < min_leaf {
                    continue;
                }
                let (lo, hi) = (self.x[[previous, feature]], self.x[[order[position], feature]]);
                if hi <= lo {
                    continue;
                }
                let (left_n, right_n) = (position as f64, (n - position) as f64);
                let right_sum = sum - left_sum;
                let right_sq = sum_sq - left_sq;
                let children_sse = (left_sq - left_sum * left_sum / left_n)
                    + (right_sq - right_sum * right_sum / right_n);
                let decrease = parent_sse - children_sse;
                if decrease > best.as_ref().map_or(f64::EPSILON, |b| b.decrease) {
                    best = Some(BestSplit {
                        feature,
                        threshold: lo + (hi - lo) / 2.0,
                        position,
                        decrease,
                    });
                }
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};
    use rand::SeedableRng;

    fn params(max_depth: usize) -> TreeParams {
        TreeParams {
            max_depth,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
        }
    }

    #[test]
    fn learns_a_step_function() {
        let x = array![[0.0, 5.0], [1.0, 5.0], [2.0, 5.0], [3.0, 5.0]];
        let y = [1.0, 1.0, 4.0, 4.0];
        let mut rng = StdRng::seed_from_u64(0);
        let tree = RegressionTree::fit(x.view(), &y, &[0, 1, 2, 3], params(3), &mut rng);
        assert_eq!(tree.predict_row(array![0.5, 0.0].view()), 1.0);
        assert_eq!(tree.predict_row(array![2.5, 0.0].view()), 4.0);
        assert_eq!(tree.importances(), &[1.0, 0.0]);
        assert_eq!(tree.depth(), 1);
    }

    #[test]
    fn depth_is_bounded() {
        let x = Array2::from_shape_fn((32, 1), |(r, _)| r as f64);
        let y: Vec<f64> = (0..32).map(|v| (v * v) as f64).collect();
        let rows: Vec<usize> = (0..32).collect();
        let mut rng = StdRng::seed_from_u64(0);
        let tree = RegressionTree::fit(x.view(), &y, &rows, params(2), &mut rng);
        assert!(tree.depth() <= 2);
    }

    #[test]
    fn min_leaf_prevents_tiny_children() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = [0.0, 0.0, 0.0, 10.0];
        let mut rng = StdRng::seed_from_u64(0);
        let tree = RegressionTree::fit(
            x.view(),
            &y,
            &[0, 1, 2, 3],
            TreeParams {
                min_samples_leaf: 2,
                ..params(3)
            },
            &mut rng,
        );
        // The only admissible split is 2|2.
        assert_eq!(tree.predict_row(array![3.0].view()), 5.0);
    }

    #[test]
    fn constant_target_is_a_single_leaf() {
        let x = array![[0.0], [1.0], [2.0]];
        let mut rng = StdRng::seed_from_u64(0);
        let tree = RegressionTree::fit(x.view(), &[3.0; 3], &[0, 1, 2], params(5), &mut rng);
        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.importances(), &[0.0]);
        assert_eq!(tree.predict_row(array![9.0].view()), 3.0);
    }
}
