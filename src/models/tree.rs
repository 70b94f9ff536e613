//! Arena-backed decision trees shared by every model family.
//!
//! Leaves hold a vector of values written into consecutive output slots
//! starting at the tree's `output_offset`. Forests store class probabilities
//! (one slot per class), boosters store a single margin per tree. Every node
//! keeps its cover (number of training rows reaching it), which TreeSHAP uses
//! to weight the branches a feature does not decide.
use ndarray::Array2;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Leaf {
        values: Vec<f64>,
        cover: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        /// Route for `NaN` feature values.
        missing_left: bool,
        left: usize,
        right: usize,
        cover: f64,
        /// Loss reduction (or weighted impurity decrease) of this split.
        gain: f64,
    },
}

impl Node {
    pub fn cover(&self) -> f64 {
        match self {
            Node::Leaf { cover, .. } | Node::Split { cover, .. } => *cover,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    nodes: Vec<Node>,
    output_offset: usize,
}

impl Tree {
    pub fn new(output_offset: usize) -> Self {
        Tree {
            nodes: Vec::new(),
            output_offset,
        }
    }

    /// Reserve a slot for a node whose children are not built yet.
    pub fn reserve(&mut self) -> usize {
        self.nodes.push(Node::Leaf {
            values: Vec::new(),
            cover: 0.0,
        });
        self.nodes.len() - 1
    }

    pub fn set(&mut self, idx: usize, node: Node) {
        self.nodes[idx] = node;
    }

    pub fn push(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub fn root(&self) -> usize {
        0
    }

    pub fn node(&self, idx: usize) -> &Node {
        &self.nodes[idx]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn output_offset(&self) -> usize {
        self.output_offset
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    pub fn depth(&self) -> usize {
        fn walk(tree: &Tree, idx: usize) -> usize {
            match tree.node(idx) {
                Node::Leaf { .. } => 1,
                Node::Split { left, right, .. } => 1 + walk(tree, *left).max(walk(tree, *right)),
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(self, self.root())
        }
    }

    /// Index of the leaf reached by `row`.
    pub fn leaf_for(&self, row: &[f64]) -> usize {
        let mut idx = self.root();
        loop {
            match &self.nodes[idx] {
                Node::Leaf { .. } => return idx,
                Node::Split {
                    feature,
                    threshold,
                    missing_left,
                    left,
                    right,
                    ..
                } => {
                    idx = if goes_left(row[*feature], *threshold, *missing_left) {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    /// Cover-weighted mean of the leaf values: the tree's expected output.
    pub fn expected_values(&self, n_outputs: usize) -> Vec<f64> {
        let mut expected = vec![0.0; n_outputs];
        let root_cover = self.nodes.first().map(Node::cover).unwrap_or(0.0);
        if root_cover <= 0.0 {
            return expected;
        }
        for node in &self.nodes {
            if let Node::Leaf { values, cover } = node {
                for (k, v) in values.iter().enumerate() {
                    expected[k] += v * cover / root_cover;
                }
            }
        }
        expected
    }
}

/// Routing rule shared by training, prediction and attribution.
#[inline]
pub fn goes_left(value: f64, threshold: f64, missing_left: bool) -> bool {
    if value.is_nan() {
        missing_left
    } else {
        value <= threshold
    }
}

/// A fitted tree ensemble: `output = base_score + scale * sum(tree leaves)`.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeEnsemble {
    trees: Vec<Tree>,
    n_features: usize,
    n_outputs: usize,
    scale: f64,
    base_score: Vec<f64>,
}

impl TreeEnsemble {
    pub fn new(
        trees: Vec<Tree>,
        n_features: usize,
        n_outputs: usize,
        scale: f64,
        base_score: Vec<f64>,
    ) -> Self {
        TreeEnsemble {
            trees,
            n_features,
            n_outputs,
            scale,
            base_score,
        }
    }

    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_outputs(&self) -> usize {
        self.n_outputs
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn base_score(&self) -> &[f64] {
        &self.base_score
    }

    /// Raw ensemble output, shape `(n_samples, n_outputs)`.
    pub fn predict(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut out = Array2::zeros((x.nrows(), self.n_outputs));
        for (r, row) in x.outer_iter().enumerate() {
            let row = row.to_vec();
            for tree in &self.trees {
                if let Node::Leaf { values, .. } = tree.node(tree.leaf_for(&row)) {
                    for (k, v) in values.iter().enumerate() {
                        out[[r, tree.output_offset() + k]] += self.scale * v;
                    }
                }
            }
            for (k, base) in self.base_score.iter().enumerate() {
                out[[r, k]] += base;
            }
        }
        out
    }

    /// Summed split gain per feature.
    ///
    /// With `normalize_per_tree` each tree's gains are scaled to sum to one
    /// before averaging over trees (mean decrease in impurity); otherwise raw
    /// gains are summed (total gain).
    pub fn split_gains(&self, normalize_per_tree: bool) -> Vec<f64> {
        let mut totals = vec![0.0; self.n_features];
        for tree in &self.trees {
            let mut gains = vec![0.0; self.n_features];
            for node in tree.nodes() {
                if let Node::Split { feature, gain, .. } = node {
                    gains[*feature] += gain.max(0.0);
                }
            }
            if normalize_per_tree {
                let sum: f64 = gains.iter().sum();
                if sum > 0.0 {
                    gains.iter_mut().for_each(|g| *g /= sum);
                }
            }
            for (total, g) in totals.iter_mut().zip(gains) {
                *total += g;
            }
        }
        if normalize_per_tree && !self.trees.is_empty() {
            let n = self.trees.len() as f64;
            totals.iter_mut().for_each(|t| *t /= n);
        }
        totals
    }
}
