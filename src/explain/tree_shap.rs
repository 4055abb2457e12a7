//! Exact path-dependent TreeSHAP for a single tree.
//!
//! Follows Lundberg, Erion & Lee, "Consistent Individualized Feature Attribution
//! for Tree Ensembles" (Algorithm 2). Node covers play the role of the training
//! distribution: when a feature is not in the coalition, both children are
//! visited and weighted by their share of the parent's cover.
//!
//! The result satisfies local accuracy per tree:
//! `tree.expected_value() + Σ phi == tree.leaf_value(x)`.

use crate::models::{Node, Tree};

/// One element of the unique feature path from the root to the current node.
#[derive(Debug, Clone, Copy)]
struct PathElement {
    /// Feature split on, or `None` for the root sentinel.
    feature: Option<usize>,
    /// Fraction of "feature absent" paths flowing through this element.
    zero_fraction: f64,
    /// 1 if `x` follows this element's branch, else 0.
    one_fraction: f64,
    /// Permutation weight.
    pweight: f64,
}

/// Add this tree's attributions for `x` into `phi` (one slot per feature).
pub fn tree_shap(tree: &Tree, x: &[f64], phi: &mut [f64]) {
    recurse(tree, x, phi, 0, &[], 0, 1.0, 1.0, None);
}

#[allow(clippy::too_many_arguments)]
fn recurse(
    tree: &Tree,
    x: &[f64],
    phi: &mut [f64],
    node: usize,
    parent_path: &[PathElement],
    unique_depth: usize,
    parent_zero_fraction: f64,
    parent_one_fraction: f64,
    parent_feature: Option<usize>,
) {
    let mut path: Vec<PathElement> = Vec::with_capacity(unique_depth + 1);
    path.extend_from_slice(&parent_path[..unique_depth]);
    extend_path(
        &mut path,
        unique_depth,
        parent_zero_fraction,
        parent_one_fraction,
        parent_feature,
    );

    match &tree.nodes[node] {
        Node::Leaf { value, .. } => {
            for i in 1..=unique_depth {
                let w = unwound_path_sum(&path, unique_depth, i);
                let el = path[i];
                if let Some(feature) = el.feature {
                    phi[feature] += w * (el.one_fraction - el.zero_fraction) * value;
                }
            }
        }
        Node::Split {
            feature,
            left,
            right,
            cover,
            ..
        } => {
            let hot = tree.next_node(node, x).unwrap_or(*left);
            let cold = if hot == *left { *right } else { *left };
            let hot_zero_fraction = tree.nodes[hot].cover() / cover;
            let cold_zero_fraction = tree.nodes[cold].cover() / cover;

            let mut unique_depth = unique_depth;
            let mut incoming_zero_fraction = 1.0;
            let mut incoming_one_fraction = 1.0;

            // A feature already on the path is undone so this split can redo it.
            let on_path = (1..=unique_depth).find(|&i| path[i].feature == Some(*feature));
            if let Some(path_index) = on_path {
                incoming_zero_fraction = path[path_index].zero_fraction;
                incoming_one_fraction = path[path_index].one_fraction;
                unwind_path(&mut path, unique_depth, path_index);
                unique_depth -= 1;
            }

            recurse(
                tree,
                x,
                phi,
                hot,
                &path,
                unique_depth + 1,
                hot_zero_fraction * incoming_zero_fraction,
                incoming_one_fraction,
                Some(*feature),
            );
            recurse(
                tree,
                x,
                phi,
                cold,
                &path,
                unique_depth + 1,
                cold_zero_fraction * incoming_zero_fraction,
                0.0,
                Some(*feature),
            );
        }
    }
}

/// Append a path element at `unique_depth` and update permutation weights.
fn extend_path(
    path: &mut Vec<PathElement>,
    unique_depth: usize,
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
) {
    path.truncate(unique_depth);
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        pweight: if unique_depth == 0 { 1.0 } else { 0.0 },
    });
    let d = unique_depth as f64;
    for i in (0..unique_depth).rev() {
        let fi = i as f64;
        path[i + 1].pweight += one_fraction * path[i].pweight * (fi + 1.0) / (d + 1.0);
        path[i].pweight = zero_fraction * path[i].pweight * (d - fi) / (d + 1.0);
    }
}

/// Remove the element at `path_index`, undoing its effect on the weights.
fn unwind_path(path: &mut Vec<PathElement>, unique_depth: usize, path_index: usize) {
    let one_fraction = path[path_index].one_fraction;
    let zero_fraction = path[path_index].zero_fraction;
    let d = unique_depth as f64;
    let mut next_one_portion = path[unique_depth].pweight;

    for i in (0..unique_depth).rev() {
        let fi = i as f64;
        if one_fraction != 0.0 {
            let tmp = path[i].pweight;
            path[i].pweight = next_one_portion * (d + 1.0) / ((fi + 1.0) * one_fraction);
            next_one_portion = tmp - path[i].pweight * zero_fraction * (d - fi) / (d + 1.0);
        } else {
            path[i].pweight = path[i].pweight * (d + 1.0) / (zero_fraction * (d - fi));
        }
    }

    for i in path_index..unique_depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
    path.truncate(unique_depth);
}

/// Total permutation weight of the path with element `path_index` removed.
fn unwound_path_sum(path: &[PathElement], unique_depth: usize, path_index: usize) -> f64 {
    let one_fraction = path[path_index].one_fraction;
    let zero_fraction = path[path_index].zero_fraction;
    let d = unique_depth as f64;
    let mut next_one_portion = path[unique_depth].pweight;
    let mut total = 0.0;

    for i in (0..unique_depth).rev() {
        let fi = i as f64;
        if one_fraction != 0.0 {
            let tmp = next_one_portion * (d + 1.0) / ((fi + 1.0) * one_fraction);
            total += tmp;
            next_one_portion = path[i].pweight - tmp * zero_fraction * ((d - fi) / (d + 1.0));
        } else if zero_fraction != 0.0 {
            total += (path[i].pweight / zero_fraction) / ((d - fi) / (d + 1.0));
        }
    }
    total
}
