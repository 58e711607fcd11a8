use std::borrow::Cow;
use std::collections::HashMap;

use tracing::{debug, trace};
use weighted_tree_protocol::SharedStr;

use crate::model::{
    Difference, DifferentialWeightedTree, DifferentialWeightedTreeSet, ElementId, NodeData,
    TreeKey, WeightedTree, WeightedTreeSet,
};

/// Compare two forests key by key.
///
/// Every comparison node becomes a differential node carrying its own weight
/// and its relative change against the baseline node found at the same key
/// path. Nodes that only exist in the baseline do not appear in the result.
/// Roots of the same key are merged on either side before comparing.
pub fn diff_trees<'a, 'b, T, B, C>(
    baseline: impl IntoIterator<Item = &'a WeightedTree<T, B>>,
    comparison: impl IntoIterator<Item = &'b WeightedTree<T, C>>,
) -> Vec<DifferentialWeightedTree<T>>
where
    T: TreeKey + 'a + 'b,
    B: NodeData + 'a,
    C: NodeData + 'b,
{
    let mut index: HashMap<&T, Cow<'a, WeightedTree<T, B>>> = HashMap::new();
    for tree in baseline {
        match index.get_mut(tree.object()) {
            Some(existing) => existing.to_mut().merge_unchecked(tree),
            None => {
                index.insert(tree.object(), Cow::Borrowed(tree));
            }
        }
    }

    let mut roots: Vec<Cow<'b, WeightedTree<T, C>>> = Vec::new();
    for tree in comparison {
        match roots.iter_mut().find(|r| r.object() == tree.object()) {
            Some(existing) => existing.to_mut().merge_unchecked(tree),
            None => roots.push(Cow::Borrowed(tree)),
        }
    }

    let diffs: Vec<DifferentialWeightedTree<T>> = roots
        .iter()
        .map(|tree| diff_node(tree, index.get(tree.object()).map(|b| &**b)))
        .collect();

    trace!(
        baseline_roots = index.len(),
        comparison_roots = diffs.len(),
        "diffed forests"
    );
    diffs
}

fn diff_node<T: TreeKey, B: NodeData, C: NodeData>(
    node: &WeightedTree<T, C>,
    base: Option<&WeightedTree<T, B>>,
) -> DifferentialWeightedTree<T> {
    let difference = Difference::between(base.map(WeightedTree::weight), node.weight());
    let mut diff = DifferentialWeightedTree::differential(node.object().clone(), node.weight(), difference);
    for child in node.children() {
        let base_child = base.and_then(|b| b.child(child.object()));
        diff.add_child(diff_node(child, base_child));
    }
    diff
}

/// Compare two tree sets element by element.
///
/// The result mirrors the comparison set's element hierarchy. Elements are
/// paired by their name path from the root; a comparison element without a
/// baseline counterpart is compared against an empty forest. Returns `None`
/// when the comparison set has no elements.
pub fn diff_tree_sets<T, B, C>(
    baseline: &WeightedTreeSet<T, B>,
    comparison: &WeightedTreeSet<T, C>,
) -> Option<DifferentialWeightedTreeSet<T>>
where
    T: TreeKey,
    B: NodeData,
    C: NodeData,
{
    if comparison.root_elements().is_empty() {
        debug!("comparison set has no elements, nothing to diff");
        return None;
    }

    let mut base_paths: HashMap<Vec<SharedStr>, Vec<ElementId>> = HashMap::new();
    for id in (0..baseline.element_count()).map(ElementId) {
        base_paths.entry(baseline.path_of(id)).or_default().push(id);
    }

    let mut diffs = DifferentialWeightedTreeSet::new();
    let mut pending: Vec<Pending<'_, T, C>> = Vec::new();
    for &root in comparison.root_elements() {
        mirror_element(comparison, root, None, &mut diffs, &mut pending);
    }

    // Elements sharing a name path diff their combined forests once.
    for Pending { mirrored, path, trees } in pending {
        let base_trees = base_paths
            .get(&path)
            .into_iter()
            .flatten()
            .flat_map(|&e| baseline.trees_for(e));
        for tree in diff_trees(base_trees, trees) {
            diffs.add_weighted_tree(mirrored, tree);
        }
    }
    diffs.set_extra_data_sets(comparison.extra_data_sets().to_vec());

    debug!(
        elements = diffs.element_count(),
        comparison_weight = comparison.total_weight(),
        baseline_weight = baseline.total_weight(),
        "diffed tree sets"
    );
    Some(diffs)
}

/// Comparison trees gathered for one element of the result.
struct Pending<'c, T, C> {
    mirrored: ElementId,
    path: Vec<SharedStr>,
    trees: Vec<&'c WeightedTree<T, C>>,
}

fn mirror_element<'c, T: TreeKey, C: NodeData>(
    comparison: &'c WeightedTreeSet<T, C>,
    element: ElementId,
    parent: Option<ElementId>,
    into: &mut DifferentialWeightedTreeSet<T>,
    pending: &mut Vec<Pending<'c, T, C>>,
) {
    let Some(source) = comparison.element(element) else {
        return;
    };
    let mirrored = into.ensure_element(&source.name, source.group.clone(), parent);

    let trees = comparison.trees_for(element);
    if !trees.is_empty() {
        match pending.iter_mut().find(|p| p.mirrored == mirrored) {
            Some(existing) => existing.trees.extend(trees),
            None => pending.push(Pending {
                mirrored,
                path: comparison.path_of(element),
                trees: trees.iter().collect(),
            }),
        }
    }

    for &child in comparison.children_of(element) {
        mirror_element(comparison, child, Some(mirrored), into, pending);
    }
}
