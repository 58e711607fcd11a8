use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::model::{
    ElementId, GroupDescriptor, NodeData, TreeKey, WeightedTree, WeightedTreeSet,
    descriptor_for_level, merge_forest,
};

/// Regroup the forests of `set` by `descriptor`.
///
/// - `All` merges every forest of every element into a single `"All"`
///   element.
/// - Any other level merges, for each element at that level, its own forest
///   and the forests of all its descendant elements into one destination
///   element named after it. Elements of the same name share a destination.
/// - Elements above the level are descended through; their own forests, if
///   they have any, are kept unmerged. Leaf elements that never reach the
///   level are kept as they are.
/// - The children of a non-matching element are searched with the same
///   descriptor, not its next level, so a match further down is still found.
///
/// The input set is not modified.
pub fn group_weighted_tree_by<T: TreeKey, D: NodeData>(
    descriptor: &Arc<GroupDescriptor>,
    set: &WeightedTreeSet<T, D>,
) -> WeightedTreeSet<T, D> {
    let mut grouped = WeightedTreeSet::new();
    if set.root_elements().is_empty() {
        return grouped;
    }

    if descriptor.is_all() {
        let mut merged = HashMap::new();
        for &root in set.root_elements() {
            collect_subtree(set, root, &mut merged);
        }
        let all = grouped.add_element(GroupDescriptor::ALL_NAME, Some(Arc::clone(descriptor)), None);
        for tree in merged.into_values() {
            grouped.add_weighted_tree(all, tree);
        }
    } else {
        for &root in set.root_elements() {
            search_for_groups(set, root, descriptor, &mut grouped);
        }
    }

    debug!(
        group = descriptor.name(),
        input_elements = set.root_elements().len(),
        output_elements = grouped.root_elements().len(),
        total_weight = grouped.total_weight(),
        "grouped weighted trees"
    );
    grouped
}

/// Resolve `level` against the hierarchy starting at `root` (0 is `All`)
/// and group by it. A level past the leaf leaves the set as it is.
pub fn group_by_level<T: TreeKey, D: NodeData>(
    set: &WeightedTreeSet<T, D>,
    root: Option<&Arc<GroupDescriptor>>,
    level: usize,
) -> WeightedTreeSet<T, D> {
    match descriptor_for_level(root, level) {
        Some(descriptor) => group_weighted_tree_by(&descriptor, set),
        None => {
            debug!(level, "grouping level past the hierarchy, keeping elements as is");
            set.clone()
        }
    }
}

/// Merge the forest of `element` and of every descendant element into `into`.
fn collect_subtree<T: TreeKey, D: NodeData>(
    set: &WeightedTreeSet<T, D>,
    element: ElementId,
    into: &mut HashMap<T, WeightedTree<T, D>>,
) {
    merge_forest(into, set.trees_for(element).iter().cloned());
    for &child in set.children_of(element) {
        collect_subtree(set, child, into);
    }
}

fn search_for_groups<T: TreeKey, D: NodeData>(
    set: &WeightedTreeSet<T, D>,
    element: ElementId,
    descriptor: &Arc<GroupDescriptor>,
    grouped: &mut WeightedTreeSet<T, D>,
) {
    let Some(node) = set.element(element) else {
        return;
    };

    if node.is_grouped_by(descriptor) {
        let mut merged = HashMap::new();
        collect_subtree(set, element, &mut merged);
        let destination = grouped.ensure_element(&node.name, Some(Arc::clone(descriptor)), None);
        for tree in merged.into_values() {
            grouped.add_weighted_tree(destination, tree);
        }
        return;
    }

    let own_trees = set.trees_for(element);
    if !own_trees.is_empty() {
        let copy = grouped.add_element(node.name.clone(), node.group.clone(), None);
        for tree in own_trees {
            grouped.add_weighted_tree(copy, tree.clone());
        }
    }

    for &child in set.children_of(element) {
        search_for_groups(set, child, descriptor, grouped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Tree = WeightedTree<&'static str>;

    fn tree(object: &'static str, weight: i64, children: Vec<Tree>) -> Tree {
        let mut t = Tree::new(object, weight);
        for c in children {
            t.add_child(c);
        }
        t
    }

    /// Two processes, each with threads:
    /// `app -> {t1: {f:10}, t2: {f:20}}`, `db -> {t3: {g:5}}`.
    fn process_thread_set() -> (WeightedTreeSet<&'static str>, Arc<GroupDescriptor>) {
        let process = GroupDescriptor::hierarchy(["process", "thread"]).unwrap();
        let thread = process.next_group().cloned();
        let mut set = WeightedTreeSet::new();
        let app = set.add_element("app", Some(process.clone()), None);
        let db = set.add_element("db", Some(process.clone()), None);
        let t1 = set.add_element("t1", thread.clone(), Some(app));
        let t2 = set.add_element("t2", thread.clone(), Some(app));
        let t3 = set.add_element("t3", thread, Some(db));
        set.add_weighted_tree(t1, tree("f", 10, vec![tree("x", 4, vec![])]));
        set.add_weighted_tree(t2, tree("f", 20, vec![tree("x", 1, vec![]), tree("y", 2, vec![])]));
        set.add_weighted_tree(t3, tree("g", 5, vec![]));
        (set, process)
    }

    fn weights(set: &WeightedTreeSet<&'static str>, element: ElementId) -> Vec<(&'static str, i64)> {
        let mut w: Vec<_> = set.trees_for(element).iter().map(|t| (*t.object(), t.weight())).collect();
        w.sort();
        w
    }

    #[test]
    fn all_merges_everything() {
        let (set, process) = process_thread_set();
        let grouped = group_weighted_tree_by(&GroupDescriptor::all(Some(process)), &set);

        assert_eq!(grouped.root_elements().len(), 1);
        let all = grouped.root_elements()[0];
        assert_eq!(grouped.name_of(all).map(|n| n.to_string()), Some("All".to_owned()));
        assert_eq!(weights(&grouped, all), vec![("f", 30), ("g", 5)]);
        let f = &grouped.trees_for(all).iter().find(|t| *t.object() == "f").unwrap();
        assert_eq!(f.child(&"x").map(Tree::weight), Some(5));
        assert_eq!(f.child(&"y").map(Tree::weight), Some(2));
        assert_eq!(grouped.total_weight(), set.total_weight());
    }

    #[test]
    fn grouping_by_process_merges_threads() {
        let (set, process) = process_thread_set();
        let grouped = group_weighted_tree_by(&process, &set);

        assert_eq!(grouped.root_elements().len(), 2);
        let app = grouped.find_element(None, "app").unwrap();
        let db = grouped.find_element(None, "db").unwrap();
        assert_eq!(weights(&grouped, app), vec![("f", 30)]);
        assert_eq!(weights(&grouped, db), vec![("g", 5)]);
        assert_eq!(grouped.element(app).and_then(|e| e.group.clone()), Some(process));
    }

    #[test]
    fn grouping_by_thread_descends_through_processes() {
        let (set, process) = process_thread_set();
        let thread = process.next_group().cloned().unwrap();
        let grouped = group_weighted_tree_by(&thread, &set);

        assert_eq!(grouped.root_elements().len(), 3);
        let t2 = grouped.find_element(None, "t2").unwrap();
        assert_eq!(weights(&grouped, t2), vec![("f", 20)]);
        assert_eq!(grouped.total_weight(), 35);
    }

    #[test]
    fn same_named_elements_share_a_destination() {
        let process = GroupDescriptor::hierarchy(["process"]).unwrap();
        let mut set = WeightedTreeSet::new();
        let a = set.add_element("worker", Some(process.clone()), None);
        let b = set.add_element("worker", Some(process.clone()), None);
        set.add_weighted_tree(a, tree("f", 1, vec![]));
        set.add_weighted_tree(b, tree("f", 2, vec![]));

        let grouped = group_weighted_tree_by(&process, &set);
        assert_eq!(grouped.root_elements().len(), 1);
        assert_eq!(weights(&grouped, grouped.root_elements()[0]), vec![("f", 3)]);
    }

    #[test]
    fn unmatched_elements_keep_their_own_forest() {
        let levels = GroupDescriptor::hierarchy(["process", "thread"]).unwrap();
        let other = GroupDescriptor::level("cpu", None);
        let mut set = WeightedTreeSet::new();
        let app = set.add_element("app", Some(levels.clone()), None);
        let t1 = set.add_element("t1", levels.next_group().cloned(), Some(app));
        set.add_weighted_tree(app, tree("init", 7, vec![]));
        set.add_weighted_tree(t1, tree("f", 3, vec![]));

        let grouped = group_weighted_tree_by(&other, &set);
        assert_eq!(grouped.total_weight(), 10);
        let app = grouped.find_element(None, "app").unwrap();
        let t1 = grouped.find_element(None, "t1").unwrap();
        assert_eq!(weights(&grouped, app), vec![("init", 7)]);
        assert_eq!(weights(&grouped, t1), vec![("f", 3)]);
    }

    #[test]
    fn empty_input_gives_empty_output() {
        let set = WeightedTreeSet::<&'static str>::new();
        let grouped = group_weighted_tree_by(&GroupDescriptor::all(None), &set);
        assert!(grouped.is_empty());
        assert!(grouped.root_elements().is_empty());
    }

    #[test]
    fn input_is_left_untouched() {
        let (set, process) = process_thread_set();
        let before = set.total_weight();
        let _ = group_weighted_tree_by(&GroupDescriptor::all(Some(process)), &set);
        assert_eq!(set.total_weight(), before);
        let t1 = set.find_path(&["app".into(), "t1".into()]).unwrap();
        assert_eq!(weights(&set, t1), vec![("f", 10)]);
    }

    #[test]
    fn level_resolution() {
        let (set, process) = process_thread_set();
        assert_eq!(group_by_level(&set, Some(&process), 0).root_elements().len(), 1);
        assert_eq!(group_by_level(&set, Some(&process), 1).root_elements().len(), 2);
        assert_eq!(group_by_level(&set, Some(&process), 2).root_elements().len(), 3);
        let unchanged = group_by_level(&set, Some(&process), 5);
        assert_eq!(unchanged.root_elements(), set.root_elements());
        assert!(unchanged.name_of(unchanged.root_elements()[0]).is_some_and(|n| n == "app"));
    }
}
