use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use weighted_tree_protocol::SharedStr;

use super::differential::Difference;
use super::element::{Element, ElementId, GroupDescriptor};
use super::weighted_tree::{NodeData, TreeKey, WeightedTree};

/// Forests of weighted trees, each owned by an element of an element
/// hierarchy.
///
/// The set owns its elements; [`ElementId`]s are only meaningful for the set
/// that handed them out.
#[derive(Debug, Clone)]
pub struct WeightedTreeSet<T, D = ()> {
    elements: Vec<Element>,
    roots: Vec<ElementId>,
    trees: HashMap<ElementId, Vec<WeightedTree<T, D>>>,
    extra_data_sets: Vec<String>,
}

/// Differential trees grouped by element.
pub type DifferentialWeightedTreeSet<T> = WeightedTreeSet<T, Difference>;

/// Name of the single element of sets built with [`WeightedTreeSet::from_trees`]
/// for differential output.
pub const DIFF_ELEMENT: &str = "diff";

impl<T, D> Default for WeightedTreeSet<T, D> {
    fn default() -> Self {
        Self {
            elements: Vec::new(),
            roots: Vec::new(),
            trees: HashMap::new(),
            extra_data_sets: Vec::new(),
        }
    }
}

impl<T: TreeKey, D: NodeData> WeightedTreeSet<T, D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A set with one element holding `trees`.
    pub fn from_trees(
        element_name: impl Into<SharedStr>,
        trees: impl IntoIterator<Item = WeightedTree<T, D>>,
    ) -> Self {
        let mut set = Self::new();
        let element = set.add_element(element_name, None, None);
        for tree in trees {
            set.add_weighted_tree(element, tree);
        }
        set
    }

    /// Register an element. `parent`, if given, must come from this set.
    pub fn add_element(
        &mut self,
        name: impl Into<SharedStr>,
        group: Option<Arc<GroupDescriptor>>,
        parent: Option<ElementId>,
    ) -> ElementId {
        let id = ElementId(self.elements.len());
        let parent = parent.filter(|p| p.0 < self.elements.len());
        self.elements.push(Element {
            name: name.into(),
            group,
            parent,
            children: Vec::new(),
        });
        if let Some(parent) = parent {
            self.elements[parent.0].children.push(id);
        }
        id
    }

    /// The child of `parent` (or root when `None`) named `name`, created if
    /// missing.
    pub fn ensure_element(
        &mut self,
        name: &str,
        group: Option<Arc<GroupDescriptor>>,
        parent: Option<ElementId>,
    ) -> ElementId {
        match self.find_element(parent, name) {
            Some(id) => id,
            None => self.add_element(name, group, parent),
        }
    }

    pub fn find_element(&self, parent: Option<ElementId>, name: &str) -> Option<ElementId> {
        match parent {
            Some(parent) => self
                .children_of(parent)
                .iter()
                .copied()
                .find(|&c| self.elements[c.0].name == name),
            None => self
                .elements
                .iter()
                .position(|e| e.parent.is_none() && e.name == name)
                .map(ElementId),
        }
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(id.0)
    }

    pub fn name_of(&self, id: ElementId) -> Option<&SharedStr> {
        self.element(id).map(|e| &e.name)
    }

    pub fn children_of(&self, id: ElementId) -> &[ElementId] {
        self.element(id).map_or(&[], |e| e.children.as_slice())
    }

    pub fn parent_of(&self, id: ElementId) -> Option<ElementId> {
        self.element(id).and_then(|e| e.parent)
    }

    /// Walk parents until the top of the hierarchy.
    pub fn root_of(&self, id: ElementId) -> ElementId {
        let mut root = id;
        while let Some(parent) = self.parent_of(root) {
            root = parent;
        }
        root
    }

    /// Element names from the root down to `id`.
    pub fn path_of(&self, id: ElementId) -> Vec<SharedStr> {
        let mut path: Vec<SharedStr> =
            std::iter::successors(Some(id), |&e| self.parent_of(e))
                .filter_map(|e| self.name_of(e).cloned())
                .collect();
        path.reverse();
        path
    }

    /// Resolve a name path from the root, as produced by [`path_of`](Self::path_of).
    pub fn find_path(&self, path: &[SharedStr]) -> Option<ElementId> {
        let (first, rest) = path.split_first()?;
        let mut current = self.find_element(None, first)?;
        for name in rest {
            current = self.find_element(Some(current), name)?;
        }
        Some(current)
    }

    /// Roots of every element that received a tree, in insertion order.
    pub fn root_elements(&self) -> &[ElementId] {
        &self.roots
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn trees_for(&self, element: ElementId) -> &[WeightedTree<T, D>] {
        self.trees.get(&element).map_or(&[], Vec::as_slice)
    }

    /// Add a tree under `element`. A tree for the same object already there
    /// absorbs it instead of being duplicated.
    pub fn add_weighted_tree(&mut self, element: ElementId, tree: WeightedTree<T, D>) {
        let root = self.root_of(element);
        if !self.roots.contains(&root) {
            self.roots.push(root);
        }

        let trees = self.trees.entry(element).or_default();
        match trees.iter_mut().find(|t| t.object() == tree.object()) {
            Some(existing) => existing.merge_unchecked_owned(tree),
            None => trees.push(tree),
        }
    }

    /// Every tree in the set with its owning element.
    pub fn all_trees(&self) -> impl Iterator<Item = (ElementId, &WeightedTree<T, D>)> {
        let mut owners: Vec<_> = self.trees.keys().copied().collect();
        owners.sort();
        owners
            .into_iter()
            .flat_map(move |e| self.trees_for(e).iter().map(move |t| (e, t)))
    }

    pub fn total_weight(&self) -> i64 {
        self.all_trees().fold(0, |sum, (_, t)| sum.saturating_add(t.weight()))
    }

    /// Whether no element holds any tree.
    pub fn is_empty(&self) -> bool {
        self.trees.values().all(Vec::is_empty)
    }

    /// Titles of the additional data sets carried by the trees.
    pub fn extra_data_sets(&self) -> &[String] {
        &self.extra_data_sets
    }

    pub fn set_extra_data_sets(&mut self, titles: Vec<String>) {
        self.extra_data_sets = titles;
    }

    /// Nested, serialisable view of the set: root elements, their trees and
    /// their child elements.
    pub fn snapshot(&self) -> Vec<ElementSnapshot<'_, T, D>> {
        self.roots.iter().map(|&r| self.snapshot_of(r)).collect()
    }

    fn snapshot_of(&self, id: ElementId) -> ElementSnapshot<'_, T, D> {
        let element = &self.elements[id.0];
        let mut trees: Vec<_> = self.trees_for(id).iter().collect();
        trees.sort_by(|a, b| b.weight().cmp(&a.weight()));
        ElementSnapshot {
            name: &element.name,
            group: element.group.as_ref().map(|g| g.name()),
            trees,
            children: element
                .children
                .iter()
                .map(|&c| self.snapshot_of(c))
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(bound(serialize = "T: TreeKey + Serialize, D: Serialize"))]
pub struct ElementSnapshot<'a, T, D> {
    pub name: &'a SharedStr,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<&'a str>,
    pub trees: Vec<&'a WeightedTree<T, D>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ElementSnapshot<'a, T, D>>,
}
