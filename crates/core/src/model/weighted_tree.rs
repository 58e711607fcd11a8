use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::hash::Hash;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Anything usable as a node key: compared by value, hashed, and printable
/// for display strings and error messages.
pub trait TreeKey: Clone + Eq + Hash + fmt::Debug + fmt::Display {}

impl<K> TreeKey for K where K: Clone + Eq + Hash + fmt::Debug + fmt::Display {}

/// Per-node payload carried next to the weight.
///
/// `merge_data` is called whenever two nodes of the same key are merged and
/// must not touch the children, which the tree merges itself.
pub trait NodeData: Clone + Default + fmt::Debug {
    fn merge_data(&mut self, other: &Self);

    fn merge_data_owned(&mut self, other: Self) {
        self.merge_data(&other);
    }
}

impl NodeData for () {
    fn merge_data(&mut self, _other: &Self) {}
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("cannot merge trees of different objects: {target} and {other}")]
    IncompatibleObjects { target: String, other: String },
}

/// A node with a key, an accumulated weight and one owned child per key.
///
/// Weights only accumulate: merging adds the other node's weight and folds
/// its children in by key. Zero-weight nodes are legitimate and never pruned.
/// `Clone` is a deep copy, the clone shares nothing with its source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(
    serialize = "T: TreeKey + Serialize, D: Serialize",
    deserialize = "T: TreeKey + Deserialize<'de>, D: NodeData + Deserialize<'de>"
))]
pub struct WeightedTree<T, D = ()> {
    object: T,
    weight: i64,
    #[serde(with = "children_seq", default = "HashMap::new")]
    children: HashMap<T, WeightedTree<T, D>>,
    #[serde(default)]
    data: D,
}

impl<T: TreeKey, D: NodeData> WeightedTree<T, D> {
    pub fn new(object: T, weight: i64) -> Self {
        Self::with_data(object, weight, D::default())
    }

    pub fn with_data(object: T, weight: i64, data: D) -> Self {
        Self {
            object,
            weight,
            children: HashMap::new(),
            data,
        }
    }

    pub fn object(&self) -> &T {
        &self.object
    }

    pub fn weight(&self) -> i64 {
        self.weight
    }

    pub fn data(&self) -> &D {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut D {
        &mut self.data
    }

    /// Weights saturate at `i64::MAX` rather than wrapping.
    pub fn add_to_weight(&mut self, weight: i64) {
        self.weight = self.weight.saturating_add(weight);
    }

    pub fn children(&self) -> impl Iterator<Item = &WeightedTree<T, D>> {
        self.children.values()
    }

    /// Children heaviest first, ties broken by the key's display string so
    /// that listings are reproducible.
    pub fn sorted_children(&self) -> Vec<&WeightedTree<T, D>> {
        let mut children: Vec<_> = self.children.values().collect();
        children.sort_by(|a, b| {
            b.weight
                .cmp(&a.weight)
                .then_with(|| a.object.to_string().cmp(&b.object.to_string()))
        });
        children
    }

    pub fn child(&self, object: &T) -> Option<&WeightedTree<T, D>> {
        self.children.get(object)
    }

    pub fn child_mut(&mut self, object: &T) -> Option<&mut WeightedTree<T, D>> {
        self.children.get_mut(object)
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Add a child, merging it into the existing child of the same key if
    /// there is one.
    pub fn add_child(&mut self, child: WeightedTree<T, D>) {
        match self.children.entry(child.object.clone()) {
            Entry::Occupied(mut existing) => existing.get_mut().merge_unchecked_owned(child),
            Entry::Vacant(slot) => {
                slot.insert(child);
            }
        }
    }

    /// Merge `other` into this node. `other` is left untouched; children
    /// missing here are deep-copied from it.
    pub fn merge(&mut self, other: &WeightedTree<T, D>) -> Result<(), MergeError> {
        self.check_compatible(other)?;
        self.merge_unchecked(other);
        Ok(())
    }

    /// Same as [`merge`](Self::merge) but consumes `other`, moving its
    /// unmatched children instead of copying them.
    pub fn merge_owned(&mut self, other: WeightedTree<T, D>) -> Result<(), MergeError> {
        self.check_compatible(&other)?;
        self.merge_unchecked_owned(other);
        Ok(())
    }

    /// Deep copy of this node and its whole subtree.
    pub fn copy_of(&self) -> Self {
        self.clone()
    }

    fn check_compatible(&self, other: &WeightedTree<T, D>) -> Result<(), MergeError> {
        if self.object == other.object {
            return Ok(());
        }
        tracing::warn!(object = %self.object, other = %other.object, "rejected merge of different objects");
        Err(MergeError::IncompatibleObjects {
            target: self.object.to_string(),
            other: other.object.to_string(),
        })
    }

    pub(crate) fn merge_unchecked(&mut self, other: &WeightedTree<T, D>) {
        self.add_to_weight(other.weight);
        self.data.merge_data(&other.data);
        for other_child in other.children.values() {
            match self.children.get_mut(&other_child.object) {
                Some(child) => child.merge_unchecked(other_child),
                None => {
                    self.children
                        .insert(other_child.object.clone(), other_child.clone());
                }
            }
        }
    }

    pub(crate) fn merge_unchecked_owned(&mut self, other: WeightedTree<T, D>) {
        self.add_to_weight(other.weight);
        self.data.merge_data_owned(other.data);
        for (key, other_child) in other.children {
            match self.children.entry(key) {
                Entry::Occupied(mut child) => child.get_mut().merge_unchecked_owned(other_child),
                Entry::Vacant(slot) => {
                    slot.insert(other_child);
                }
            }
        }
    }

    /// Number of levels under and including this node; a leaf has depth 1.
    pub fn max_depth(&self) -> usize {
        1 + self
            .children
            .values()
            .map(WeightedTree::max_depth)
            .max()
            .unwrap_or(0)
    }

    pub fn children_weight(&self) -> i64 {
        self.children.values().fold(0, |sum, c| sum.saturating_add(c.weight))
    }

    /// Weight not accounted for by any child.
    pub fn self_weight(&self) -> i64 {
        self.weight.saturating_sub(self.children_weight())
    }

    /// Follow `path` from this node. The first key must be this node's own
    /// object. Returns every node along the way, this node first.
    pub fn path_to(&self, path: &[T]) -> Option<Vec<&WeightedTree<T, D>>> {
        let (first, rest) = path.split_first()?;
        if *first != self.object {
            return None;
        }
        let mut chain = vec![self];
        let mut current = self;
        for key in rest {
            current = current.children.get(key)?;
            chain.push(current);
        }
        Some(chain)
    }

    /// Depth-first search for the first node with `object`, returning the
    /// chain from this node down to it. The element before the last is the
    /// found node's caller.
    pub fn find(&self, object: &T) -> Option<Vec<&WeightedTree<T, D>>> {
        if self.object == *object {
            return Some(vec![self]);
        }
        self.sorted_children().into_iter().find_map(|child| {
            child.find(object).map(|mut chain| {
                chain.insert(0, self);
                chain
            })
        })
    }

    /// Pre-order iterator over this node and all its descendants.
    pub fn descendants(&self) -> Descendants<'_, T, D> {
        Descendants { stack: vec![self] }
    }
}

pub struct Descendants<'a, T, D> {
    stack: Vec<&'a WeightedTree<T, D>>,
}

impl<'a, T, D> Iterator for Descendants<'a, T, D> {
    type Item = &'a WeightedTree<T, D>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.values());
        Some(node)
    }
}

/// Merge a forest into `into`, keyed by root object.
pub fn merge_forest<T: TreeKey, D: NodeData>(
    into: &mut HashMap<T, WeightedTree<T, D>>,
    trees: impl IntoIterator<Item = WeightedTree<T, D>>,
) {
    for tree in trees {
        match into.entry(tree.object.clone()) {
            Entry::Occupied(mut existing) => existing.get_mut().merge_unchecked_owned(tree),
            Entry::Vacant(slot) => {
                slot.insert(tree);
            }
        }
    }
}

/// Children travel as a sequence so that non-string keys survive JSON.
mod children_seq {
    use std::collections::HashMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::{NodeData, TreeKey, WeightedTree};

    pub fn serialize<S, T, D>(
        children: &HashMap<T, WeightedTree<T, D>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: TreeKey + Serialize,
        D: Serialize,
    {
        let mut sorted: Vec<_> = children.values().collect();
        sorted.sort_by(|a, b| {
            b.weight
                .cmp(&a.weight)
                .then_with(|| a.object.to_string().cmp(&b.object.to_string()))
        });
        serializer.collect_seq(sorted)
    }

    pub fn deserialize<'de, De, T, D>(
        deserializer: De,
    ) -> Result<HashMap<T, WeightedTree<T, D>>, De::Error>
    where
        De: Deserializer<'de>,
        T: TreeKey + Deserialize<'de>,
        D: NodeData + Deserialize<'de>,
    {
        let list = Vec::<WeightedTree<T, D>>::deserialize(deserializer)?;
        let mut children = HashMap::with_capacity(list.len());
        super::merge_forest(&mut children, list);
        Ok(children)
    }
}
