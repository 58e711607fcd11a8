//! Adapters exposing tree sets to a display layer: titles, metrics,
//! display strings and styles.

use std::sync::Arc;

use weighted_tree_protocol::{DataType, MetricType, MetricValue, StyleKey};

use crate::model::{
    AggregatedCallSite, CallSiteData, DIFF_ELEMENT, Difference, DifferentialWeightedTree,
    DifferentialWeightedTreeSet, ElementId, GroupDescriptor, NodeData, Statistics, Symbol,
    TreeKey, WeightedTree, WeightedTreeSet,
};
use crate::palette::{DataPalette, DifferentialPalette, FlameDefaultPalette, PaletteNode};
use crate::transforms::{diff_tree_sets, group_by_level};

pub trait WeightedTreeProvider<T: TreeKey, D: NodeData> {
    fn tree_set(&self) -> &WeightedTreeSet<T, D>;

    fn title(&self) -> &str;

    fn elements<'a>(&'a self) -> &'a [ElementId]
    where
        T: 'a,
        D: 'a,
    {
        self.tree_set().root_elements()
    }

    fn trees_for(&self, element: ElementId) -> &[WeightedTree<T, D>] {
        self.tree_set().trees_for(element)
    }

    fn weight_type(&self) -> MetricType {
        MetricType::weight()
    }

    fn additional_metrics(&self) -> Vec<MetricType> {
        Vec::new()
    }

    /// Value of the additional metric at `index` for `tree`. `None` when the
    /// provider has no such metric.
    fn additional_metric(&self, _tree: &WeightedTree<T, D>, _index: usize) -> Option<MetricValue> {
        None
    }

    /// Statistics of `tree` for a metric: `None` is the weight, `Some(i)` the
    /// additional metric at `i`. Only metrics declaring statistics have any.
    fn statistics(&self, tree: &WeightedTree<T, D>, index: Option<usize>) -> Option<Statistics> {
        let has_statistics = match index {
            None => self.weight_type().has_statistics,
            Some(i) => self
                .additional_metrics()
                .get(i)
                .is_some_and(|m| m.has_statistics),
        };
        if has_statistics {
            self.node_statistics(tree, index)
        } else {
            None
        }
    }

    /// Raw per-node statistics backing [`statistics`](Self::statistics).
    fn node_statistics(&self, _tree: &WeightedTree<T, D>, _index: Option<usize>) -> Option<Statistics> {
        None
    }

    /// Root of the grouping hierarchy of the set's elements, if any.
    fn group_descriptor(&self) -> Option<&Arc<GroupDescriptor>> {
        None
    }

    fn extra_data_sets<'a>(&'a self) -> &'a [String]
    where
        T: 'a,
        D: 'a,
    {
        self.tree_set().extra_data_sets()
    }

    fn display_object(&self, object: &T) -> String {
        object.to_string()
    }

    fn to_display_string(&self, tree: &WeightedTree<T, D>) -> String {
        self.display_object(tree.object())
    }

    fn palette(&self) -> Option<&dyn DataPalette> {
        None
    }

    /// The palette input for `tree`; `None` leaves the node unstyled.
    fn palette_node<'t>(&self, _tree: &'t WeightedTree<T, D>) -> Option<PaletteNode<'t>> {
        None
    }

    fn style_for(&self, tree: &WeightedTree<T, D>) -> Option<StyleKey> {
        let palette = self.palette()?;
        let node = self.palette_node(tree)?;
        Some(palette.style_for(&node))
    }
}

/// Provider over aggregated call sites, as produced by the collapsed-stack
/// parser.
#[derive(Debug, Clone)]
pub struct CallGraphProvider {
    title: String,
    set: WeightedTreeSet<Symbol, CallSiteData>,
    weight_type: MetricType,
    group_descriptor: Option<Arc<GroupDescriptor>>,
    palette: FlameDefaultPalette,
}

impl CallGraphProvider {
    pub const SELF_WEIGHT: usize = 0;
    pub const INSTANCES: usize = 1;
    pub const MEAN_WEIGHT: usize = 2;

    pub fn new(title: impl Into<String>, set: WeightedTreeSet<Symbol, CallSiteData>) -> Self {
        Self {
            title: title.into(),
            set,
            weight_type: MetricType::weight().with_statistics(),
            group_descriptor: None,
            palette: FlameDefaultPalette::default(),
        }
    }

    pub fn with_weight_type(mut self, data_type: DataType) -> Self {
        self.weight_type.data_type = data_type;
        self
    }

    pub fn with_group_descriptor(mut self, root: Option<Arc<GroupDescriptor>>) -> Self {
        self.group_descriptor = root;
        self
    }

    pub fn with_palette(mut self, palette: FlameDefaultPalette) -> Self {
        self.palette = palette;
        self
    }

    /// The same provider over its set regrouped at `level` (0 is `All`).
    pub fn grouped(&self, level: usize) -> Self {
        Self {
            title: self.title.clone(),
            set: group_by_level(&self.set, self.group_descriptor.as_ref(), level),
            weight_type: self.weight_type.clone(),
            group_descriptor: self.group_descriptor.clone(),
            palette: self.palette.clone(),
        }
    }
}

impl WeightedTreeProvider<Symbol, CallSiteData> for CallGraphProvider {
    fn tree_set(&self) -> &WeightedTreeSet<Symbol, CallSiteData> {
        &self.set
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn weight_type(&self) -> MetricType {
        self.weight_type.clone()
    }

    fn additional_metrics(&self) -> Vec<MetricType> {
        vec![
            MetricType::new("Self weight", self.weight_type.data_type),
            MetricType::new("Instances", DataType::Number),
            MetricType::new("Mean weight", self.weight_type.data_type),
        ]
    }

    fn additional_metric(&self, tree: &AggregatedCallSite, index: usize) -> Option<MetricValue> {
        match index {
            Self::SELF_WEIGHT => Some(MetricValue::Integer(tree.self_weight())),
            Self::INSTANCES => Some(MetricValue::Integer(
                i64::try_from(tree.statistics().count).unwrap_or(i64::MAX),
            )),
            Self::MEAN_WEIGHT => tree.statistics().mean().map(MetricValue::Float),
            _ => None,
        }
    }

    fn node_statistics(&self, tree: &AggregatedCallSite, index: Option<usize>) -> Option<Statistics> {
        index.is_none().then(|| *tree.statistics())
    }

    fn group_descriptor(&self) -> Option<&Arc<GroupDescriptor>> {
        self.group_descriptor.as_ref()
    }

    fn palette(&self) -> Option<&dyn DataPalette> {
        Some(&self.palette)
    }

    fn palette_node<'t>(&self, tree: &'t AggregatedCallSite) -> Option<PaletteNode<'t>> {
        Some(PaletteNode::CallSite(tree.symbol()))
    }
}

/// Provider over differential trees. Display strings and the weight type
/// come from the provider of the compared trees.
pub struct DifferentialWeightedTreeProvider<'a, T, D, P: ?Sized> {
    original: &'a P,
    set: DifferentialWeightedTreeSet<T>,
    palette: DifferentialPalette,
    _data: std::marker::PhantomData<fn() -> D>,
}

impl<'a, T, D, P> DifferentialWeightedTreeProvider<'a, T, D, P>
where
    T: TreeKey,
    D: NodeData,
    P: WeightedTreeProvider<T, D> + ?Sized,
{
    pub const TITLE: &'static str = "Differential tree";

    pub fn new(original: &'a P, set: DifferentialWeightedTreeSet<T>) -> Self {
        Self {
            original,
            set,
            palette: DifferentialPalette::default(),
            _data: std::marker::PhantomData,
        }
    }

    /// Differential trees under a single `"diff"` element.
    pub fn from_trees(original: &'a P, trees: Vec<DifferentialWeightedTree<T>>) -> Self {
        Self::new(original, WeightedTreeSet::from_trees(DIFF_ELEMENT, trees))
    }

    /// Diff `comparison` against `baseline` element by element. `None` when
    /// the comparison has no elements.
    pub fn from_tree_sets<B: NodeData, C: NodeData>(
        original: &'a P,
        baseline: &WeightedTreeSet<T, B>,
        comparison: &WeightedTreeSet<T, C>,
    ) -> Option<Self> {
        diff_tree_sets(baseline, comparison).map(|set| Self::new(original, set))
    }

    pub fn with_palette(mut self, palette: DifferentialPalette) -> Self {
        self.palette = palette;
        self
    }
}

impl<T, D, P> WeightedTreeProvider<T, Difference> for DifferentialWeightedTreeProvider<'_, T, D, P>
where
    T: TreeKey,
    D: NodeData,
    P: WeightedTreeProvider<T, D> + ?Sized,
{
    fn tree_set(&self) -> &DifferentialWeightedTreeSet<T> {
        &self.set
    }

    fn title(&self) -> &str {
        Self::TITLE
    }

    fn weight_type(&self) -> MetricType {
        let mut weight = self.original.weight_type();
        weight.has_statistics = false;
        weight
    }

    fn group_descriptor(&self) -> Option<&Arc<GroupDescriptor>> {
        self.original.group_descriptor()
    }

    fn display_object(&self, object: &T) -> String {
        self.original.display_object(object)
    }

    fn palette(&self) -> Option<&dyn DataPalette> {
        Some(&self.palette)
    }

    fn palette_node<'t>(&self, tree: &'t DifferentialWeightedTree<T>) -> Option<PaletteNode<'t>> {
        Some(PaletteNode::Differential(tree.difference()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::{CollapsedOptions, parse_collapsed};
    use crate::transforms::diff_trees;

    fn provider(input: &[u8]) -> CallGraphProvider {
        let options = CollapsedOptions::with_levels(["process", "thread"]);
        let set = parse_collapsed(input, &options).unwrap();
        CallGraphProvider::new("Call graph", set).with_group_descriptor(options.group_hierarchy())
    }

    #[test]
    fn call_graph_metrics() {
        let p = provider(b"app;t1;main;foo 3\napp;t1;main 4\n");
        let element = p.tree_set().find_path(&["app".into(), "t1".into()]).unwrap();
        let main = &p.trees_for(element)[0];

        assert_eq!(p.title(), "Call graph");
        assert_eq!(p.additional_metrics().len(), 3);
        assert_eq!(p.additional_metric(main, CallGraphProvider::SELF_WEIGHT), Some(MetricValue::Integer(4)));
        assert_eq!(p.additional_metric(main, CallGraphProvider::INSTANCES), Some(MetricValue::Integer(2)));
        assert_eq!(p.additional_metric(main, CallGraphProvider::MEAN_WEIGHT), Some(MetricValue::Float(3.5)));
        assert_eq!(p.additional_metric(main, 7), None);
        assert_eq!(p.to_display_string(main), "main");
    }

    #[test]
    fn statistics_only_for_metrics_that_have_them() {
        let p = provider(b"app;t1;main 3\napp;t1;main 5\n");
        let element = p.tree_set().find_path(&["app".into(), "t1".into()]).unwrap();
        let main = &p.trees_for(element)[0];

        let stats = p.statistics(main, None).unwrap();
        assert_eq!((stats.count, stats.min, stats.max, stats.sum), (2, 3, 5, 8));
        assert_eq!(p.statistics(main, Some(CallGraphProvider::INSTANCES)), None);
        assert_eq!(p.statistics(main, Some(9)), None);
    }

    #[test]
    fn call_sites_are_styled_by_symbol() {
        let p = provider(b"app;t1;main 1\napp;t2;main 1\n");
        let keys: Vec<_> = p
            .tree_set()
            .all_trees()
            .map(|(_, t)| p.style_for(t))
            .collect();
        assert_eq!(keys.len(), 2);
        assert!(keys[0].is_some());
        assert_eq!(keys[0], keys[1]);
    }

    #[test]
    fn grouping_keeps_the_hierarchy() {
        let p = provider(b"app;t1;main 1\napp;t2;main 2\ndb;t3;poll 4\n");
        let all = p.grouped(0);
        assert_eq!(all.elements().len(), 1);
        assert_eq!(all.tree_set().total_weight(), 7);
        assert_eq!(p.grouped(1).elements().len(), 2);
        assert!(all.group_descriptor().is_some());
    }

    #[test]
    fn differential_provider_delegates_display_and_weight_type() {
        let base = provider(b"app;t1;main 10\n");
        let cmp = provider(b"app;t1;main 15\napp;t1;idle 2\n").with_weight_type(DataType::Nanoseconds);

        let diff = DifferentialWeightedTreeProvider::from_tree_sets(&cmp, base.tree_set(), cmp.tree_set()).unwrap();
        assert_eq!(diff.title(), "Differential tree");
        assert_eq!(diff.weight_type().data_type, DataType::Nanoseconds);
        assert!(!diff.weight_type().has_statistics);

        let element = diff.tree_set().find_path(&["app".into(), "t1".into()]).unwrap();
        let trees = diff.trees_for(element);
        let main = trees.iter().find(|t| *t.object() == "main").unwrap();
        let idle = trees.iter().find(|t| *t.object() == "idle").unwrap();
        assert_eq!(diff.to_display_string(main), "main");
        assert_eq!(diff.style_for(main).map(|k| k.to_string()), Some("more10".to_owned()));
        assert_eq!(diff.style_for(idle).map(|k| k.to_string()), Some("more10".to_owned()));
    }

    #[test]
    fn differential_provider_from_trees() {
        let base = provider(b"app;t1;main 10\n");
        let element = base.elements()[0];
        let t1 = base.tree_set().children_of(element)[0];
        let trees = diff_trees(base.trees_for(t1), base.trees_for(t1));

        let diff = DifferentialWeightedTreeProvider::from_trees(&base, trees);
        assert_eq!(diff.elements().len(), 1);
        let only = diff.elements()[0];
        assert_eq!(diff.tree_set().name_of(only).map(|n| n.as_str()), Some(DIFF_ELEMENT));
        let main = &diff.trees_for(only)[0];
        assert_eq!(main.difference(), 0.0);
        assert_eq!(diff.style_for(main).map(|k| k.to_string()), Some("white".to_owned()));
    }
}
