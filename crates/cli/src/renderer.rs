use std::fmt::Write;

use weighted_tree_core::model::{DifferentialWeightedTree, ElementId, NodeData, TreeKey, WeightedTree};
use weighted_tree_core::provider::WeightedTreeProvider;

const INDENT: &str = "  ";

/// Plain-text listing of a provider's elements and their forests.
pub struct TextRenderer<'p, P: ?Sized> {
    provider: &'p P,
    max_depth: Option<usize>,
}

impl<'p, P: ?Sized> TextRenderer<'p, P> {
    pub fn new(provider: &'p P, max_depth: Option<usize>) -> Self {
        Self { provider, max_depth }
    }

    /// Render every root element, its trees heaviest first and its child
    /// elements. `annotate` adds a column after the weight.
    pub fn render<T, D, F>(&self, annotate: F) -> String
    where
        T: TreeKey,
        D: NodeData,
        P: WeightedTreeProvider<T, D>,
        F: Fn(&WeightedTree<T, D>) -> Option<String>,
    {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.provider.title());
        for &element in self.provider.elements() {
            self.render_element(&mut out, element, 0, &annotate);
        }
        out
    }

    fn render_element<T, D, F>(&self, out: &mut String, element: ElementId, level: usize, annotate: &F)
    where
        T: TreeKey,
        D: NodeData,
        P: WeightedTreeProvider<T, D>,
        F: Fn(&WeightedTree<T, D>) -> Option<String>,
    {
        let set = self.provider.tree_set();
        let Some(node) = set.element(element) else {
            return;
        };
        let indent = INDENT.repeat(level);
        match &node.group {
            Some(group) => {
                let _ = writeln!(out, "{indent}{} [{}]", node.name, group.name());
            }
            None => {
                let _ = writeln!(out, "{indent}{}", node.name);
            }
        }

        let mut trees: Vec<_> = self.provider.trees_for(element).iter().collect();
        trees.sort_by(|a, b| b.weight().cmp(&a.weight()));
        for tree in trees {
            self.render_node(out, tree, level + 1, 1, annotate);
        }
        for &child in set.children_of(element) {
            self.render_element(out, child, level + 1, annotate);
        }
    }

    fn render_node<T, D, F>(&self, out: &mut String, tree: &WeightedTree<T, D>, level: usize, depth: usize, annotate: &F)
    where
        T: TreeKey,
        D: NodeData,
        P: WeightedTreeProvider<T, D>,
        F: Fn(&WeightedTree<T, D>) -> Option<String>,
    {
        if self.max_depth.is_some_and(|max| depth > max) {
            return;
        }
        let weight = self.provider.weight_type().format(tree.weight());
        let mut line = format!("{}{}  {weight}", INDENT.repeat(level), self.provider.to_display_string(tree));
        if let Some(extra) = annotate(tree) {
            let _ = write!(line, "  {extra}");
        }
        if let Some(style) = self.provider.style_for(tree) {
            let _ = write!(line, "  <{style}>");
        }
        let _ = writeln!(out, "{line}");

        for child in tree.sorted_children() {
            self.render_node(out, child, level + 1, depth + 1, annotate);
        }
    }
}

/// Relative change of a differential node, `new` when it has no baseline.
pub fn format_change<T: TreeKey>(tree: &DifferentialWeightedTree<T>) -> String {
    let difference = tree.difference();
    if difference.is_nan() {
        "new".to_owned()
    } else {
        format!("{:+.1}%", difference * 100.0)
    }
}
