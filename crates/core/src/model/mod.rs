pub mod call_site;
pub mod differential;
pub mod element;
pub mod tree_set;
pub mod weighted_tree;

pub use call_site::{AggregatedCallSite, CallSiteData, Statistics, Symbol};
pub use differential::{Difference, DifferentialWeightedTree};
pub use element::{Element, ElementId, GroupDescriptor, descriptor_for_level};
pub use tree_set::{DIFF_ELEMENT, DifferentialWeightedTreeSet, ElementSnapshot, WeightedTreeSet};
pub use weighted_tree::{MergeError, NodeData, TreeKey, WeightedTree, merge_forest};
