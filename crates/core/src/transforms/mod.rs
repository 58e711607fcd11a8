//! Pure transforms over tree sets: regrouping by element hierarchy and
//! differencing against a baseline.

pub mod diff;
pub mod group_by;

pub use diff::{diff_tree_sets, diff_trees};
pub use group_by::{group_by_level, group_weighted_tree_by};
