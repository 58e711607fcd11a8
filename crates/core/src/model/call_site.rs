use serde::{Deserialize, Serialize};
use weighted_tree_protocol::SharedStr;

use super::weighted_tree::{NodeData, WeightedTree};

/// Symbol of a call site. Resolved to a display string by whoever built
/// the tree; the engine only compares it by value.
pub type Symbol = SharedStr;

/// Aggregated call site: one symbol's accumulated weight within a call
/// stack, its callees as children, plus statistics over the individual
/// instances folded into it.
///
/// The caller is not stored. Use [`WeightedTree::find`] or
/// [`WeightedTree::path_to`] from the root to rebuild the chain of callers.
pub type AggregatedCallSite = WeightedTree<Symbol, CallSiteData>;

/// Running statistics over the instances (calls or samples) of a call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Statistics {
    pub count: u64,
    pub min: i64,
    pub max: i64,
    pub sum: i64,
}

impl Statistics {
    pub fn record(&mut self, value: i64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count = self.count.saturating_add(1);
        self.sum = self.sum.saturating_add(value);
    }

    pub fn merge(&mut self, other: &Statistics) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.count = self.count.saturating_add(other.count);
        self.sum = self.sum.saturating_add(other.sum);
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum as f64 / self.count as f64)
    }
}

/// Payload of an [`AggregatedCallSite`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallSiteData {
    #[serde(default)]
    pub statistics: Statistics,
    /// Auxiliary sites attached by specialised builders, for instance the
    /// kernel activity below a user-space leaf. They are not callees.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_children_sites: Vec<AggregatedCallSite>,
}

impl NodeData for CallSiteData {
    fn merge_data(&mut self, other: &Self) {
        self.statistics.merge(&other.statistics);
        for extra in &other.extra_children_sites {
            add_extra_site(&mut self.extra_children_sites, extra.clone());
        }
    }

    fn merge_data_owned(&mut self, other: Self) {
        self.statistics.merge(&other.statistics);
        for extra in other.extra_children_sites {
            add_extra_site(&mut self.extra_children_sites, extra);
        }
    }
}

fn add_extra_site(sites: &mut Vec<AggregatedCallSite>, site: AggregatedCallSite) {
    match sites.iter_mut().find(|s| s.object() == site.object()) {
        // Found by symbol, so the merge cannot be rejected.
        Some(existing) => existing.merge_unchecked_owned(site),
        None => sites.push(site),
    }
}

impl WeightedTree<Symbol, CallSiteData> {
    /// A call site built from a single instance of `weight`.
    pub fn instance(symbol: impl Into<Symbol>, weight: i64) -> Self {
        let mut site = Self::new(symbol.into(), weight);
        site.data_mut().statistics.record(weight);
        site
    }

    pub fn symbol(&self) -> &Symbol {
        self.object()
    }

    pub fn callees(&self) -> impl Iterator<Item = &AggregatedCallSite> {
        self.children()
    }

    pub fn add_callee(&mut self, callee: AggregatedCallSite) {
        self.add_child(callee);
    }

    /// Add one instance of `weight` to this call site's weight and statistics.
    pub fn record_instance(&mut self, weight: i64) {
        self.add_to_weight(weight);
        self.data_mut().statistics.record(weight);
    }

    pub fn statistics(&self) -> &Statistics {
        &self.data().statistics
    }

    pub fn extra_children_sites(&self) -> &[AggregatedCallSite] {
        &self.data().extra_children_sites
    }

    pub fn add_extra_child_site(&mut self, site: AggregatedCallSite) {
        add_extra_site(&mut self.data_mut().extra_children_sites, site);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statistics_track_instances() {
        let mut site = AggregatedCallSite::instance("foo", 10);
        site.record_instance(4);
        site.record_instance(30);

        assert_eq!(site.weight(), 44);
        let stats = site.statistics();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.min, 4);
        assert_eq!(stats.max, 30);
        assert!((stats.mean().unwrap_or_default() - 44.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn merge_combines_statistics() {
        let mut a = AggregatedCallSite::instance("foo", 10);
        let b = AggregatedCallSite::instance("foo", 2);
        a.merge(&b).unwrap();
        assert_eq!(a.weight(), 12);
        assert_eq!(a.statistics().count, 2);
        assert_eq!(a.statistics().min, 2);
        assert_eq!(a.statistics().max, 10);
    }

    #[test]
    fn statistics_sum_saturates() {
        let mut stats = Statistics::default();
        stats.record(i64::MAX);
        stats.record(1);
        let mut other = Statistics::default();
        other.record(i64::MAX);
        stats.merge(&other);
        assert_eq!(stats.sum, i64::MAX);
        assert_eq!(stats.count, 3);
        assert_eq!(stats.max, i64::MAX);
    }

    #[test]
    fn merge_rejects_other_symbol() {
        let mut a = AggregatedCallSite::instance("foo", 10);
        assert!(a.merge(&AggregatedCallSite::instance("bar", 1)).is_err());
        assert_eq!(a.statistics().count, 1);
    }

    #[test]
    fn empty_statistics_merge_is_identity() {
        let mut stats = Statistics::default();
        stats.merge(&Statistics::default());
        assert_eq!(stats, Statistics::default());
        assert_eq!(stats.mean(), None);

        let mut other = Statistics::default();
        other.record(-3);
        stats.merge(&other);
        assert_eq!((stats.min, stats.max, stats.count), (-3, -3, 1));
    }

    #[test]
    fn extra_sites_stay_out_of_callees() {
        let mut leaf = AggregatedCallSite::instance("read", 5);
        leaf.add_extra_child_site(AggregatedCallSite::instance("sys_read", 3));

        let mut other = AggregatedCallSite::instance("read", 1);
        other.add_extra_child_site(AggregatedCallSite::instance("sys_read", 2));
        other.add_extra_child_site(AggregatedCallSite::instance("schedule", 1));

        leaf.merge(&other).unwrap();

        assert_eq!(leaf.callees().count(), 0);
        assert_eq!(leaf.extra_children_sites().len(), 2);
        let sys_read = leaf
            .extra_children_sites()
            .iter()
            .find(|s| *s.symbol() == "sys_read")
            .map(AggregatedCallSite::weight);
        assert_eq!(sys_read, Some(5));
    }
}
