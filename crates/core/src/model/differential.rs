use serde::{Deserialize, Serialize};

use super::weighted_tree::{NodeData, TreeKey, WeightedTree};

/// How a comparison node relates to its baseline counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Difference {
    /// `(comparison - baseline) / baseline`. `NaN` when the node has no
    /// baseline counterpart, or the counterpart weighed zero while this node
    /// did not.
    #[serde(with = "nan_as_null")]
    pub difference: f64,
    /// Weight of the baseline counterpart, if there was one.
    pub base_weight: Option<i64>,
}

impl Difference {
    /// Compare a weight against an optional baseline weight.
    pub fn between(base_weight: Option<i64>, weight: i64) -> Self {
        let difference = match base_weight {
            Some(0) if weight == 0 => 0.0,
            Some(0) | None => f64::NAN,
            Some(base) => (weight as f64 - base as f64) / base as f64,
        };
        Self {
            difference,
            base_weight,
        }
    }

    /// Whether this node only exists in the comparison.
    pub fn is_new(&self) -> bool {
        self.difference.is_nan()
    }
}

impl Default for Difference {
    fn default() -> Self {
        Self {
            difference: f64::NAN,
            base_weight: None,
        }
    }
}

/// The difference is a property of the comparison pair the node was built
/// from, so merging two differential nodes keeps the destination's value.
impl NodeData for Difference {
    fn merge_data(&mut self, _other: &Self) {}
}

/// A comparison node paired with its relative difference to the baseline.
pub type DifferentialWeightedTree<T> = WeightedTree<T, Difference>;

impl<T: TreeKey> WeightedTree<T, Difference> {
    pub fn differential(object: T, weight: i64, difference: Difference) -> Self {
        Self::with_data(object, weight, difference)
    }

    pub fn difference(&self) -> f64 {
        self.data().difference
    }

    pub fn base_weight(&self) -> Option<i64> {
        self.data().base_weight
    }
}

/// JSON has no NaN; it travels as `null`.
mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() {
            serializer.serialize_none()
        } else {
            serializer.serialize_some(value)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_change() {
        assert!((Difference::between(Some(100), 150).difference - 0.5).abs() < f64::EPSILON);
        assert!((Difference::between(Some(100), 25).difference + 0.75).abs() < f64::EPSILON);
        assert_eq!(Difference::between(Some(7), 7).difference, 0.0);
    }

    #[test]
    fn extreme_weights_do_not_overflow() {
        let d = Difference::between(Some(-1), i64::MAX);
        assert!(d.difference.is_finite());
        assert!(d.difference < 0.0);
        let d = Difference::between(Some(i64::MAX), i64::MIN);
        assert!((d.difference + 2.0).abs() < 1e-9);
    }

    #[test]
    fn zero_baseline() {
        assert_eq!(Difference::between(Some(0), 0).difference, 0.0);
        assert!(Difference::between(Some(0), 3).is_new());
        assert_eq!(Difference::between(Some(0), 3).base_weight, Some(0));
    }

    #[test]
    fn missing_baseline_is_new() {
        let d = Difference::between(None, 30);
        assert!(d.is_new());
        assert_eq!(d.base_weight, None);
    }

    #[test]
    fn merge_keeps_destination_difference() {
        let mut a = DifferentialWeightedTree::differential("foo", 10, Difference::between(Some(5), 10));
        let b = DifferentialWeightedTree::differential("foo", 4, Difference::between(None, 4));
        a.merge(&b).unwrap();
        assert_eq!(a.weight(), 14);
        assert!((a.difference() - 1.0).abs() < f64::EPSILON);
        assert_eq!(a.base_weight(), Some(5));
    }

    #[test]
    fn nan_serializes_as_null() {
        let d = Difference::between(None, 1);
        let json = serde_json::to_string(&d).unwrap_or_default();
        assert_eq!(json, r#"{"difference":null,"base_weight":null}"#);
        let back: Difference = serde_json::from_str(&json).unwrap();
        assert!(back.is_new());
    }
}
