use std::borrow::Cow;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A reference-counted, immutable string.
///
/// Symbols and element names are cloned into every tree a merge, grouping or
/// diff produces, so cloning must be a refcount bump rather than an
/// allocation. Equality and hashing are by content, so two symbols parsed
/// from different inputs still match as tree keys.
#[derive(Debug, Clone, Eq)]
pub struct SharedStr(Arc<str>);

impl SharedStr {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for SharedStr {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || *self.0 == *other.0
    }
}

impl PartialEq<str> for SharedStr {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for SharedStr {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

impl Ord for SharedStr {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl PartialOrd for SharedStr {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl std::hash::Hash for SharedStr {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        (*self.0).hash(state);
    }
}

impl std::ops::Deref for SharedStr {
    type Target = str;

    #[inline]
    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for SharedStr {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for SharedStr {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SharedStr {
    #[inline]
    fn from(s: &str) -> Self {
        SharedStr(Arc::from(s))
    }
}

impl From<String> for SharedStr {
    #[inline]
    fn from(s: String) -> Self {
        SharedStr(Arc::from(s))
    }
}

impl std::fmt::Display for SharedStr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

// Hand-rolled to avoid serde's `rc` feature.
impl Serialize for SharedStr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SharedStr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Escaped JSON strings cannot be borrowed, hence the Cow.
        let s = Cow::<'de, str>::deserialize(deserializer)?;
        Ok(SharedStr::from(s.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_compare_equal() {
        let a = SharedStr::from("main");
        let b = a.clone();
        assert_eq!(a, b);
        assert_eq!(a, "main");
    }

    #[test]
    fn separately_built_symbols_match_as_keys() {
        let mut map = std::collections::HashMap::new();
        map.insert(SharedStr::from(String::from("foo")), 1);
        assert_eq!(map.get(&SharedStr::from("foo")), Some(&1));
        assert_eq!(map.get("foo"), Some(&1));
    }

    #[test]
    fn serde_accepts_escaped_strings() {
        let s: Result<SharedStr, _> = serde_json::from_str("\"a\\\"b\"");
        assert!(matches!(s, Ok(ref v) if v == "a\"b"));
        let json = serde_json::to_string(&SharedStr::from("flame")).unwrap_or_default();
        assert_eq!(json, "\"flame\"");
    }

    #[test]
    fn ordering_is_lexicographic() {
        assert!(SharedStr::from("alpha") < SharedStr::from("beta"));
    }
}
