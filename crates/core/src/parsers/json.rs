use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use super::collapsed::CollapsedOptions;
use crate::model::{AggregatedCallSite, CallSiteData, ElementId, GroupDescriptor, Symbol, WeightedTreeSet};

#[derive(Debug, Error)]
pub enum JsonParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no elements found")]
    Empty,
}

/// One element of a serialised tree set, as written by
/// [`WeightedTreeSet::snapshot`].
#[derive(Debug, Deserialize)]
struct ElementRecord {
    name: Symbol,
    #[serde(default)]
    group: Option<String>,
    #[serde(default)]
    trees: Vec<AggregatedCallSite>,
    #[serde(default)]
    children: Vec<ElementRecord>,
}

/// Read a call-site tree set back from its JSON snapshot.
///
/// Group names are resolved against `options.element_levels` so that the
/// element hierarchy keeps its descriptor chain; unknown names become
/// standalone levels.
pub fn parse_json_forest(
    data: &[u8],
    options: &CollapsedOptions,
) -> Result<WeightedTreeSet<Symbol, CallSiteData>, JsonParseError> {
    let records: Vec<ElementRecord> = serde_json::from_slice(data)?;

    let mut levels: HashMap<String, Arc<GroupDescriptor>> = options
        .group_hierarchy()
        .map(|root| root.levels().map(|l| (l.name().to_owned(), l)).collect())
        .unwrap_or_default();

    let mut set = WeightedTreeSet::new();
    for record in records {
        add_record(&mut set, record, None, &mut levels);
    }
    if set.is_empty() {
        return Err(JsonParseError::Empty);
    }

    debug!(
        elements = set.element_count(),
        total_weight = set.total_weight(),
        "parsed JSON forest"
    );
    Ok(set)
}

fn add_record(
    set: &mut WeightedTreeSet<Symbol, CallSiteData>,
    record: ElementRecord,
    parent: Option<ElementId>,
    levels: &mut HashMap<String, Arc<GroupDescriptor>>,
) {
    let group = record.group.map(|name| {
        Arc::clone(
            levels
                .entry(name)
                .or_insert_with_key(|name| GroupDescriptor::level(name.as_str(), None)),
        )
    });
    let element = set.ensure_element(&record.name, group, parent);
    for tree in record.trees {
        set.add_weighted_tree(element, tree);
    }
    for child in record.children {
        add_record(set, child, Some(element), levels);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::collapsed::parse_collapsed;

    #[test]
    fn snapshot_reads_back() {
        let options = CollapsedOptions::with_levels(["process", "thread"]);
        let original = parse_collapsed(b"app;t1;main;foo 3\napp;t2;main 4\n", &options).unwrap();
        let json = serde_json::to_vec(&original.snapshot()).unwrap();

        let set = parse_json_forest(&json, &options).unwrap();
        assert_eq!(set.total_weight(), 7);
        let t1 = set.find_path(&["app".into(), "t1".into()]).unwrap();
        let main = &set.trees_for(t1)[0];
        assert_eq!(main.statistics().count, 1);
        assert_eq!(main.child(&"foo".into()).map(AggregatedCallSite::weight), Some(3));

        let thread = set.element(t1).and_then(|e| e.group.clone()).unwrap();
        assert_eq!(Some(&thread), options.group_hierarchy().unwrap().next_group());
    }

    #[test]
    fn minimal_records() {
        let json = br#"[{"name": "t", "trees": [{"object": "main", "weight": 2, "children": [{"object": "f", "weight": 1}]}]}]"#;
        let set = parse_json_forest(json, &CollapsedOptions::default()).unwrap();
        let t = set.root_elements()[0];
        assert_eq!(set.trees_for(t)[0].child(&"f".into()).map(AggregatedCallSite::weight), Some(1));
    }

    #[test]
    fn empty_and_invalid() {
        assert!(matches!(parse_json_forest(b"[]", &CollapsedOptions::default()), Err(JsonParseError::Empty)));
        assert!(matches!(parse_json_forest(b"{", &CollapsedOptions::default()), Err(JsonParseError::Json(_))));
    }
}
