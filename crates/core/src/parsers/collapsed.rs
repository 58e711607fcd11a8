use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, trace};

use crate::model::{AggregatedCallSite, CallSiteData, ElementId, GroupDescriptor, Symbol, WeightedTreeSet};

#[derive(Debug, Error)]
pub enum CollapsedParseError {
    #[error("invalid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("no valid stack lines found")]
    Empty,
    #[error("line {line}: expected at least {expected} element frames, found {found}")]
    TooShallow {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("line {line}: negative sample count {count}")]
    NegativeCount { line: usize, count: i64 },
}

/// How leading frames of a folded stack map onto elements.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollapsedOptions {
    /// Group levels consumed from the leading frames, outermost first, e.g.
    /// `["process", "thread"]`.
    pub element_levels: Vec<String>,
    /// Element receiving every stack when `element_levels` is empty.
    pub element_name: String,
}

impl Default for CollapsedOptions {
    fn default() -> Self {
        Self {
            element_levels: Vec::new(),
            element_name: "profile".to_owned(),
        }
    }
}

impl CollapsedOptions {
    pub fn with_levels<I, S>(levels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            element_levels: levels.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// The descriptor chain for `element_levels`, outermost level first.
    pub fn group_hierarchy(&self) -> Option<Arc<GroupDescriptor>> {
        GroupDescriptor::hierarchy(self.element_levels.iter().map(String::as_str))
    }
}

/// Parse Brendan Gregg's collapsed/folded stack format into call sites.
///
/// Each line has the format: `stack_frame;stack_frame;... count`. The count
/// is the last whitespace-separated token; when it is missing or not a
/// number the whole line is the stack and counts once. Negative counts are
/// rejected.
///
/// The first `element_levels.len()` frames name the element owning the
/// stack, the rest form the call chain. Every line records one instance of
/// `count` on each call site along its chain.
pub fn parse_collapsed(
    data: &[u8],
    options: &CollapsedOptions,
) -> Result<WeightedTreeSet<Symbol, CallSiteData>, CollapsedParseError> {
    let text = std::str::from_utf8(data)?;
    let levels: Vec<Arc<GroupDescriptor>> = options
        .group_hierarchy()
        .map(|root| root.levels().collect())
        .unwrap_or_default();

    let mut set = WeightedTreeSet::new();
    let mut stacks = 0usize;

    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (stack_str, count) = split_count(line);
        if count < 0 {
            return Err(CollapsedParseError::NegativeCount { line: index + 1, count });
        }
        let frames: Vec<&str> = stack_str
            .split(';')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .collect();
        if frames.is_empty() {
            continue;
        }
        if frames.len() < levels.len() {
            return Err(CollapsedParseError::TooShallow {
                line: index + 1,
                expected: levels.len(),
                found: frames.len(),
            });
        }

        let (element_frames, call_frames) = frames.split_at(levels.len());
        let element = match ensure_element_path(&mut set, element_frames, &levels) {
            Some(element) => element,
            None => set.ensure_element(&options.element_name, None, None),
        };

        let Some(chain) = call_chain(call_frames, count) else {
            trace!(line = index + 1, "stack has no call frames below its element");
            continue;
        };
        set.add_weighted_tree(element, chain);
        stacks += 1;
    }

    if stacks == 0 {
        return Err(CollapsedParseError::Empty);
    }

    debug!(
        stacks,
        elements = set.element_count(),
        total_weight = set.total_weight(),
        "parsed collapsed stacks"
    );
    Ok(set)
}

/// Split `"a;b;c 42"` into the stack and its count.
fn split_count(line: &str) -> (&str, i64) {
    let Some((pos, space)) = line.char_indices().rev().find(|(_, c)| c.is_whitespace()) else {
        return (line, 1);
    };
    let count_str = line[pos + space.len_utf8()..].trim();
    let count = count_str
        .parse::<i64>()
        .ok()
        .or_else(|| count_str.parse::<f64>().ok().filter(|c| c.is_finite()).map(|c| c.round() as i64));
    match count {
        Some(count) => (line[..pos].trim(), count),
        None => (line, 1),
    }
}

fn ensure_element_path(
    set: &mut WeightedTreeSet<Symbol, CallSiteData>,
    names: &[&str],
    levels: &[Arc<GroupDescriptor>],
) -> Option<ElementId> {
    let mut parent = None;
    for (name, level) in names.iter().zip(levels) {
        parent = Some(set.ensure_element(name, Some(Arc::clone(level)), parent));
    }
    parent
}

/// Build the call chain `frames[0] -> frames[1] -> ...`, each site holding
/// one instance of `count`.
fn call_chain(frames: &[&str], count: i64) -> Option<AggregatedCallSite> {
    frames.iter().rev().fold(None, |callee, frame| {
        let mut site = AggregatedCallSite::instance(*frame, count);
        if let Some(callee) = callee {
            site.add_callee(callee);
        }
        Some(site)
    })
}
