use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::shared_str::SharedStr;
use crate::types::Color;

/// Identifier of a style in a palette's style map (`"less3"`, `"more10"`,
/// `"white"`, `"k2"`...).
pub type StyleKey = SharedStr;

/// How a renderer should draw a node. Only the fill colour is carried; the
/// renderer owns everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputStyle {
    pub fill: Color,
}

impl OutputStyle {
    pub const fn filled(fill: Color) -> Self {
        Self { fill }
    }
}

/// All styles a palette can hand out, keyed by style key. Ordered so that
/// renderers and snapshots see a stable listing.
pub type StyleMap = BTreeMap<StyleKey, OutputStyle>;
