//! Style palettes for weighted trees.
//!
//! A palette maps a node to a [`StyleKey`] in its [`StyleMap`]. Callers build
//! one [`PaletteNode`] per node and hand it to the palette; the palette never
//! inspects tree types itself.

use std::hash::{DefaultHasher, Hash, Hasher};

use weighted_tree_protocol::{Color, OutputStyle, StyleKey, StyleMap};

use crate::model::Symbol;

/// What a palette can colour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PaletteNode<'a> {
    /// An aggregated call site, coloured by its symbol.
    CallSite(&'a Symbol),
    /// A single called function, coloured by its symbol.
    Function(&'a str),
    /// The relative difference of a differential node.
    Differential(f64),
    /// Aggregated kernel status of a thread.
    ThreadStatus(ProcessStatus),
    /// Raw state value of a time graph interval.
    TimeGraphState(&'a str),
}

impl<'a> From<&'a Symbol> for PaletteNode<'a> {
    fn from(symbol: &'a Symbol) -> Self {
        PaletteNode::CallSite(symbol)
    }
}

impl From<ProcessStatus> for PaletteNode<'_> {
    fn from(status: ProcessStatus) -> Self {
        PaletteNode::ThreadStatus(status)
    }
}

/// Kernel scheduling status of a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProcessStatus {
    #[default]
    Unknown,
    WaitBlocked,
    Run,
    RunSyscall,
    Interrupted,
    WaitForCpu,
    WaitUnknown,
}

impl ProcessStatus {
    pub const ALL: [ProcessStatus; 7] = [
        ProcessStatus::Unknown,
        ProcessStatus::WaitBlocked,
        ProcessStatus::Run,
        ProcessStatus::RunSyscall,
        ProcessStatus::Interrupted,
        ProcessStatus::WaitForCpu,
        ProcessStatus::WaitUnknown,
    ];

    /// Numeric state value, as stored in state systems.
    pub fn state_value(self) -> u8 {
        match self {
            ProcessStatus::Unknown => 0,
            ProcessStatus::WaitBlocked => 1,
            ProcessStatus::Run => 2,
            ProcessStatus::RunSyscall => 3,
            ProcessStatus::Interrupted => 4,
            ProcessStatus::WaitForCpu => 5,
            ProcessStatus::WaitUnknown => 6,
        }
    }

    pub fn from_state_value(value: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.state_value() == value)
    }

    fn color(self) -> Color {
        match self {
            ProcessStatus::Unknown => Color::rgb(192, 192, 192),
            ProcessStatus::WaitBlocked => Color::rgb(200, 200, 0),
            ProcessStatus::Run => Color::rgb(0, 200, 0),
            ProcessStatus::RunSyscall => Color::rgb(0, 0, 200),
            ProcessStatus::Interrupted => Color::rgb(200, 0, 100),
            ProcessStatus::WaitForCpu => Color::rgb(200, 100, 0),
            ProcessStatus::WaitUnknown => Color::rgb(100, 100, 100),
        }
    }
}

pub trait DataPalette {
    fn style_for(&self, node: &PaletteNode<'_>) -> StyleKey;

    fn styles(&self) -> &StyleMap;

    /// Style for `node`, resolved in [`styles`](Self::styles).
    fn resolve(&self, node: &PaletteNode<'_>) -> Option<&OutputStyle> {
        self.styles().get(&self.style_for(node))
    }
}

/// Green for nodes that got lighter, red for nodes that got heavier, white
/// for unchanged ones.
#[derive(Debug, Clone)]
pub struct DifferentialPalette {
    nb_colors: usize,
    styles: StyleMap,
}

impl DifferentialPalette {
    pub const DEFAULT_COLORS: usize = 10;
    pub const WHITE: &'static str = "white";
    const LESS: &'static str = "less";
    const MORE: &'static str = "more";

    /// A palette with `nb_colors` shades per direction, at least one.
    pub fn new(nb_colors: usize) -> Self {
        let nb_colors = nb_colors.max(1);
        let mut styles = StyleMap::new();
        styles.insert(Self::WHITE.into(), OutputStyle::filled(Color::WHITE));
        let green = Color::rgb(0, 160, 0);
        let red = Color::rgb(220, 0, 0);
        for heat in 1..=nb_colors {
            let t = heat as f64 / nb_colors as f64;
            styles.insert(
                format!("{}{heat}", Self::LESS).into(),
                OutputStyle::filled(Color::WHITE.lerp(green, t)),
            );
            styles.insert(
                format!("{}{heat}", Self::MORE).into(),
                OutputStyle::filled(Color::WHITE.lerp(red, t)),
            );
        }
        Self { nb_colors, styles }
    }

    pub fn nb_colors(&self) -> usize {
        self.nb_colors
    }

    /// Style key for a relative difference. New nodes (`NaN`) get the
    /// hottest shade.
    pub fn key_for_difference(&self, difference: f64) -> StyleKey {
        if difference.is_nan() {
            return format!("{}{}", Self::MORE, self.nb_colors).into();
        }
        if difference == 0.0 {
            return Self::WHITE.into();
        }
        let heat = ((difference.abs() * 100.0) as i64).clamp(1, self.nb_colors as i64);
        let prefix = if difference < 0.0 { Self::LESS } else { Self::MORE };
        format!("{prefix}{heat}").into()
    }
}

impl Default for DifferentialPalette {
    fn default() -> Self {
        Self::new(Self::DEFAULT_COLORS)
    }
}

impl DataPalette for DifferentialPalette {
    fn style_for(&self, node: &PaletteNode<'_>) -> StyleKey {
        match node {
            PaletteNode::Differential(difference) => self.key_for_difference(*difference),
            _ => Self::WHITE.into(),
        }
    }

    fn styles(&self) -> &StyleMap {
        &self.styles
    }
}

/// Rotating hue palette for call sites and functions, plus the kernel
/// thread-status styles under a `k` prefix.
#[derive(Debug, Clone)]
pub struct FlameDefaultPalette {
    num_colors: usize,
    styles: StyleMap,
}

impl FlameDefaultPalette {
    pub const DEFAULT_COLORS: usize = 20;
    const KERNEL_PREFIX: &'static str = "k";

    pub fn new(num_colors: usize) -> Self {
        let num_colors = num_colors.max(1);
        let mut styles = StyleMap::new();
        for i in 0..num_colors {
            let hue = 360.0 * i as f64 / num_colors as f64;
            styles.insert(i.to_string().into(), OutputStyle::filled(Color::from_hsv(hue, 0.6, 0.9)));
        }
        for status in ProcessStatus::ALL {
            styles.insert(Self::kernel_key(status.state_value()), OutputStyle::filled(status.color()));
        }
        Self { num_colors, styles }
    }

    pub fn num_colors(&self) -> usize {
        self.num_colors
    }

    fn kernel_key(value: impl std::fmt::Display) -> StyleKey {
        format!("{}{value}", Self::KERNEL_PREFIX).into()
    }

    fn default_key() -> StyleKey {
        Self::kernel_key(ProcessStatus::Unknown.state_value())
    }

    fn key_for_symbol(&self, symbol: &str) -> StyleKey {
        let mut hasher = DefaultHasher::new();
        symbol.hash(&mut hasher);
        let bucket = hasher.finish() % self.num_colors as u64;
        bucket.to_string().into()
    }

    fn existing_or_default(&self, key: StyleKey) -> StyleKey {
        if self.styles.contains_key(&key) {
            key
        } else {
            Self::default_key()
        }
    }
}

impl Default for FlameDefaultPalette {
    fn default() -> Self {
        Self::new(Self::DEFAULT_COLORS)
    }
}

impl DataPalette for FlameDefaultPalette {
    fn style_for(&self, node: &PaletteNode<'_>) -> StyleKey {
        match node {
            PaletteNode::CallSite(symbol) => self.key_for_symbol(symbol),
            PaletteNode::Function(symbol) => self.key_for_symbol(symbol),
            PaletteNode::ThreadStatus(status) => {
                self.existing_or_default(Self::kernel_key(status.state_value()))
            }
            PaletteNode::TimeGraphState(value) => self.existing_or_default(Self::kernel_key(value)),
            PaletteNode::Differential(_) => Self::default_key(),
        }
    }

    fn styles(&self) -> &StyleMap {
        &self.styles
    }
}
