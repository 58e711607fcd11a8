use std::sync::Arc;

use weighted_tree_protocol::SharedStr;

/// One level of a grouping hierarchy, e.g. `process -> thread`.
///
/// Descriptors form a singly linked chain from the outermost level to the
/// leaf. The special `All` descriptor sits above the chain and means "merge
/// everything".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupDescriptor {
    name: SharedStr,
    kind: GroupKind,
    next: Option<Arc<GroupDescriptor>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum GroupKind {
    All,
    Level,
}

impl GroupDescriptor {
    pub const ALL_NAME: &'static str = "All";

    pub fn level(name: impl Into<SharedStr>, next: Option<Arc<GroupDescriptor>>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            kind: GroupKind::Level,
            next,
        })
    }

    /// The universal grouping, above `first` (the outermost real level).
    pub fn all(first: Option<Arc<GroupDescriptor>>) -> Arc<Self> {
        Arc::new(Self {
            name: Self::ALL_NAME.into(),
            kind: GroupKind::All,
            next: first,
        })
    }

    /// Build a chain from level names, outermost first. Returns the
    /// outermost level, or `None` for an empty list.
    pub fn hierarchy<I, S>(names: I) -> Option<Arc<Self>>
    where
        I: IntoIterator<Item = S>,
        S: Into<SharedStr>,
    {
        let names: Vec<SharedStr> = names.into_iter().map(Into::into).collect();
        names
            .into_iter()
            .rev()
            .fold(None, |next, name| Some(Self::level(name, next)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn next_group(&self) -> Option<&Arc<GroupDescriptor>> {
        self.next.as_ref()
    }

    pub fn is_all(&self) -> bool {
        self.kind == GroupKind::All
    }

    /// This level and every level below it.
    pub fn levels(self: &Arc<Self>) -> impl Iterator<Item = Arc<GroupDescriptor>> {
        std::iter::successors(Some(Arc::clone(self)), |d| d.next.clone())
    }
}

/// Resolve a numeric grouping level: 0 is `All`, 1 is `root`, `n` is the
/// n-th level of the chain. `None` past the leaf.
pub fn descriptor_for_level(
    root: Option<&Arc<GroupDescriptor>>,
    level: usize,
) -> Option<Arc<GroupDescriptor>> {
    if level == 0 {
        return Some(GroupDescriptor::all(root.cloned()));
    }
    root?.levels().nth(level - 1)
}

/// Handle to an element inside the set that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub(crate) usize);

/// An element owning a forest: a thread, a process, a worker.
#[derive(Debug, Clone)]
pub struct Element {
    pub name: SharedStr,
    pub group: Option<Arc<GroupDescriptor>>,
    pub parent: Option<ElementId>,
    pub children: Vec<ElementId>,
}

impl Element {
    pub fn is_grouped_by(&self, descriptor: &GroupDescriptor) -> bool {
        self.group.as_deref() == Some(descriptor)
    }
}
