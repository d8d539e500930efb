use std::collections::HashMap;

use parking_lot::Mutex;

use crate::surface::LeafId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkKind {
    Matched,
    Current,
}

/// Narrow write capability over the surface's highlight state.
///
/// All operations must be idempotent: marking a marked leaf or unmarking an
/// unmarked one is not an error.
pub trait Marker: Send + Sync {
    fn mark(&self, leaf: LeafId, kind: MarkKind);
    fn unmark(&self, leaf: LeafId, kind: MarkKind);
    /// Strips every mark of every kind from the whole surface.
    fn clear_all(&self);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Marks {
    pub matched: bool,
    pub current: bool,
}

impl Marks {
    pub fn is_empty(&self) -> bool {
        !self.matched && !self.current
    }

    fn set(&mut self, kind: MarkKind, value: bool) {
        match kind {
            MarkKind::Matched => self.matched = value,
            MarkKind::Current => self.current = value,
        }
    }

    fn has(&self, kind: MarkKind) -> bool {
        match kind {
            MarkKind::Matched => self.matched,
            MarkKind::Current => self.current,
        }
    }
}

/// In-memory highlight state, keyed by leaf handle.
#[derive(Debug, Default)]
pub struct MarkerSet {
    inner: Mutex<HashMap<LeafId, Marks>>,
}

impl MarkerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn marks(&self, leaf: LeafId) -> Marks {
        self.inner.lock().get(&leaf).copied().unwrap_or_default()
    }

    /// Leaves carrying `kind`, in handle order.
    pub fn marked(&self, kind: MarkKind) -> Vec<LeafId> {
        let mut leaves: Vec<_> = self
            .inner
            .lock()
            .iter()
            .filter(|(_, marks)| marks.has(kind))
            .map(|(leaf, _)| *leaf)
            .collect();
        leaves.sort();
        leaves
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl Marker for MarkerSet {
    fn mark(&self, leaf: LeafId, kind: MarkKind) {
        self.inner.lock().entry(leaf).or_default().set(kind, true);
    }

    fn unmark(&self, leaf: LeafId, kind: MarkKind) {
        let mut inner = self.inner.lock();
        if let Some(marks) = inner.get_mut(&leaf) {
            marks.set(kind, false);
            if marks.is_empty() {
                inner.remove(&leaf);
            }
        }
    }

    fn clear_all(&self) {
        self.inner.lock().clear();
    }
}
