use std::fmt;

/// Kind of an open composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// Values only.
    Vector,
    /// Interleaved key, value pairs.
    Map,
}

/// Records where an open vector or map begins on the construction stack.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ScopeMarker {
    start: usize,
    kind: ScopeKind,
}

impl ScopeMarker {
    pub(crate) fn new(start: usize, kind: ScopeKind) -> Self {
        Self { start, kind }
    }

    /// Construction stack depth when the scope was opened.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Vector or map.
    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    /// Returns true for map scopes.
    pub fn is_map(&self) -> bool {
        self.kind == ScopeKind::Map
    }
}

impl fmt::Debug for ScopeMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}@{}", self.kind, self.start)
    }
}
