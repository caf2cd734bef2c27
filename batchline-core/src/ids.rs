use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

/// Export ID - names a deferred or completed computation within one session.
/// Allocated monotonically from 1; two sessions may reuse the same ID for
/// unrelated computations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExportId(i64);

impl ExportId {
    pub fn new(value: i64) -> Self {
        ExportId(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ExportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ExportId {
    fn from(value: i64) -> Self {
        ExportId::new(value)
    }
}

/// Allocator for session-local export IDs.
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicI64,
}

impl IdAllocator {
    pub fn new() -> Self {
        IdAllocator {
            next: AtomicI64::new(1),
        }
    }

    pub fn allocate(&self) -> ExportId {
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        ExportId::new(id)
    }

    pub fn peek_next(&self) -> i64 {
        self.next.load(Ordering::Relaxed)
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
