// Per-session mutable state.
//
// An export ID is in at most one of the two tables at any moment: `pending`
// while its operation has been pushed but not evaluated, `results` once
// evaluation completed. Each table operation is individually atomic; the
// session engine sequences them.

use dashmap::DashMap;
use serde_json::Value as JsonValue;

use crate::ids::{ExportId, IdAllocator};
use crate::value::Value;

/// A pushed call awaiting lazy evaluation. `args` stays raw JSON until a
/// pull parses it; a malformed args tree surfaces then, not at push time.
#[derive(Debug, Clone)]
pub struct Operation {
    pub method: String,
    pub args: JsonValue,
}

pub struct SessionStore {
    allocator: IdAllocator,
    pending: DashMap<ExportId, Operation>,
    results: DashMap<ExportId, Value>,
}

impl SessionStore {
    pub fn new() -> Self {
        SessionStore {
            allocator: IdAllocator::new(),
            pending: DashMap::new(),
            results: DashMap::new(),
        }
    }

    pub fn allocate_id(&self) -> ExportId {
        self.allocator.allocate()
    }

    /// Insert a pushed operation. The ID must be freshly allocated and in
    /// neither table.
    pub fn register_pending(&self, id: ExportId, op: Operation) {
        debug_assert!(
            !self.pending.contains_key(&id) && !self.results.contains_key(&id),
            "export {} registered twice",
            id
        );
        self.pending.insert(id, op);
    }

    pub fn get_pending(&self, id: ExportId) -> Option<Operation> {
        self.pending.get(&id).map(|entry| entry.value().clone())
    }

    pub fn take_pending(&self, id: ExportId) -> Option<Operation> {
        self.pending.remove(&id).map(|(_, op)| op)
    }

    pub fn get_result(&self, id: ExportId) -> Option<Value> {
        self.results.get(&id).map(|entry| entry.value().clone())
    }

    pub fn take_result(&self, id: ExportId) -> Option<Value> {
        self.results.remove(&id).map(|(_, value)| value)
    }

    /// Store a completed evaluation. Replaces any prior result; in practice
    /// this only runs after `take_pending` for the same ID.
    pub fn store_result(&self, id: ExportId, value: Value) {
        self.results.insert(id, value);
    }

    pub fn has_pending(&self, id: ExportId) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn has_result(&self, id: ExportId) -> bool {
        self.results.contains_key(&id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn result_count(&self) -> usize {
        self.results.len()
    }

    /// Discard all state, e.g. when the transport closes mid-session.
    pub fn clear(&self) {
        self.pending.clear();
        self.results.clear();
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
