// Pipeline reference resolution.
//
// Rewrites a value tree, substituting every pipeline reference with the
// value at the referenced export ID, evaluating pending dependencies lazily
// through the dispatcher. A dependency is evaluated at most once per
// session: the first encounter drains it from the pending table and caches
// the result, later encounters hit the cache.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;

use tracing::trace;

use crate::error::RpcError;
use crate::ids::ExportId;
use crate::store::SessionStore;
use crate::value::{PathKey, Value, ValueError};
use crate::RpcTarget;

pub struct PipelineResolver<'a> {
    store: &'a SessionStore,
    target: &'a dyn RpcTarget,
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("pipeline reference to unknown export {0}")]
    UnknownExport(ExportId),

    #[error("array index {index} out of bounds for length {len}")]
    PathOutOfBounds { index: usize, len: usize },

    #[error("cannot apply selector {selector:?} to {target} value")]
    BadPath {
        selector: PathKey,
        target: &'static str,
    },

    #[error("cyclic pipeline reference through export {0}")]
    CycleDetected(ExportId),

    #[error("arguments of export {id} are not a value tree: {source}")]
    Argument { id: ExportId, source: ValueError },

    #[error("dispatch of export {id} failed: {source}")]
    Dispatch { id: ExportId, source: RpcError },
}

impl<'a> PipelineResolver<'a> {
    pub fn new(store: &'a SessionStore, target: &'a dyn RpcTarget) -> Self {
        PipelineResolver { store, target }
    }

    /// Resolve every pipeline reference in `value`. `root` is the export ID
    /// whose arguments are being resolved; a reference back to it (direct
    /// or through dependencies) is a cycle.
    pub async fn resolve(&self, value: Value, root: ExportId) -> Result<Value, ResolveError> {
        let mut visiting = HashSet::new();
        visiting.insert(root);
        self.resolve_value(value, &mut visiting).await
    }

    fn resolve_value<'s>(
        &'s self,
        value: Value,
        visiting: &'s mut HashSet<ExportId>,
    ) -> Pin<Box<dyn Future<Output = Result<Value, ResolveError>> + Send + 's>> {
        Box::pin(async move {
            match value {
                Value::Null
                | Value::Bool(_)
                | Value::Number(_)
                | Value::String(_)
                | Value::Error { .. } => Ok(value),

                Value::Array(items) => {
                    let mut resolved = Vec::with_capacity(items.len());
                    for item in items {
                        resolved.push(self.resolve_value(item, visiting).await?);
                    }
                    Ok(Value::Array(resolved))
                }

                Value::Object(map) => {
                    let mut resolved = std::collections::HashMap::with_capacity(map.len());
                    for (key, val) in map {
                        resolved.insert(key, self.resolve_value(val, visiting).await?);
                    }
                    Ok(Value::Object(resolved))
                }

                Value::Pipeline { id, path } => self.resolve_reference(id, path, visiting).await,
            }
        })
    }

    async fn resolve_reference(
        &self,
        id: ExportId,
        path: Vec<PathKey>,
        visiting: &mut HashSet<ExportId>,
    ) -> Result<Value, ResolveError> {
        if let Some(result) = self.store.get_result(id) {
            return walk_path(result, &path);
        }

        if visiting.contains(&id) {
            return Err(ResolveError::CycleDetected(id));
        }

        let Some(op) = self.store.take_pending(id) else {
            return Err(ResolveError::UnknownExport(id));
        };
        visiting.insert(id);
        trace!(export_id = %id, method = %op.method, "lazily evaluating dependency");

        let args =
            Value::from_json(&op.args).map_err(|source| ResolveError::Argument { id, source })?;
        let resolved_args = self.resolve_value(args, visiting).await?;
        let result = self
            .target
            .dispatch(&op.method, resolved_args)
            .await
            .map_err(|source| ResolveError::Dispatch { id, source })?;

        self.store.store_result(id, result.clone());
        visiting.remove(&id);
        walk_path(result, &path)
    }
}

/// Walk `path` through `current`. A missing object key yields null, like a
/// JSON property lookup; an out-of-range index or a selector applied to the
/// wrong shape is an error.
fn walk_path(mut current: Value, path: &[PathKey]) -> Result<Value, ResolveError> {
    for key in path {
        current = match (key, current) {
            (PathKey::String(k), Value::Object(mut map)) => {
                map.remove(k.as_str()).unwrap_or(Value::Null)
            }
            (PathKey::Index(i), Value::Array(mut items)) => {
                if *i >= items.len() {
                    return Err(ResolveError::PathOutOfBounds {
                        index: *i,
                        len: items.len(),
                    });
                }
                items.swap_remove(*i)
            }
            (key, other) => {
                return Err(ResolveError::BadPath {
                    selector: key.clone(),
                    target: other.type_name(),
                })
            }
        };
    }
    Ok(current)
}
