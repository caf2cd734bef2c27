// Session engine: drives the codec, store and resolver for one session.
//
// A session is created per transport connection (WebSocket) or per HTTP
// batch request, owns its state exclusively, and is destroyed when the
// transport goes away. Messages are handled in arrival order.

use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::error::{ErrorKind, RpcError};
use crate::ids::ExportId;
use crate::resolver::PipelineResolver;
use crate::store::{Operation, SessionStore};
use crate::value::Value;
use crate::wire::{CodecError, Message, PipelineCall};
use crate::RpcTarget;

pub struct RpcSession {
    store: SessionStore,
    target: Arc<dyn RpcTarget>,
}

impl RpcSession {
    pub fn new(target: Arc<dyn RpcTarget>) -> Self {
        debug!("session opened");
        RpcSession {
            store: SessionStore::new(),
            target,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Handle one inbound message. Returns the serialized response, if the
    /// message warrants one. Only a malformed outer message is an error;
    /// the transport decides whether to log and drop or to hang up.
    pub async fn handle_message(&self, text: &str) -> Result<Option<String>, CodecError> {
        let Some(message) = Message::parse(text)? else {
            return Ok(None);
        };

        match message {
            Message::Push(body) => {
                self.handle_push(body);
                Ok(None)
            }

            Message::Pull(id) => {
                let response = self.handle_pull(id).await;
                Ok(Some(response.serialize()))
            }

            Message::Release { id, refcount } => {
                // Advisory only; results are drained by pull, not release.
                debug!(export_id = %id, refcount, "release acknowledged");
                Ok(None)
            }

            Message::Abort(info) => {
                warn!(error = %info, "abort received, session continues");
                Ok(None)
            }

            Message::Resolve(..) | Message::Reject(..) => {
                trace!("ignoring outbound-tagged inbound message");
                Ok(None)
            }
        }
    }

    /// Process a line-delimited batch in order, joining responses with LF.
    pub async fn handle_batch(&self, body: &str) -> String {
        let mut responses = Vec::new();
        for line in body.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match self.handle_message(line).await {
                Ok(Some(response)) => responses.push(response),
                Ok(None) => {}
                Err(err) => warn!(error = %err, "dropping unparseable message"),
            }
        }
        responses.join("\n")
    }

    /// Discard all pending state. Called when the transport closes.
    pub fn close(&self) {
        debug!(
            pending = self.store.pending_count(),
            results = self.store.result_count(),
            "session closed"
        );
        self.store.clear();
    }

    fn handle_push(&self, body: JsonValue) {
        // A body that is not a non-empty list is dropped without consuming
        // an export ID. A list that fails to parse as a pipeline call still
        // consumes its ID; the client counts pushes, not successes.
        let Some(items) = body.as_array().filter(|items| !items.is_empty()) else {
            warn!("push body is not a non-empty list, ignoring");
            return;
        };

        let id = self.store.allocate_id();
        match PipelineCall::from_body(items) {
            Some(call) => {
                trace!(
                    export_id = %id,
                    import_id = call.import_id,
                    method = %call.method,
                    "operation registered"
                );
                self.store.register_pending(
                    id,
                    Operation {
                        method: call.method,
                        args: call.args,
                    },
                );
            }
            None => {
                warn!(export_id = %id, "push body is not a pipeline call; ID consumed without operation");
            }
        }
    }

    async fn handle_pull(&self, id: ExportId) -> Message {
        // Completed earlier, consume the cached value.
        if let Some(result) = self.store.take_result(id) {
            trace!(export_id = %id, "pull satisfied from results");
            return if result.is_error() {
                Message::Reject(id, result)
            } else {
                Message::Resolve(id, escape_list(result))
            };
        }

        let Some(op) = self.store.take_pending(id) else {
            return Message::Reject(id, RpcError::export_not_found().to_value());
        };

        let args = match Value::from_json(&op.args) {
            Ok(args) => args,
            Err(err) => return reject(id, ErrorKind::ArgumentError, err.to_string()),
        };

        let resolver = PipelineResolver::new(&self.store, self.target.as_ref());
        let resolved_args = match resolver.resolve(args, id).await {
            Ok(resolved) => resolved,
            Err(err) => return reject(id, ErrorKind::PipelineError, err.to_string()),
        };

        match self.target.dispatch(&op.method, resolved_args).await {
            Ok(result) => {
                // Cache the result: later pipeline references and one more
                // pull may still consume it.
                self.store.store_result(id, result.clone());
                debug!(export_id = %id, method = %op.method, "operation resolved");
                Message::Resolve(id, escape_list(result))
            }
            Err(err) => {
                // Not cached; a repeated pull finds the ID unknown.
                debug!(export_id = %id, method = %op.method, error = %err, "operation rejected");
                reject(id, ErrorKind::MethodError, err.message)
            }
        }
    }
}

/// A resolved value that is itself a list is wrapped in a one-element list
/// so it cannot be mistaken for an outbound message.
fn escape_list(value: Value) -> Value {
    match value {
        Value::Array(_) => Value::Array(vec![value]),
        other => other,
    }
}

fn reject(id: ExportId, kind: ErrorKind, message: String) -> Message {
    Message::Reject(
        id,
        Value::Error {
            kind: kind.as_str().to_string(),
            message,
        },
    )
}
