//! Session core for the Batchline pipelined batch RPC protocol.
//!
//! A client sends a batch of dependent method invocations (`push`) and then
//! pulls their results (`pull`). Arguments of a later call may reference
//! the not-yet-computed result of an earlier one, so a single round trip
//! carries a whole dependency chain. This crate implements the server-side
//! session state machine: message parsing, export ID allocation, pipeline
//! reference resolution, lazy dispatch, result caching and response
//! framing. Transports feed it text messages and take text responses back.

pub mod error;
pub mod ids;
pub mod methods;
pub mod resolver;
pub mod session;
pub mod store;
pub mod value;
pub mod wire;

pub use error::{ErrorKind, RpcError};
pub use ids::{ExportId, IdAllocator};
pub use methods::MethodTarget;
pub use resolver::{PipelineResolver, ResolveError};
pub use session::RpcSession;
pub use store::{Operation, SessionStore};
pub use value::{PathKey, Value, ValueError};
pub use wire::{CodecError, Message, PipelineCall};

pub use async_trait::async_trait;

/// The user-supplied method dispatcher a session calls into.
///
/// `args` arrives fully resolved, with no pipeline references left. The
/// dispatcher may suspend; it is invoked with no session state locked and
/// must be safe for concurrent calls when shared across sessions.
#[async_trait]
pub trait RpcTarget: Send + Sync + std::fmt::Debug {
    async fn dispatch(&self, method: &str, args: Value) -> Result<Value, RpcError>;
}
