// Method-registry dispatcher.

use dashmap::DashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::RpcError;
use crate::value::Value;
use crate::RpcTarget;

type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value, RpcError>> + Send>>;
type Handler = Arc<dyn Fn(Value) -> HandlerFuture + Send + Sync>;

/// An [`RpcTarget`] backed by a map of named async handlers. Registration
/// and dispatch are safe for concurrent use; one instance is typically
/// shared across every session of a server.
pub struct MethodTarget {
    methods: DashMap<String, Handler>,
}

impl MethodTarget {
    pub fn new() -> Self {
        MethodTarget {
            methods: DashMap::new(),
        }
    }

    /// Register a handler under `name`, replacing any previous handler.
    pub fn method<F, Fut>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, RpcError>> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |args: Value| -> HandlerFuture {
            Box::pin(handler(args))
        });
        self.methods.insert(name.into(), handler);
    }
}

impl Default for MethodTarget {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RpcTarget for MethodTarget {
    async fn dispatch(&self, method: &str, args: Value) -> Result<Value, RpcError> {
        // Clone the handler out so no map entry is held across the await.
        let handler = self
            .methods
            .get(method)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RpcError::method_error(format!("method not found: {}", method)))?;
        handler(args).await
    }
}

impl fmt::Debug for MethodTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodTarget")
            .field("methods", &self.methods.len())
            .finish()
    }
}
