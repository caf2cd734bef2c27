// Minimal server with a single "hello" method.
//
// Try it:
//   curl -X POST http://localhost:8080/rpc --data-binary $'["push",["pipeline",0,["hello"],["World"]]]\n["pull",1]'

use std::sync::Arc;

use batchline_core::{MethodTarget, Value};
use batchline_server::{init_logging, RpcServer, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _guard = init_logging("logs", "hello-server")?;

    let target = MethodTarget::new();
    target.method("hello", |args| async move {
        let name = match &args {
            Value::Array(items) => match items.first() {
                Some(Value::String(name)) => name.clone(),
                _ => "World".to_string(),
            },
            _ => "World".to_string(),
        };
        Ok(Value::String(format!("Hello, {}!", name)))
    });

    let config = ServerConfig::from_env();
    RpcServer::new(config, Arc::new(target))
        .serve_static("/static", "static")
        .run()
        .await
}
