//! JSON-RPC Server
//!
//! Serves the queue and catalogue methods over TCP on localhost.

use crate::handler::RpcHandler;
use crate::types::{AssetsRequest, EnqueueRequest, InteractiveRequest, ResolveRequest};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use std::sync::Arc;
use tracing::info;

// jsonrpsee has no Unix socket transport; bind to loopback only
pub const DEFAULT_RPC_HOST: &str = "127.0.0.1";
pub const DEFAULT_RPC_PORT: u16 = 9531;

/// RPC Server Configuration
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(config: RpcServerConfig, handler: RpcHandler) -> Self {
        Self {
            config,
            handler: Arc::new(handler),
        }
    }

    /// Start the JSON-RPC server
    pub async fn start(self) -> Result<ServerHandle, String> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        info!(
            host = %self.config.host,
            port = %self.config.port,
            "Starting JSON-RPC server"
        );

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| format!("Failed to build server on {}: {}", addr, e))?;

        let module = self.module().map_err(|e| e.to_string())?;

        info!("JSON-RPC server started successfully");
        Ok(server.start(module))
    }

    fn module(&self) -> Result<RpcModule<()>, jsonrpsee::core::RegisterMethodError> {
        let mut module = RpcModule::new(());

        // Queue APIs
        let handler = self.handler.clone();
        module.register_async_method("queue.enqueue.v1", move |params, _, _| {
            let handler = handler.clone();
            async move {
                let req: EnqueueRequest = params.parse()?;
                handler.enqueue(req).await
            }
        })?;

        let handler = self.handler.clone();
        module.register_async_method("queue.start.v1", move |_, _, _| {
            let handler = handler.clone();
            async move { handler.start().await }
        })?;

        let handler = self.handler.clone();
        module.register_async_method("queue.clear.v1", move |_, _, _| {
            let handler = handler.clone();
            async move { handler.clear().await }
        })?;

        let handler = self.handler.clone();
        module.register_async_method("queue.status.v1", move |_, _, _| {
            let handler = handler.clone();
            async move { handler.status().await }
        })?;

        let handler = self.handler.clone();
        module.register_async_method("queue.interactive.v1", move |params, _, _| {
            let handler = handler.clone();
            async move {
                // No params means "just report"
                let req: Option<InteractiveRequest> = params.parse()?;
                handler.interactive(req.unwrap_or_default()).await
            }
        })?;

        // Catalogue APIs
        let handler = self.handler.clone();
        module.register_async_method("catalog.resolve.v1", move |params, _, _| {
            let handler = handler.clone();
            async move {
                let req: ResolveRequest = params.parse()?;
                handler.resolve(req).await
            }
        })?;

        let handler = self.handler.clone();
        module.register_async_method("catalog.assets.v1", move |params, _, _| {
            let handler = handler.clone();
            async move {
                let req: AssetsRequest = params.parse()?;
                handler.assets(req).await
            }
        })?;

        let handler = self.handler.clone();
        module.register_async_method("catalog.products.v1", move |_, _, _| {
            let handler = handler.clone();
            async move { handler.products().await }
        })?;

        Ok(module)
    }
}
