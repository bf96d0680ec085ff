//! JSON-RPC Server
//!
//! Serves HTTP and WebSocket on one localhost TCP port. Unary methods work
//! over either transport; progress subscriptions need WebSocket.

use crate::handler::RpcHandler;
use crate::types::{GetJobRequest, StartSortRequest, StartValidationRequest, SubscribeProgressRequest};
use jsonrpsee::core::{RegisterMethodError, SubscriptionResult};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::{ErrorObjectOwned, Params};
use jsonrpsee::{PendingSubscriptionSink, RpcModule, SubscriptionMessage};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

const DEFAULT_RPC_HOST: &str = "127.0.0.1";
const DEFAULT_RPC_PORT: u16 = 9630;

/// Progress subscription method names
pub const PROGRESS_SUBSCRIBE: &str = "job.progress.subscribe.v1";
pub const PROGRESS_NOTIFICATION: &str = "job.progress.v1";
pub const PROGRESS_UNSUBSCRIBE: &str = "job.progress.unsubscribe.v1";

/// RPC Server Configuration
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    pub host: String,
    /// 0 picks a free port
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

/// Server startup errors
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to build server on {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("Failed to register RPC method: {0}")]
    Register(#[from] RegisterMethodError),
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(config: RpcServerConfig, handler: Arc<RpcHandler>) -> Self {
        Self { config, handler }
    }

    /// Start the JSON-RPC server
    ///
    /// Returns the bound address (useful with port 0) and the stop handle.
    pub async fn start(self) -> Result<(SocketAddr, ServerHandle), ServerError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        info!(
            host = %self.config.host,
            port = %self.config.port,
            "Starting JSON-RPC server (HTTP + WebSocket)"
        );

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = server
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;

        let module = self.build_module()?;

        info!(addr = %local_addr, "JSON-RPC server started successfully");

        let handle = server.start(module);
        Ok((local_addr, handle))
    }

    fn build_module(&self) -> Result<RpcModule<()>, ServerError> {
        let mut module = RpcModule::new(());

        // Launch APIs
        let handler = self.handler.clone();
        module.register_async_method("validation.start.v1", move |params, _, _| {
            let handler = handler.clone();
            async move {
                let req = params
                    .parse::<Option<StartValidationRequest>>()?
                    .unwrap_or_default();
                handler.start_validation(req).await
            }
        })?;

        let handler = self.handler.clone();
        module.register_async_method("sort.start.v1", move |params, _, _| {
            let handler = handler.clone();
            async move {
                let req = params
                    .parse::<Option<StartSortRequest>>()?
                    .unwrap_or_default();
                handler.start_sort(req).await
            }
        })?;

        // Query APIs
        let handler = self.handler.clone();
        module.register_async_method("validation.status.v1", move |_, _, _| {
            let handler = handler.clone();
            async move { Ok::<_, ErrorObjectOwned>(handler.validation_status().await) }
        })?;

        let handler = self.handler.clone();
        module.register_async_method("job.get.v1", move |params, _, _| {
            let handler = handler.clone();
            async move {
                let req: GetJobRequest = params.parse()?;
                handler.get_job(req).await
            }
        })?;

        // Admin APIs
        let handler = self.handler.clone();
        module.register_async_method("admin.stats.v1", move |_, _, _| {
            let handler = handler.clone();
            async move { Ok::<_, ErrorObjectOwned>(handler.stats().await) }
        })?;

        let handler = self.handler.clone();
        module.register_async_method("admin.sweep.v1", move |_, _, _| {
            let handler = handler.clone();
            async move { Ok::<_, ErrorObjectOwned>(handler.sweep().await) }
        })?;

        // Progress stream
        let handler = self.handler.clone();
        module.register_subscription(
            PROGRESS_SUBSCRIBE,
            PROGRESS_NOTIFICATION,
            PROGRESS_UNSUBSCRIBE,
            move |params, pending, _, _| {
                let handler = handler.clone();
                async move { stream_progress(handler, params, pending).await }
            },
        )?;

        Ok(module)
    }
}

/// Replay a job's history to one subscriber, then follow it to the end
///
/// Ends quietly after the terminal event. If the job disappears first the
/// subscription closes with an error.
async fn stream_progress(
    handler: Arc<RpcHandler>,
    params: Params<'static>,
    pending: PendingSubscriptionSink,
) -> SubscriptionResult {
    let req: SubscribeProgressRequest = match params.parse() {
        Ok(req) => req,
        Err(e) => {
            pending.reject(e).await;
            return Ok(());
        }
    };

    let mut observer = match handler.observe(&req.job_id).await {
        Ok(observer) => observer,
        Err(e) => {
            pending.reject(e).await;
            return Ok(());
        }
    };

    let sink = pending.accept().await?;
    debug!(job_id = %req.job_id, "Progress subscriber connected");

    loop {
        tokio::select! {
            _ = sink.closed() => {
                debug!(
                    job_id = %req.job_id,
                    delivered = observer.delivered(),
                    "Progress subscriber disconnected"
                );
                return Ok(());
            }
            batch = observer.next_batch() => match batch {
                Some(events) => {
                    for event in events {
                        sink.send(SubscriptionMessage::from_json(&event)?).await?;
                    }
                }
                // Terminal event delivered
                None => return Ok(()),
            },
        }
    }
}
