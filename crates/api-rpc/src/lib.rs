//! JSON-RPC API Layer
//!
//! Exposes job launch, status and live progress streaming over JSON-RPC 2.0
//! (HTTP for calls, WebSocket for progress subscriptions).

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use handler::RpcHandler;
pub use jsonrpsee::server::ServerHandle;
pub use server::{RpcServer, RpcServerConfig, ServerError};
