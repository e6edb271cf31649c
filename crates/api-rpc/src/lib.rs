//! JSON-RPC API Layer
//!
//! JSON-RPC 2.0 server exposing the import queue and the catalogue to
//! presentation layers and the `porter` CLI.

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use handler::RpcHandler;
pub use server::{RpcServer, RpcServerConfig};
