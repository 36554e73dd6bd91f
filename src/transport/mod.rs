//! Transport Module
//!
//! Talks to the backend process:
//! - Plain JSON requests over HTTP
//! - Streamed calls whose progress arrives as named callbacks over a shared
//!   WebSocket, correlated by request id
//! - Automatic reconnection while streamed calls are pending

pub mod client;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod frames;

use async_trait::async_trait;
use serde_json::Value;

pub use client::TransportClient;
pub use connection::{ConnectionState, TransportEvent};
pub use dispatch::{Callback, CallbackMap, Delivery, Dispatcher};
pub use error::{TransportError, TransportResult};
pub use frames::{FrameKind, PushFrame, StreamStart};

/// Backend calls as seen by pages; lets pages run against a stub backend
#[async_trait]
pub trait ShellTransport: Send + Sync {
    /// GET `/<path>`
    async fn get(&self, path: &str) -> TransportResult<Value>;

    /// PUT `/<path>` with a JSON body
    async fn put(&self, path: &str, body: &Value) -> TransportResult<Value>;

    /// DELETE `/<path>`
    async fn delete(&self, path: &str) -> TransportResult<Value>;

    /// POST `/<path>`, streamed when callbacks are given
    async fn post(
        &self,
        path: &str,
        body: Option<&Value>,
        callbacks: Option<CallbackMap>,
    ) -> TransportResult<Value>;

    /// Get transport type name
    fn transport_type(&self) -> &'static str;
}
