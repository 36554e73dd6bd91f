// SSUI shell runtime core
//
// The desktop frontend renders operations of a separate backend process
// without knowing them at build time. This crate holds the parts every page
// relies on: the type schema parser, the component registry and typed slots,
// and the HTTP/WebSocket transport.

// Declare modules
pub mod components;
pub mod config;
pub mod schema;
pub mod transport;

use std::sync::Arc;

use components::{register_builtins, ComponentRegistry};
use config::ShellConfig;
use transport::{ShellTransport, TransportClient, TransportResult};

/// Process-wide services, built once at startup and handed to every page
pub struct ShellCore {
    pub config: ShellConfig,
    pub registry: Arc<ComponentRegistry>,
    pub transport: Arc<TransportClient>,
}

impl ShellCore {
    /// Build the registry with the built-in components and a transport for
    /// the configured backend
    pub fn new(config: ShellConfig) -> TransportResult<Self> {
        let registry = Arc::new(ComponentRegistry::new());
        register_builtins(&registry);

        let transport = Arc::new(TransportClient::new(&config)?);
        log::info!(
            "Shell core ready: {} component(s), backend {} over {}",
            registry.len(),
            transport.base_url(),
            transport.transport_type()
        );

        Ok(Self {
            config,
            registry,
            transport,
        })
    }
}
