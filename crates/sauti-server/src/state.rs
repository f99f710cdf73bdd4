//! Shared application state.

use std::sync::Arc;

use sauti_core::{EngineHandle, ServerConfig};

use crate::registry::ConnectionRegistry;

/// State handed to every connection handler.
#[derive(Clone)]
pub struct AppState {
    /// Submission side of the execution engine.
    pub engine: EngineHandle,
    /// request id -> connection routing table.
    pub connections: Arc<ConnectionRegistry>,
    /// Listener configuration (payload limits, compression flag).
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(engine: EngineHandle, config: ServerConfig) -> Self {
        Self {
            engine,
            connections: Arc::new(ConnectionRegistry::new()),
            config: Arc::new(config),
        }
    }
}
