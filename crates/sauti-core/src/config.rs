//! Server configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default port for the duplex protocol listener.
pub const DEFAULT_PORT: u16 = 45054;

/// Default maximum payload size for a single envelope (~1 GB).
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 1000 * 1_000_000;

/// Configuration for the transport listener and engine placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port to bind on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Terminate TLS on the listener. Requires `cert_path` and `key_path`.
    #[serde(default)]
    pub secure: bool,

    /// Path to the PEM certificate file (TLS only).
    #[serde(default)]
    pub cert_path: Option<PathBuf>,

    /// Path to the PEM private key file (TLS only).
    #[serde(default)]
    pub key_path: Option<PathBuf>,

    /// Request per-message compression on the duplex protocol.
    #[serde(default = "default_true")]
    pub compression: bool,

    /// Maximum size of a single inbound envelope.
    #[serde(default = "default_max_payload")]
    pub max_payload_bytes: usize,

    /// Run the execution engine on a dedicated single-threaded runtime so
    /// the accept/I/O path stays responsive during heavy computation.
    #[serde(default = "default_true")]
    pub dedicated_worker: bool,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_max_payload() -> usize {
    DEFAULT_MAX_PAYLOAD_BYTES
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            secure: false,
            cert_path: None,
            key_path: None,
            compression: true,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            dedicated_worker: true,
        }
    }
}
