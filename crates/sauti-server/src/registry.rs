//! Connection registry: request id -> client connection.
//!
//! One id maps to exactly one connection handle, last write wins; a
//! repeated id from a second connection silently steals the routing.
//! Entries are swept in bulk when their connection closes and pruned
//! individually once a terminal event has been routed.

use std::collections::HashMap;
use std::sync::Mutex;

use axum::extract::ws::Message;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

struct RouteEntry {
    connection_id: Uuid,
    sender: mpsc::UnboundedSender<Message>,
}

#[derive(Default)]
pub struct ConnectionRegistry {
    entries: Mutex<HashMap<String, RouteEntry>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the connection that should receive events for
    /// `request_id`, overwriting any prior mapping for that id.
    pub fn register(
        &self,
        request_id: &str,
        connection_id: Uuid,
        sender: mpsc::UnboundedSender<Message>,
    ) {
        let mut entries = self.entries.lock().expect("connection registry poisoned");
        entries.insert(
            request_id.to_string(),
            RouteEntry {
                connection_id,
                sender,
            },
        );
    }

    /// Look up the outbound sender for `request_id`, if any connection is
    /// still registered for it.
    pub fn route(&self, request_id: &str) -> Option<mpsc::UnboundedSender<Message>> {
        let entries = self.entries.lock().expect("connection registry poisoned");
        entries.get(request_id).map(|entry| entry.sender.clone())
    }

    /// Drop the mapping for a finished request.
    pub fn complete(&self, request_id: &str) {
        let mut entries = self.entries.lock().expect("connection registry poisoned");
        entries.remove(request_id);
    }

    /// Sweep every mapping owned by a closed connection. Returns how many
    /// entries were removed.
    pub fn remove_connection(&self, connection_id: Uuid) -> usize {
        let mut entries = self.entries.lock().expect("connection registry poisoned");
        let before = entries.len();
        entries.retain(|_, entry| entry.connection_id != connection_id);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(%connection_id, removed, "swept routing entries for closed connection");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("connection registry poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
