//! Result routing: engine events back to client connections.

use std::sync::Arc;

use axum::extract::ws::Message;
use sauti_core::protocol::encode_response;
use sauti_core::EngineEvent;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::registry::ConnectionRegistry;

/// Forward engine events to whichever connection is registered for each
/// request id.
///
/// Events with no registered (or no longer open) connection are dropped
/// silently: no buffering, no retry. Terminal events prune the routing
/// entry for their id.
pub async fn route_events(
    mut events: mpsc::UnboundedReceiver<EngineEvent>,
    connections: Arc<ConnectionRegistry>,
) {
    while let Some(event) = events.recv().await {
        let request_id = event.envelope.request_id.clone();

        if let Some(sender) = connections.route(&request_id) {
            // Strip in-process-only fields before the event hits the wire.
            match encode_response(&event.envelope.to_wire()) {
                Ok(bytes) => {
                    if sender.send(Message::Binary(bytes.into())).is_err() {
                        debug!(request_id = %request_id, "connection gone, event dropped");
                    }
                }
                Err(error) => {
                    warn!(request_id = %request_id, %error, "failed to encode event");
                }
            }
        } else {
            debug!(request_id = %request_id, "no connection registered, event dropped");
        }

        if event.terminal {
            // Prunes whatever entry currently holds this id. If the id was
            // submitted twice, the first job's terminal removes the routing
            // registered by the second submission and the later job's
            // events drop; ids are assumed unique, not enforced.
            connections.complete(&request_id);
        }
    }
    debug!("engine event stream ended, router stopping");
}
