//! Job submission gateway.
//!
//! Decodes inbound frames and routes them: cancellation signals go to the
//! cancellation registry (never queued, never answered), job submissions
//! register the requester in the connection registry and enter the engine
//! queue. Undecodable frames and envelopes without a request id are
//! logged and dropped; neither closes the connection.

use axum::extract::ws::Message;
use sauti_core::protocol::decode_request;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::state::AppState;

pub fn submit_frame(
    state: &AppState,
    connection_id: Uuid,
    sender: &mpsc::UnboundedSender<Message>,
    bytes: &[u8],
) {
    let envelope = match decode_request(bytes) {
        Ok(envelope) => envelope,
        Err(error) => {
            warn!(%connection_id, %error, "failed to decode binary frame");
            return;
        }
    };

    if envelope.is_cancellation() {
        state.engine.cancel(&envelope.request_id);
        return;
    }

    if envelope.request_id.is_empty() {
        warn!(%connection_id, "received an envelope without a request id");
        return;
    }

    debug!(
        %connection_id,
        request_id = %envelope.request_id,
        operation = envelope.operation_name(),
        "accepted job submission"
    );

    state
        .connections
        .register(&envelope.request_id, connection_id, sender.clone());

    if let Err(error) = state.engine.submit(envelope) {
        warn!(%connection_id, %error, "failed to enqueue job");
    }
}
