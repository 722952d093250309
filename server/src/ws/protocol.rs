//! Text frame protocol.
//!
//! Inbound:  `recipient_id:message_body` (first `:` splits, the body may contain more).
//! Outbound: routed messages, departure notices and the malformed-frame error.

use crate::delivery::{ClientId, Delivery, DeliveryEngine};
use crate::ws::Connection;

/// Reply sent to the sender when a frame has no recipient delimiter.
pub const MALFORMED_FRAME_ERROR: &str = "Error: Message format should be 'recipient_id:message'";

/// A parsed inbound frame addressed to one recipient.
#[derive(Debug, PartialEq, Eq)]
pub struct RoutedFrame<'a> {
    pub recipient: ClientId,
    pub body: &'a str,
}

/// Split a frame on its first `:`. Returns `None` when there is no delimiter
/// or the recipient part is empty.
pub fn parse_frame(text: &str) -> Option<RoutedFrame<'_>> {
    let (recipient, body) = text.split_once(':')?;
    Some(RoutedFrame {
        recipient: ClientId::new(recipient)?,
        body,
    })
}

pub fn routed_message(sender: &ClientId, body: &str) -> String {
    format!("Message from {}: {}", sender, body)
}

pub fn departure_notice(client_id: &str) -> String {
    format!("Client {} has left the chat", client_id)
}

/// Handle one inbound text frame from `client_id`.
///
/// Well-formed frames go to the delivery engine; anything else is answered with
/// [`MALFORMED_FRAME_ERROR`] on the sender's own connection.
pub fn handle_text_message(
    text: &str,
    connection: &Connection,
    engine: &DeliveryEngine,
    client_id: &ClientId,
) {
    let Some(frame) = parse_frame(text) else {
        tracing::debug!(
            client_id = %client_id,
            "Malformed frame: {}",
            text.chars().take(100).collect::<String>()
        );
        send_error(connection, client_id);
        return;
    };

    let outcome = engine.send(client_id, &frame.recipient, frame.body);
    tracing::debug!(
        from = %client_id,
        to = %frame.recipient,
        outcome = ?outcome,
        "Routed message"
    );
    if outcome == Delivery::Dropped {
        tracing::warn!(
            from = %client_id,
            to = %frame.recipient,
            "Recipient connection failed during send, message lost"
        );
    }
}

fn send_error(connection: &Connection, client_id: &ClientId) {
    if connection.send_text(MALFORMED_FRAME_ERROR).is_err() {
        tracing::debug!(client_id = %client_id, "Could not deliver format error, connection closing");
    }
}
