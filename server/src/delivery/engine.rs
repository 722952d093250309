//! Connect, disconnect, send and broadcast semantics.
//!
//! Registry and mailbox share one mutex. Each public operation holds it for its
//! whole duration, so a connect racing a send either sees the message in the
//! mailbox (and drains it) or registers first (and the send goes live). All
//! transmissions are non-blocking channel pushes, so the lock is never held
//! across an await point.

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{ClientId, ConnectionRegistry, Mailbox};
use crate::ws::protocol::{departure_notice, routed_message};
use crate::ws::{Connection, ConnectionId, CLOSE_SUPERSEDED};

/// Outcome of a single [`DeliveryEngine::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Pushed to the recipient's live connection.
    Delivered,
    /// Recipient offline; stored in its mailbox.
    Queued,
    /// Recipient was registered but its connection had already failed.
    Dropped,
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Per-recipient mailbox bound. `None` keeps mailboxes unbounded.
    pub mailbox_capacity: Option<NonZeroUsize>,
    /// Send a Close frame to a connection replaced by a newer one for the same client.
    /// Off by default: the superseded connection is dropped from the registry without a close.
    pub close_superseded: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            mailbox_capacity: None,
            close_superseded: false,
        }
    }
}

#[derive(Debug)]
struct EngineState {
    registry: ConnectionRegistry,
    mailbox: Mailbox,
}

#[derive(Debug)]
pub struct DeliveryEngine {
    state: Mutex<EngineState>,
    close_superseded: bool,
}

impl Default for DeliveryEngine {
    fn default() -> Self {
        Self::new(EngineOptions::default())
    }
}

impl DeliveryEngine {
    pub fn new(options: EngineOptions) -> Self {
        Self {
            state: Mutex::new(EngineState {
                registry: ConnectionRegistry::new(),
                mailbox: Mailbox::with_capacity_limit(options.mailbox_capacity),
            }),
            close_superseded: options.close_superseded,
        }
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        // Every critical section leaves the maps consistent, so a poisoned lock is still usable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `connection` for `client_id` and flush its mailbox over it.
    ///
    /// Returns the number of pending messages delivered. If a transmission fails
    /// mid-drain the remaining messages are lost, not re-queued.
    pub fn on_connect(&self, client_id: ClientId, connection: Connection) -> usize {
        let mut guard = self.lock();
        let EngineState { registry, mailbox } = &mut *guard;

        if let Some(previous) = registry.register(client_id.clone(), connection.clone()) {
            if previous.id() != connection.id() {
                tracing::info!(
                    client_id = %client_id,
                    superseded = %previous.id(),
                    "Client reconnected, replacing previous connection"
                );
                if self.close_superseded {
                    let _ = previous.close(CLOSE_SUPERSEDED, "Superseded by a newer connection");
                }
            }
        }

        let pending = mailbox.drain(client_id.as_str());
        let total = pending.len();
        let mut delivered = 0;
        for message in &pending {
            if connection.send_text(message).is_err() {
                tracing::warn!(
                    client_id = %client_id,
                    lost = total - delivered,
                    "Connection failed while flushing mailbox"
                );
                break;
            }
            delivered += 1;
        }

        if total > 0 {
            tracing::info!(
                client_id = %client_id,
                delivered = delivered,
                "Flushed offline messages"
            );
        }
        delivered
    }

    /// Unregister `client_id` and tell every remaining client it left.
    ///
    /// Returns the number of clients that received the departure notice.
    pub fn on_disconnect(&self, client_id: &str) -> usize {
        let mut guard = self.lock();
        guard.registry.unregister(client_id);
        let notified = broadcast_locked(&guard.registry, &departure_notice(client_id));
        tracing::info!(
            client_id = %client_id,
            notified = notified,
            "Client disconnected"
        );
        notified
    }

    /// Session teardown for one specific connection.
    ///
    /// Behaves like [`on_disconnect`](Self::on_disconnect) when `connection_id` is
    /// still the registered connection for `client_id`. A session that was
    /// superseded by a newer connection leaves the registry untouched and sends
    /// no departure notice. Returns whether the client was unregistered.
    pub fn on_session_closed(&self, client_id: &str, connection_id: ConnectionId) -> bool {
        let mut guard = self.lock();
        if !guard.registry.unregister_if(client_id, connection_id) {
            tracing::debug!(
                client_id = %client_id,
                connection = %connection_id,
                "Superseded session closed"
            );
            return false;
        }
        let notified = broadcast_locked(&guard.registry, &departure_notice(client_id));
        tracing::info!(
            client_id = %client_id,
            notified = notified,
            "Client disconnected"
        );
        true
    }

    /// Route `body` from `from` to `to`: live if connected, mailbox otherwise.
    pub fn send(&self, from: &ClientId, to: &ClientId, body: &str) -> Delivery {
        let message = routed_message(from, body);
        let mut guard = self.lock();
        let EngineState { registry, mailbox } = &mut *guard;

        match registry.lookup(to.as_str()) {
            Some(connection) => match connection.send_text(&message) {
                Ok(()) => Delivery::Delivered,
                Err(e) => {
                    tracing::debug!(to = %to, error = %e, "Live send failed");
                    Delivery::Dropped
                }
            },
            None => {
                if let Some(evicted) = mailbox.enqueue(to.clone(), message) {
                    tracing::warn!(
                        to = %to,
                        evicted_len = evicted.len(),
                        "Mailbox full, evicted oldest pending message"
                    );
                }
                Delivery::Queued
            }
        }
    }

    /// Send `text` to every connected client. One failing connection does not
    /// stop delivery to the rest. Returns the number of successful sends.
    pub fn broadcast(&self, text: &str) -> usize {
        let guard = self.lock();
        broadcast_locked(&guard.registry, text)
    }

    pub fn is_online(&self, client_id: &str) -> bool {
        self.lock().registry.contains(client_id)
    }

    pub fn pending_for(&self, client_id: &str) -> usize {
        self.lock().mailbox.pending(client_id)
    }

    pub fn has_mailbox(&self, client_id: &str) -> bool {
        self.lock().mailbox.contains(client_id)
    }

    pub fn online_count(&self) -> usize {
        self.lock().registry.len()
    }
}

fn broadcast_locked(registry: &ConnectionRegistry, text: &str) -> usize {
    let mut sent = 0;
    registry.for_each(|client_id, connection| {
        if let Err(e) = connection.send_text(text) {
            tracing::debug!(client_id = %client_id, error = %e, "Broadcast send failed");
        } else {
            sent += 1;
        }
    });
    sent
}
