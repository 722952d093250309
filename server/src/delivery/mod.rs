//! Message delivery core.
//!
//! The registry maps a client ID to its live connection, the mailbox holds
//! messages for clients that are not connected, and the engine composes the
//! two behind a single lock so connect, disconnect, send and broadcast are
//! each atomic with respect to every other session.

pub mod engine;
pub mod mailbox;
pub mod registry;

use std::borrow::Borrow;
use std::fmt;

pub use engine::{Delivery, DeliveryEngine, EngineOptions};
pub use mailbox::Mailbox;
pub use registry::ConnectionRegistry;

/// Opaque identity of a participant. Case-sensitive, never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(String);

impl ClientId {
    /// Returns `None` for the empty string; any other value is accepted verbatim.
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.is_empty() {
            None
        } else {
            Some(Self(id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ClientId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ClientId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
