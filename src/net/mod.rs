//! Network layer: transport sessions and the session manager

pub mod manager;
pub mod session;
pub mod ws;

pub use manager::NetworkManager;
pub use session::{SendError, Session, SessionState};

use std::fmt;

/// Manager-assigned identifier for one transport session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(pub u64);

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// The inbound command queue was closed (server shutting down)
#[derive(Debug, thiserror::Error)]
#[error("inbound command queue closed")]
pub struct InboundClosed;
