//! Player profile and stats boundary
//!
//! Authentication and persistent stats live in an external profile service.
//! The game only depends on the [`ProfileStore`] trait; production wires the
//! HTTP-backed implementation, tests and local play use the in-memory one.

pub mod http;
pub mod memory;
pub mod profiles;

pub use http::HttpProfileStore;
pub use memory::MemoryProfileStore;
pub use profiles::{AuthError, Credentials, PlayerProfile, PlayerStats, ProfileStore, StoreError};
