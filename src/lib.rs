//! Tank Arena Server - authoritative multiplayer game server
//!
//! The server accepts player connections over WebSocket, decodes a compact
//! binary protocol, advances a shared tank-arena simulation on a fixed tick
//! and periodically registers itself with a fleet-wide master server for
//! discovery and matchmaking.
//!
//! Module layout:
//! - [`protocol`] - binary wire format and codec
//! - [`net`] - transport sessions and the network manager
//! - [`game`] - world state, simulation and the tick-loop controller
//! - [`master`] - registration records and the heartbeat client
//! - [`store`] - player profile / stats boundary
//! - [`config`], [`http`], [`app`], [`util`] - configuration, HTTP surface
//!   and shared plumbing

pub mod app;
pub mod config;
pub mod game;
pub mod http;
pub mod master;
pub mod net;
pub mod protocol;
pub mod store;
pub mod util;
