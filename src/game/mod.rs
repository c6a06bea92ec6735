//! Game simulation modules

pub mod combat;
pub mod controller;
pub mod physics;
pub mod snapshot;
pub mod world;

pub use controller::GameController;
pub use world::{ArenaData, Player, PlayerPhase, World};

use crate::net::ConnId;
use crate::protocol::Message;

/// One entry on the inbound command queue
///
/// Arrival order is queue order; the controller never reorders commands that
/// are already queued.
#[derive(Debug, Clone)]
pub struct InboundCommand {
    pub conn: ConnId,
    pub message: Message,
}

/// Input state applied to a tank on the next simulation step
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TankInput {
    pub throttle: f32,
    pub steer: f32,
    pub turret: f32,
}

/// Read-only load snapshot published by the controller each tick
///
/// Consumers (heartbeat, health endpoint) get a copy, never a reference into
/// simulation state.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadMetrics {
    pub tick: u64,
    pub current_players: u32,
    pub capacity: u32,
}
