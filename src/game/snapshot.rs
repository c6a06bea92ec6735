//! Snapshot building
//!
//! Serializes world state for broadcast. Entries are emitted in ascending
//! player-id order so identical world state always yields byte-identical
//! frames, which keeps replays and tests deterministic.

use crate::protocol::{PlayerEntry, StateSnapshot};

use super::world::{Player, World};

/// Build the snapshot for the world's current tick
pub fn build_snapshot(world: &World) -> StateSnapshot {
    let mut players: Vec<PlayerEntry> = world
        .players()
        .filter(|p| p.is_active())
        .map(entry_for)
        .collect();
    players.sort_unstable_by_key(|entry| entry.id);

    StateSnapshot {
        tick: world.tick(),
        players,
    }
}

fn entry_for(player: &Player) -> PlayerEntry {
    PlayerEntry {
        id: player.id,
        x: player.x,
        y: player.y,
        vel_x: player.vel_x,
        vel_y: player.vel_y,
        orientation: player.orientation,
        turret: player.turret,
        health: player.health,
        score: player.score,
        last_sequence: player.last_input_seq,
    }
}
