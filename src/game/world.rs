//! Authoritative world state and the fixed simulation step
//!
//! The world is owned by the game controller's task and mutated only from
//! its tick function. Everything else sees world state through snapshots.

use std::collections::HashMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::net::ConnId;
use crate::store::PlayerStats;

use super::combat::{CombatSystem, WeaponStats};
use super::physics::{PhysicsSystem, TankStats};
use super::TankInput;

/// Player lifecycle inside the world
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerPhase {
    /// Join received, profile lookup pending
    Joining,
    /// Participating in the simulation
    Active,
    /// Departing; removed at the next tick boundary
    Leaving,
}

/// Authoritative per-player state
#[derive(Debug, Clone)]
pub struct Player {
    pub id: u32,
    pub conn: ConnId,
    pub phase: PlayerPhase,
    pub display_name: String,

    // Position and movement
    pub x: f32,
    pub y: f32,
    pub orientation: f32,
    pub turret: f32,
    pub vel_x: f32,
    pub vel_y: f32,

    // Combat
    pub health: f32,
    pub score: i32,
    pub kills: u32,
    pub deaths: u32,
    pub cooldown_ticks: u32,
    pub fire_requested: bool,

    // Input tracking
    pub last_input_seq: u32,
    pub input: TankInput,
    pub last_activity_tick: u64,

    /// Persisted career stats loaded at join; session kills/deaths are added
    /// on top when saving
    pub career: PlayerStats,
}

impl Player {
    fn joining(id: u32, conn: ConnId, tick: u64) -> Self {
        Self {
            id,
            conn,
            phase: PlayerPhase::Joining,
            display_name: String::new(),
            x: 0.0,
            y: 0.0,
            orientation: 0.0,
            turret: 0.0,
            vel_x: 0.0,
            vel_y: 0.0,
            health: 0.0,
            score: 0,
            kills: 0,
            deaths: 0,
            cooldown_ticks: 0,
            fire_requested: false,
            last_input_seq: 0,
            input: TankInput::default(),
            last_activity_tick: tick,
            career: PlayerStats::default(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.phase == PlayerPhase::Active
    }
}

/// Static arena data, read-only once loaded
#[derive(Debug, Clone, Copy)]
pub struct ArenaData {
    pub width: f32,
    pub height: f32,
    /// Distance kept between spawn points and the walls
    pub spawn_margin: f32,
}

impl Default for ArenaData {
    fn default() -> Self {
        Self {
            width: 2000.0,
            height: 2000.0,
            spawn_margin: 100.0,
        }
    }
}

/// Fatal simulation faults; these indicate a defect, not bad input
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("non-positive tick delta {0}")]
    NonPositiveDelta(f32),

    #[error("tick counter overflow at {0}")]
    TickOverflow(u64),

    #[error("player {0} state is not finite")]
    CorruptState(u32),
}

/// The world: every player keyed by id plus the tick counter
pub struct World {
    tick: u64,
    players: HashMap<u32, Player>,
    arena: ArenaData,
    tank: TankStats,
    weapon: WeaponStats,
    rng: ChaCha8Rng,
}

impl World {
    pub fn new(seed: u64, arena: ArenaData) -> Self {
        Self {
            tick: 0,
            players: HashMap::new(),
            arena,
            tank: TankStats::standard(),
            weapon: WeaponStats::standard(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Current tick; increments exactly once per [`World::step`]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn arena(&self) -> &ArenaData {
        &self.arena
    }

    pub fn tank_stats(&self) -> &TankStats {
        &self.tank
    }

    pub fn contains(&self, id: u32) -> bool {
        self.players.contains_key(&id)
    }

    pub fn get(&self, id: u32) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn active_count(&self) -> usize {
        self.players.values().filter(|p| p.is_active()).count()
    }

    /// Insert a player awaiting authentication
    pub fn insert_joining(&mut self, id: u32, conn: ConnId) {
        self.players.insert(id, Player::joining(id, conn, self.tick));
    }

    /// Promote a joining player to active at a fresh spawn point
    pub fn promote(&mut self, id: u32, display_name: String, career: PlayerStats) {
        let (x, y, orientation) = self.spawn_position();
        let max_health = self.tank.max_health;
        if let Some(player) = self.players.get_mut(&id) {
            player.phase = PlayerPhase::Active;
            player.display_name = display_name;
            player.career = career;
            player.x = x;
            player.y = y;
            player.orientation = orientation;
            player.health = max_health;
            info!(player = id, x, y, "player active");
        }
    }

    pub fn mark_leaving(&mut self, id: u32) {
        if let Some(player) = self.players.get_mut(&id) {
            player.phase = PlayerPhase::Leaving;
        }
    }

    pub fn remove(&mut self, id: u32) -> Option<Player> {
        self.players.remove(&id)
    }

    /// Remove and return every player marked Leaving
    pub fn take_leaving(&mut self) -> Vec<Player> {
        let ids: Vec<u32> = self
            .players
            .values()
            .filter(|p| p.phase == PlayerPhase::Leaving)
            .map(|p| p.id)
            .collect();
        ids.into_iter()
            .filter_map(|id| self.players.remove(&id))
            .collect()
    }

    /// Generate a spawn position inside the arena
    pub fn spawn_position(&mut self) -> (f32, f32, f32) {
        let margin = self.arena.spawn_margin;
        let x = self.rng.gen_range(margin..self.arena.width - margin);
        let y = self.rng.gen_range(margin..self.arena.height - margin);
        let orientation = self.rng.gen_range(0.0..std::f32::consts::TAU);
        (x, y, orientation)
    }

    /// Advance the simulation by one fixed step
    ///
    /// Only commands already applied to player input state influence this
    /// step; the tick counter increments exactly once on success.
    pub fn step(&mut self, dt: f32) -> Result<(), SimulationError> {
        if !(dt > 0.0) || !dt.is_finite() {
            return Err(SimulationError::NonPositiveDelta(dt));
        }

        // Stable processing order keeps the step deterministic
        let mut ids: Vec<u32> = self
            .players
            .values()
            .filter(|p| p.is_active())
            .map(|p| p.id)
            .collect();
        ids.sort_unstable();

        self.update_movement(&ids, dt)?;
        self.resolve_collisions(&ids);
        self.resolve_fire(&ids);

        self.tick = self
            .tick
            .checked_add(1)
            .ok_or(SimulationError::TickOverflow(self.tick))?;
        Ok(())
    }

    fn update_movement(&mut self, ids: &[u32], dt: f32) -> Result<(), SimulationError> {
        let stats = self.tank;
        let arena = self.arena;
        for &id in ids {
            let Some(player) = self.players.get_mut(&id) else {
                continue;
            };

            let (x, y, orientation, vel_x, vel_y) = PhysicsSystem::update_tank(
                player.x,
                player.y,
                player.orientation,
                player.vel_x,
                player.vel_y,
                player.input.throttle,
                player.input.steer,
                &stats,
                dt,
            );

            player.x = x.clamp(stats.hitbox_radius, arena.width - stats.hitbox_radius);
            player.y = y.clamp(stats.hitbox_radius, arena.height - stats.hitbox_radius);
            player.orientation = orientation;
            player.turret = player.input.turret;
            player.vel_x = vel_x;
            player.vel_y = vel_y;
            player.cooldown_ticks = player.cooldown_ticks.saturating_sub(1);

            if !(player.x.is_finite()
                && player.y.is_finite()
                && player.vel_x.is_finite()
                && player.vel_y.is_finite()
                && player.health.is_finite())
            {
                return Err(SimulationError::CorruptState(id));
            }
        }
        Ok(())
    }

    fn resolve_collisions(&mut self, ids: &[u32]) {
        let radius = self.tank.hitbox_radius;
        let arena = self.arena;
        for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                let (Some(p1), Some(p2)) = (self.players.get(&ids[i]), self.players.get(&ids[j]))
                else {
                    continue;
                };
                if !PhysicsSystem::check_tank_collision(p1.x, p1.y, radius, p2.x, p2.y, radius) {
                    continue;
                }
                let ((x1, y1), (x2, y2)) =
                    PhysicsSystem::resolve_tank_collision(p1.x, p1.y, radius, p2.x, p2.y, radius);
                if let Some(p1) = self.players.get_mut(&ids[i]) {
                    p1.x = x1.clamp(radius, arena.width - radius);
                    p1.y = y1.clamp(radius, arena.height - radius);
                }
                if let Some(p2) = self.players.get_mut(&ids[j]) {
                    p2.x = x2.clamp(radius, arena.width - radius);
                    p2.y = y2.clamp(radius, arena.height - radius);
                }
            }
        }
    }

    fn resolve_fire(&mut self, ids: &[u32]) {
        let weapon = self.weapon;
        let radius = self.tank.hitbox_radius;
        let max_health = self.tank.max_health;

        for &shooter_id in ids {
            let Some(shooter) = self.players.get(&shooter_id) else {
                continue;
            };
            let wants_fire =
                shooter.fire_requested && CombatSystem::can_fire(shooter.cooldown_ticks);
            let (ox, oy, angle) = (shooter.x, shooter.y, shooter.turret);
            if !wants_fire {
                if let Some(shooter) = self.players.get_mut(&shooter_id) {
                    shooter.fire_requested = false;
                }
                continue;
            }

            // Closest hit wins; sorted iteration makes ties deterministic
            let mut best: Option<(u32, f32)> = None;
            for &target_id in ids {
                if target_id == shooter_id {
                    continue;
                }
                let Some(target) = self.players.get(&target_id) else {
                    continue;
                };
                if let Some(dist) = CombatSystem::ray_hit_distance(
                    ox,
                    oy,
                    angle,
                    weapon.range,
                    target.x,
                    target.y,
                    radius,
                ) {
                    if best.map_or(true, |(_, d)| dist < d) {
                        best = Some((target_id, dist));
                    }
                }
            }

            if let Some((target_id, dist)) = best {
                let mut killed = false;
                if let Some(target) = self.players.get_mut(&target_id) {
                    let (health, was_killed) =
                        CombatSystem::apply_damage(target.health, weapon.damage);
                    target.health = health;
                    killed = was_killed;
                }
                debug!(shooter = shooter_id, target = target_id, dist, killed, "shot hit");

                if killed {
                    let (x, y, orientation) = self.spawn_position();
                    if let Some(target) = self.players.get_mut(&target_id) {
                        target.deaths += 1;
                        target.health = max_health;
                        target.x = x;
                        target.y = y;
                        target.orientation = orientation;
                        target.vel_x = 0.0;
                        target.vel_y = 0.0;
                    }
                    if let Some(shooter) = self.players.get_mut(&shooter_id) {
                        shooter.kills += 1;
                        shooter.score += 1;
                    }
                }
            }

            if let Some(shooter) = self.players.get_mut(&shooter_id) {
                shooter.fire_requested = false;
                shooter.cooldown_ticks = weapon.cooldown_ticks;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::TankInput;

    fn active_world(ids: &[u32]) -> World {
        let mut world = World::new(7, ArenaData::default());
        for (i, &id) in ids.iter().enumerate() {
            world.insert_joining(id, ConnId(i as u64 + 1));
            world.promote(id, format!("tank-{id}"), PlayerStats::default());
        }
        world
    }

    #[test]
    fn promote_spawns_inside_the_arena() {
        let world = active_world(&[1, 2, 3]);
        let arena = *world.arena();
        for player in world.players() {
            assert!(player.is_active());
            assert!(player.x > 0.0 && player.x < arena.width);
            assert!(player.y > 0.0 && player.y < arena.height);
            assert_eq!(player.health, world.tank_stats().max_health);
        }
    }

    #[test]
    fn tick_increments_exactly_once_per_step() {
        let mut world = active_world(&[1]);
        for expected in 1..=100u64 {
            world.step(1.0 / 30.0).unwrap();
            assert_eq!(world.tick(), expected);
        }
    }

    #[test]
    fn non_positive_delta_is_fatal() {
        let mut world = active_world(&[1]);
        assert!(matches!(
            world.step(0.0),
            Err(SimulationError::NonPositiveDelta(_))
        ));
        assert!(matches!(
            world.step(-0.5),
            Err(SimulationError::NonPositiveDelta(_))
        ));
        // The failed steps must not have advanced the tick
        assert_eq!(world.tick(), 0);
    }

    #[test]
    fn identical_worlds_step_identically() {
        let build = || {
            let mut world = active_world(&[1, 2]);
            world.get_mut(1).unwrap().input = TankInput {
                throttle: 1.0,
                steer: 0.25,
                turret: 0.0,
            };
            world
        };
        let mut a = build();
        let mut b = build();
        for _ in 0..50 {
            a.step(1.0 / 30.0).unwrap();
            b.step(1.0 / 30.0).unwrap();
        }
        let pa = a.get(1).unwrap();
        let pb = b.get(1).unwrap();
        assert_eq!(pa.x.to_bits(), pb.x.to_bits());
        assert_eq!(pa.y.to_bits(), pb.y.to_bits());
        assert_eq!(pa.orientation.to_bits(), pb.orientation.to_bits());
    }

    #[test]
    fn point_blank_shots_kill_and_respawn() {
        let mut world = active_world(&[1, 2]);
        // Park the victim right in front of the shooter's turret
        {
            let shooter = world.get_mut(1).unwrap();
            shooter.x = 500.0;
            shooter.y = 500.0;
            shooter.turret = 0.0;
            shooter.input.turret = 0.0;
        }
        {
            let victim = world.get_mut(2).unwrap();
            victim.x = 560.0;
            victim.y = 500.0;
        }

        let shots_to_kill = 4; // 100 health / 25 damage
        for _ in 0..shots_to_kill {
            // Re-park both tanks; respawn and drift would move them
            {
                let shooter = world.get_mut(1).unwrap();
                shooter.x = 500.0;
                shooter.y = 500.0;
                shooter.fire_requested = true;
                shooter.cooldown_ticks = 0;
            }
            {
                let victim = world.get_mut(2).unwrap();
                victim.x = 560.0;
                victim.y = 500.0;
            }
            world.step(1.0 / 30.0).unwrap();
        }

        let shooter = world.get(1).unwrap();
        assert_eq!(shooter.kills, 1);
        assert_eq!(shooter.score, 1);

        let victim = world.get(2).unwrap();
        assert_eq!(victim.deaths, 1);
        assert_eq!(victim.health, world.tank_stats().max_health);
    }

    #[test]
    fn fire_request_is_consumed_even_on_cooldown() {
        let mut world = active_world(&[1]);
        {
            let player = world.get_mut(1).unwrap();
            player.cooldown_ticks = 10;
            player.fire_requested = true;
        }
        world.step(1.0 / 30.0).unwrap();
        assert!(!world.get(1).unwrap().fire_requested);
    }

    #[test]
    fn take_leaving_removes_only_marked_players() {
        let mut world = active_world(&[1, 2, 3]);
        world.mark_leaving(2);
        let gone = world.take_leaving();
        assert_eq!(gone.len(), 1);
        assert_eq!(gone[0].id, 2);
        assert!(world.contains(1));
        assert!(!world.contains(2));
        assert!(world.contains(3));
    }

    #[test]
    fn movement_is_clamped_to_arena_bounds() {
        let mut world = active_world(&[1]);
        let hitbox_radius = world.tank_stats().hitbox_radius;
        {
            let player = world.get_mut(1).unwrap();
            player.x = hitbox_radius + 1.0;
            player.orientation = std::f32::consts::PI; // facing the wall
            player.input = TankInput {
                throttle: 1.0,
                steer: 0.0,
                turret: 0.0,
            };
        }
        for _ in 0..300 {
            world.step(1.0 / 30.0).unwrap();
        }
        let player = world.get(1).unwrap();
        assert!(player.x >= world.tank_stats().hitbox_radius);
    }
}
