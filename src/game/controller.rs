//! Authoritative game controller and tick loop
//!
//! The controller is the only writer of world state. Each tick it drains a
//! bounded batch from the inbound command queue, applies joins, leaves and
//! inputs in queue order, advances the simulation one fixed step and
//! broadcasts the resulting snapshot. Commands arriving after the drain
//! cutoff wait for the next tick; nothing is applied mid-step.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::net::{ConnId, NetworkManager};
use crate::protocol::{InputAction, InputCommand, Message};
use crate::store::{Credentials, PlayerStats, ProfileStore};

use super::snapshot::build_snapshot;
use super::world::{SimulationError, World};
use super::{InboundCommand, LoadMetrics, TankInput};

/// Tick-loop tunables, extracted from [`Config`]
#[derive(Debug, Clone, Copy)]
pub struct ControllerConfig {
    pub tick_interval: Duration,
    pub tick_delta: f32,
    pub max_commands_per_tick: usize,
    pub max_players: usize,
    pub idle_timeout_ticks: u64,
}

impl ControllerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            tick_interval: config.tick_interval(),
            tick_delta: config.tick_delta(),
            max_commands_per_tick: config.max_commands_per_tick,
            max_players: config.max_players,
            idle_timeout_ticks: config.idle_timeout_ticks(),
        }
    }
}

/// Diagnostic counters for dropped protocol input; never fatal
#[derive(Debug, Default)]
pub struct CommandCounters {
    /// Inputs whose sequence was not strictly greater than the last applied
    pub stale_inputs: u64,
    /// Inputs for unknown, joining or leaving players
    pub dropped_unknown: u64,
    /// Inputs carrying non-finite numbers
    pub invalid_inputs: u64,
    /// Joins refused (auth failure, capacity, duplicate identity)
    pub rejected_joins: u64,
    /// Message kinds a client has no business sending
    pub unexpected_messages: u64,
    /// Players removed for idling
    pub evictions: u64,
}

/// The authoritative state machine for the arena
pub struct GameController<P: ProfileStore> {
    world: World,
    cfg: ControllerConfig,
    inbound_rx: mpsc::Receiver<InboundCommand>,
    manager: Arc<NetworkManager>,
    profiles: Arc<P>,
    metrics_tx: watch::Sender<LoadMetrics>,
    shutdown_rx: watch::Receiver<bool>,
    /// Connection -> player binding established by a successful join
    bindings: HashMap<ConnId, u32>,
    counters: CommandCounters,
}

impl<P: ProfileStore> GameController<P> {
    pub fn new(
        world: World,
        cfg: ControllerConfig,
        inbound_rx: mpsc::Receiver<InboundCommand>,
        manager: Arc<NetworkManager>,
        profiles: Arc<P>,
        metrics_tx: watch::Sender<LoadMetrics>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            world,
            cfg,
            inbound_rx,
            manager,
            profiles,
            metrics_tx,
            shutdown_rx,
            bindings: HashMap::new(),
            counters: CommandCounters::default(),
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn counters(&self) -> &CommandCounters {
        &self.counters
    }

    /// Run the fixed-period tick loop until shutdown
    ///
    /// A [`SimulationError`] is a programming defect; it propagates out and
    /// terminates the controller rather than continuing with undefined
    /// state.
    pub async fn run(mut self) -> Result<(), SimulationError> {
        let mut ticker = interval(self.cfg.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            tick_interval_ms = self.cfg.tick_interval.as_millis() as u64,
            max_players = self.cfg.max_players,
            "game controller started"
        );

        loop {
            ticker.tick().await;
            self.tick().await?;

            // The flag is only checked between ticks, so shutdown never
            // interrupts a step and the final snapshot is consistent.
            if *self.shutdown_rx.borrow() {
                info!(tick = self.world.tick(), "controller stopping after current tick");
                break;
            }
        }
        Ok(())
    }

    /// One complete tick: drain, simulate, snapshot, broadcast
    pub async fn tick(&mut self) -> Result<(), SimulationError> {
        self.drain_commands().await;
        self.evict_idle();
        self.flush_departures();

        self.world.step(self.cfg.tick_delta)?;

        let snapshot = build_snapshot(&self.world);
        self.manager.broadcast(&Message::Snapshot(snapshot));

        self.metrics_tx.send_replace(LoadMetrics {
            tick: self.world.tick(),
            current_players: self.world.active_count() as u32,
            capacity: self.cfg.max_players as u32,
        });

        if self.world.tick() % 300 == 0 {
            debug!(
                tick = self.world.tick(),
                players = self.world.active_count(),
                stale = self.counters.stale_inputs,
                unknown = self.counters.dropped_unknown,
                invalid = self.counters.invalid_inputs,
                rejected = self.counters.rejected_joins,
                unexpected = self.counters.unexpected_messages,
                evicted = self.counters.evictions,
                "tick stats"
            );
        }
        Ok(())
    }

    /// Apply queued commands in arrival order, up to the per-tick budget
    async fn drain_commands(&mut self) {
        for _ in 0..self.cfg.max_commands_per_tick {
            let Ok(command) = self.inbound_rx.try_recv() else {
                break;
            };
            self.apply(command).await;
        }
    }

    async fn apply(&mut self, command: InboundCommand) {
        match command.message {
            Message::Join { player_id, token } => {
                self.handle_join(command.conn, player_id, token).await;
            }
            Message::Leave { .. } => self.handle_leave(command.conn),
            Message::Input(input) => self.handle_input(command.conn, input),
            Message::Ping { nonce } => self.handle_ping(command.conn, nonce),
            Message::Snapshot(_) | Message::Pong { .. } => {
                // Server-to-client kinds arriving inbound
                self.counters.unexpected_messages += 1;
            }
        }
    }

    async fn handle_join(&mut self, conn: ConnId, player_id: u32, token: String) {
        if let Some(&bound) = self.bindings.get(&conn) {
            if bound == player_id {
                // Duplicate join from the same connection is idempotent
                debug!(conn = %conn, player = player_id, "ignoring duplicate join");
            } else {
                warn!(conn = %conn, player = player_id, bound, "join for a second identity");
                self.counters.unexpected_messages += 1;
            }
            return;
        }

        if self.world.contains(player_id) {
            // Identity already present on another connection; keep the
            // established session and refuse the newcomer
            warn!(conn = %conn, player = player_id, "rejecting join, id already connected");
            self.counters.rejected_joins += 1;
            self.manager.request_close(conn);
            return;
        }

        if self.world.player_count() >= self.cfg.max_players {
            warn!(conn = %conn, player = player_id, "rejecting join, arena full");
            self.counters.rejected_joins += 1;
            self.manager.request_close(conn);
            return;
        }

        self.world.insert_joining(player_id, conn);

        let credentials = Credentials {
            player_id,
            token,
        };
        match self.profiles.authenticate(&credentials).await {
            Ok(profile) => {
                // A missing stats row is a fresh account, not a failure
                let career = match self.profiles.load_stats(player_id).await {
                    Ok(stats) => stats,
                    Err(err) => {
                        warn!(player = player_id, error = %err, "stats unavailable, starting blank");
                        PlayerStats::default()
                    }
                };
                self.world.promote(player_id, profile.display_name, career);
                self.bindings.insert(conn, player_id);
                info!(
                    conn = %conn,
                    player = player_id,
                    players = self.world.active_count(),
                    "player joined"
                );
            }
            Err(err) => {
                warn!(conn = %conn, player = player_id, error = %err, "join rejected");
                self.world.remove(player_id);
                self.counters.rejected_joins += 1;
                self.manager.request_close(conn);
            }
        }
    }

    /// A Leave command, client-sent or synthesized on disconnect
    ///
    /// The affected player comes from the connection binding; the id claimed
    /// inside the frame is untrusted and ignored.
    fn handle_leave(&mut self, conn: ConnId) {
        let Some(player_id) = self.bindings.get(&conn).copied() else {
            // Session closed before it ever joined; nothing to do
            return;
        };
        self.world.mark_leaving(player_id);
        info!(conn = %conn, player = player_id, "player leaving");
    }

    fn handle_input(&mut self, conn: ConnId, input: InputCommand) {
        let tick = self.world.tick();
        let Some(&player_id) = self.bindings.get(&conn) else {
            // Player already departed or never joined; expected under
            // concurrent disconnect, dropped silently
            self.counters.dropped_unknown += 1;
            return;
        };
        let Some(player) = self.world.get_mut(player_id) else {
            self.counters.dropped_unknown += 1;
            return;
        };
        if !player.is_active() {
            self.counters.dropped_unknown += 1;
            return;
        }

        // Replay/duplication guard: sequences must strictly increase
        if input.sequence <= player.last_input_seq {
            self.counters.stale_inputs += 1;
            return;
        }

        match input.action {
            InputAction::Move {
                throttle,
                steer,
                turret,
            } => {
                if !(throttle.is_finite() && steer.is_finite() && turret.is_finite()) {
                    self.counters.invalid_inputs += 1;
                    return;
                }
                player.last_input_seq = input.sequence;
                player.input = TankInput {
                    throttle: throttle.clamp(-1.0, 1.0),
                    steer: steer.clamp(-1.0, 1.0),
                    turret,
                };
                player.last_activity_tick = tick;
            }
            InputAction::Fire { turret } => {
                if !turret.is_finite() {
                    self.counters.invalid_inputs += 1;
                    return;
                }
                player.last_input_seq = input.sequence;
                player.input.turret = turret;
                player.fire_requested = true;
                player.last_activity_tick = tick;
            }
        }
    }

    fn handle_ping(&mut self, conn: ConnId, nonce: u64) {
        if let Some(&player_id) = self.bindings.get(&conn) {
            let tick = self.world.tick();
            if let Some(player) = self.world.get_mut(player_id) {
                player.last_activity_tick = tick;
            }
        }
        self.manager.send_to(conn, Message::Pong { nonce });
    }

    /// Mark players silent for too long as leaving
    fn evict_idle(&mut self) {
        let tick = self.world.tick();
        let timeout = self.cfg.idle_timeout_ticks;
        let idle: Vec<(u32, ConnId)> = self
            .world
            .players()
            .filter(|p| p.is_active() && tick.saturating_sub(p.last_activity_tick) > timeout)
            .map(|p| (p.id, p.conn))
            .collect();

        for (player_id, conn) in idle {
            warn!(player = player_id, conn = %conn, "evicting idle player");
            self.world.mark_leaving(player_id);
            self.counters.evictions += 1;
            self.manager.request_close(conn);
        }
    }

    /// Remove leaving players, persist their stats and drop the session
    fn flush_departures(&mut self) {
        for player in self.world.take_leaving() {
            self.bindings.remove(&player.conn);
            self.manager.request_close(player.conn);

            let stats = PlayerStats {
                kills: player.career.kills + player.kills,
                deaths: player.career.deaths + player.deaths,
            };
            let store = self.profiles.clone();
            let player_id = player.id;
            // Persisting must never stall the tick; failures only lose the
            // session delta
            tokio::spawn(async move {
                if let Err(err) = store.save_stats(player_id, &stats).await {
                    warn!(player = player_id, error = %err, "failed to save stats");
                }
            });
            info!(player = player.id, "player removed from world");
        }
    }
}
