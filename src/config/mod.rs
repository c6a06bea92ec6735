//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origin for CORS
    pub client_origin: String,

    /// Public address advertised to the master server
    pub public_addr: String,
    /// Master server base URL
    pub master_url: String,
    /// Seconds between master heartbeats
    pub heartbeat_interval_secs: u64,
    /// Upper bound for the heartbeat retry backoff
    pub heartbeat_backoff_cap_secs: u64,

    /// Profile service base URL
    pub profile_api_url: String,
    /// Profile service API key (server-side secret)
    pub profile_api_key: String,

    /// Maximum players participating in the simulation
    pub max_players: usize,
    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Capacity of the single inbound command queue
    pub inbound_queue_capacity: usize,
    /// Commands drained from the inbound queue per tick
    pub max_commands_per_tick: usize,
    /// Per-session outbound message buffer
    pub session_buffer: usize,
    /// Maximum concurrent sessions (players plus pending handshakes)
    pub max_sessions: usize,
    /// Malformed frames tolerated before a session is closed
    pub malformed_frame_limit: u32,
    /// Largest accepted wire frame
    pub max_frame_bytes: usize,
    /// Seconds of player silence before eviction
    pub idle_timeout_secs: u64,
    /// Grace period for draining session writes at shutdown
    pub shutdown_grace_ms: u64,
    /// Seed for deterministic spawn points (random when unset)
    pub arena_seed: Option<u64>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let config = Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            client_origin: env::var("CLIENT_ORIGIN").unwrap_or_else(|_| "*".to_string()),

            public_addr: env::var("PUBLIC_ADDR")
                .map_err(|_| ConfigError::Missing("PUBLIC_ADDR"))?,
            master_url: env::var("MASTER_URL").map_err(|_| ConfigError::Missing("MASTER_URL"))?,
            heartbeat_interval_secs: parse_or("HEARTBEAT_INTERVAL_SECS", 10)?,
            heartbeat_backoff_cap_secs: parse_or("HEARTBEAT_BACKOFF_CAP_SECS", 120)?,

            profile_api_url: env::var("PROFILE_API_URL")
                .map_err(|_| ConfigError::Missing("PROFILE_API_URL"))?,
            profile_api_key: env::var("PROFILE_API_KEY")
                .map_err(|_| ConfigError::Missing("PROFILE_API_KEY"))?,

            max_players: parse_or("MAX_PLAYERS", 32)?,
            tick_rate: parse_or("TICK_RATE", 30)?,
            inbound_queue_capacity: parse_or("INBOUND_QUEUE_CAPACITY", 1024)?,
            max_commands_per_tick: parse_or("MAX_COMMANDS_PER_TICK", 256)?,
            session_buffer: parse_or("SESSION_BUFFER", 64)?,
            max_sessions: parse_or("MAX_SESSIONS", 64)?,
            malformed_frame_limit: parse_or("MALFORMED_FRAME_LIMIT", 8)?,
            max_frame_bytes: parse_or("MAX_FRAME_BYTES", 64 * 1024)?,
            idle_timeout_secs: parse_or("IDLE_TIMEOUT_SECS", 30)?,
            shutdown_grace_ms: parse_or("SHUTDOWN_GRACE_MS", 3000)?,
            arena_seed: parse_optional("ARENA_SEED")?,
        };

        config.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.tick_rate == 0 {
            return Err(ConfigError::Invalid("TICK_RATE"));
        }
        if self.max_players == 0 {
            return Err(ConfigError::Invalid("MAX_PLAYERS"));
        }
        if self.inbound_queue_capacity == 0 {
            return Err(ConfigError::Invalid("INBOUND_QUEUE_CAPACITY"));
        }
        if self.session_buffer == 0 {
            return Err(ConfigError::Invalid("SESSION_BUFFER"));
        }
        Ok(self)
    }

    /// Duration of one simulation tick
    pub fn tick_interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.tick_rate as u64)
    }

    /// Fixed simulation step in seconds
    pub fn tick_delta(&self) -> f32 {
        1.0 / self.tick_rate as f32
    }

    /// Player silence threshold expressed in ticks
    pub fn idle_timeout_ticks(&self) -> u64 {
        self.idle_timeout_secs * self.tick_rate as u64
    }

    /// Port advertised in master registration records
    pub fn public_port(&self) -> u16 {
        self.server_addr.port()
    }
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

fn parse_optional<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.parse().map(Some).map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(None),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
