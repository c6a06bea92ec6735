//! Profile store trait and shared types

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Join credentials presented by a client
#[derive(Debug, Clone)]
pub struct Credentials {
    pub player_id: u32,
    pub token: String,
}

/// Profile returned by a successful authentication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub player_id: u32,
    pub account_id: Uuid,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

/// Persistent career stats
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub kills: u32,
    pub deaths: u32,
}

/// Store transport/API errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Parse(reqwest::Error),
}

/// Authentication outcomes that reject a join
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("credentials rejected")]
    Rejected,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// External profile service boundary
///
/// `authenticate` gates every join; `load_stats`/`save_stats` carry career
/// totals across sessions. Implementations must be cheap to clone behind an
/// `Arc` and safe to call from spawned tasks.
pub trait ProfileStore: Send + Sync + 'static {
    fn authenticate(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<PlayerProfile, AuthError>> + Send;

    fn load_stats(
        &self,
        player_id: u32,
    ) -> impl Future<Output = Result<PlayerStats, StoreError>> + Send;

    fn save_stats(
        &self,
        player_id: u32,
        stats: &PlayerStats,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}
