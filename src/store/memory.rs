//! In-memory profile store for tests and offline play

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use super::profiles::{
    AuthError, Credentials, PlayerProfile, PlayerStats, ProfileStore, StoreError,
};

struct Account {
    token: String,
    profile: PlayerProfile,
    stats: PlayerStats,
}

/// Profile store holding everything in process memory
#[derive(Default)]
pub struct MemoryProfileStore {
    accounts: Mutex<HashMap<u32, Account>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account accepted by `authenticate`
    pub fn add_account(&self, player_id: u32, token: &str, display_name: &str) {
        self.accounts.lock().insert(
            player_id,
            Account {
                token: token.to_string(),
                profile: PlayerProfile {
                    player_id,
                    account_id: Uuid::new_v4(),
                    display_name: display_name.to_string(),
                    created_at: Utc::now(),
                },
                stats: PlayerStats::default(),
            },
        );
    }

    /// Current persisted stats, if the account exists
    pub fn stats(&self, player_id: u32) -> Option<PlayerStats> {
        self.accounts.lock().get(&player_id).map(|a| a.stats)
    }
}

impl ProfileStore for MemoryProfileStore {
    async fn authenticate(&self, credentials: &Credentials) -> Result<PlayerProfile, AuthError> {
        let accounts = self.accounts.lock();
        match accounts.get(&credentials.player_id) {
            Some(account) if account.token == credentials.token => Ok(account.profile.clone()),
            _ => Err(AuthError::Rejected),
        }
    }

    async fn load_stats(&self, player_id: u32) -> Result<PlayerStats, StoreError> {
        Ok(self
            .accounts
            .lock()
            .get(&player_id)
            .map(|a| a.stats)
            .unwrap_or_default())
    }

    async fn save_stats(&self, player_id: u32, stats: &PlayerStats) -> Result<(), StoreError> {
        if let Some(account) = self.accounts.lock().get_mut(&player_id) {
            account.stats = *stats;
        }
        Ok(())
    }
}
