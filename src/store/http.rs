//! REST-backed profile store client
//!
//! Talks to the profile service with a server-side API key. Requests carry a
//! short timeout so a slow store rejects a join instead of hanging it.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Serialize;

use crate::config::Config;

use super::profiles::{
    AuthError, Credentials, PlayerProfile, PlayerStats, ProfileStore, StoreError,
};

/// Per-request deadline against the profile service
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct VerifyRequest<'a> {
    player_id: u32,
    token: &'a str,
}

/// Profile service client using the server API key
#[derive(Clone)]
pub struct HttpProfileStore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpProfileStore {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            base_url: config.profile_api_url.trim_end_matches('/').to_string(),
            api_key: config.profile_api_key.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl ProfileStore for HttpProfileStore {
    async fn authenticate(&self, credentials: &Credentials) -> Result<PlayerProfile, AuthError> {
        let response = self
            .client
            .post(self.url("/v1/auth/verify"))
            .timeout(REQUEST_TIMEOUT)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&VerifyRequest {
                player_id: credentials.player_id,
                token: &credentials.token,
            })
            .send()
            .await
            .map_err(StoreError::Request)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AuthError::Rejected);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Store(StoreError::Api {
                status: status.as_u16(),
                body,
            }));
        }
        response
            .json()
            .await
            .map_err(|err| AuthError::Store(StoreError::Parse(err)))
    }

    async fn load_stats(&self, player_id: u32) -> Result<PlayerStats, StoreError> {
        let response = self
            .client
            .get(self.url(&format!("/v1/players/{}/stats", player_id)))
            .timeout(REQUEST_TIMEOUT)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(StoreError::Request)?;

        // A player with no stats row yet is a fresh account
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(PlayerStats::default());
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Api {
                status: status.as_u16(),
                body,
            });
        }

        response.json().await.map_err(StoreError::Parse)
    }

    async fn save_stats(&self, player_id: u32, stats: &PlayerStats) -> Result<(), StoreError> {
        let response = self
            .client
            .put(self.url(&format!("/v1/players/{}/stats", player_id)))
            .timeout(REQUEST_TIMEOUT)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(stats)
            .send()
            .await
            .map_err(StoreError::Request)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}
