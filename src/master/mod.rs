//! Master server registration
//!
//! The fleet master tracks every live game server for discovery and
//! matchmaking. Each server owns exactly one registration record and
//! re-sends the full record on every heartbeat; the master treats it as an
//! idempotent upsert keyed by the server id.

pub mod heartbeat;

use std::future::Future;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use uuid::Uuid;

pub use heartbeat::HeartbeatClient;

/// Full description of this server instance, as the master sees it
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationRecord {
    pub server_id: Uuid,
    pub public_addr: String,
    pub port: u16,
    pub current_players: u32,
    pub capacity: u32,
    pub healthy: bool,
    pub sent_at: DateTime<Utc>,
}

/// Master call failures; always retried, never fatal
#[derive(Debug, thiserror::Error)]
pub enum MasterError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },
}

/// Remote boundary to the master server
pub trait MasterClient: Send + Sync + 'static {
    fn register(
        &self,
        record: &RegistrationRecord,
    ) -> impl Future<Output = Result<(), MasterError>> + Send;
}

/// Per-request deadline against the master
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// HTTP implementation of the master boundary
#[derive(Clone)]
pub struct HttpMasterClient {
    client: Client,
    base_url: String,
}

impl HttpMasterClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl MasterClient for HttpMasterClient {
    async fn register(&self, record: &RegistrationRecord) -> Result<(), MasterError> {
        // PUT keyed by server id makes the registration an upsert
        let url = format!("{}/v1/servers/{}", self.base_url, record.server_id);

        let response = self
            .client
            .put(&url)
            .timeout(REQUEST_TIMEOUT)
            .header("Content-Type", "application/json")
            .json(record)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MasterError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}
