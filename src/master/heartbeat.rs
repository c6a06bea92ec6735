//! Periodic registration heartbeat with capped exponential backoff
//!
//! Runs on its own task, reads a copied load snapshot and never touches
//! simulation state. Heartbeat failures only delay the next attempt; the
//! server keeps serving connected players while it is undiscoverable.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::game::LoadMetrics;

use super::{MasterClient, RegistrationRecord};

/// Delay before the next registration attempt
///
/// Doubles per consecutive failure, so each retry waits strictly longer than
/// the previous one until the cap is reached.
pub fn backoff_delay(base: Duration, consecutive_failures: u32, cap: Duration) -> Duration {
    if consecutive_failures == 0 {
        return base;
    }
    let factor = 1u32.checked_shl(consecutive_failures.min(16)).unwrap_or(u32::MAX);
    base.saturating_mul(factor).min(cap)
}

/// Heartbeat task state
pub struct HeartbeatClient<M: MasterClient> {
    master: M,
    server_id: Uuid,
    public_addr: String,
    port: u16,
    capacity: u32,
    interval: Duration,
    backoff_cap: Duration,
    metrics_rx: watch::Receiver<LoadMetrics>,
    shutdown_rx: watch::Receiver<bool>,
}

impl<M: MasterClient> HeartbeatClient<M> {
    pub fn new(
        master: M,
        config: &Config,
        server_id: Uuid,
        metrics_rx: watch::Receiver<LoadMetrics>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            master,
            server_id,
            public_addr: config.public_addr.clone(),
            port: config.public_port(),
            capacity: config.max_players as u32,
            interval: Duration::from_secs(config.heartbeat_interval_secs),
            backoff_cap: Duration::from_secs(config.heartbeat_backoff_cap_secs),
            metrics_rx,
            shutdown_rx,
        }
    }

    fn build_record(&self) -> RegistrationRecord {
        // Copy of the controller-published snapshot, never a live reference
        let metrics = *self.metrics_rx.borrow();
        RegistrationRecord {
            server_id: self.server_id,
            public_addr: self.public_addr.clone(),
            port: self.port,
            current_players: metrics.current_players,
            capacity: self.capacity,
            healthy: true,
            sent_at: Utc::now(),
        }
    }

    /// Register with the master until shutdown
    pub async fn run(mut self) {
        info!(server = %self.server_id, interval_secs = self.interval.as_secs(), "heartbeat started");
        let mut consecutive_failures: u32 = 0;

        loop {
            let delay = backoff_delay(self.interval, consecutive_failures, self.backoff_cap);
            tokio::select! {
                _ = sleep(delay) => {}
                _ = self.shutdown_rx.wait_for(|stop| *stop) => {
                    info!(server = %self.server_id, "heartbeat stopped");
                    return;
                }
            }

            let record = self.build_record();
            match self.master.register(&record).await {
                Ok(()) => {
                    if consecutive_failures > 0 {
                        info!(server = %self.server_id, "master registration recovered");
                    }
                    consecutive_failures = 0;
                    debug!(
                        server = %self.server_id,
                        players = record.current_players,
                        capacity = record.capacity,
                        "heartbeat sent"
                    );
                }
                Err(err) => {
                    consecutive_failures = consecutive_failures.saturating_add(1);
                    let next = backoff_delay(self.interval, consecutive_failures, self.backoff_cap);
                    warn!(
                        server = %self.server_id,
                        error = %err,
                        consecutive_failures,
                        retry_in_secs = next.as_secs(),
                        "master heartbeat failed"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::master::MasterError;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tokio::time::Instant;

    #[test]
    fn backoff_strictly_increases_until_the_cap() {
        let base = Duration::from_secs(10);
        let cap = Duration::from_secs(120);

        let mut previous = backoff_delay(base, 0, cap);
        assert_eq!(previous, base);

        for failures in 1..=4 {
            let delay = backoff_delay(base, failures, cap);
            assert!(
                delay > previous,
                "delay for {failures} failures must exceed the previous one"
            );
            previous = delay;
        }

        // 10s * 2^4 = 160s clamps to the cap and stays there
        assert_eq!(backoff_delay(base, 4, cap), cap);
        assert_eq!(backoff_delay(base, 10, cap), cap);
        assert_eq!(backoff_delay(base, 100, cap), cap);
    }

    #[test]
    fn backoff_survives_extreme_inputs() {
        let base = Duration::from_secs(10);
        let cap = Duration::from_secs(120);
        assert_eq!(backoff_delay(base, u32::MAX, cap), cap);
    }

    /// Master that always fails and records when it was called
    struct FailingMaster {
        calls: Arc<Mutex<Vec<Instant>>>,
    }

    impl MasterClient for FailingMaster {
        async fn register(&self, _record: &RegistrationRecord) -> Result<(), MasterError> {
            self.calls.lock().push(Instant::now());
            Err(MasterError::Api {
                status: 503,
                body: "unavailable".into(),
            })
        }
    }

    /// Master that always succeeds
    struct HealthyMaster {
        calls: Arc<Mutex<Vec<RegistrationRecord>>>,
    }

    impl MasterClient for HealthyMaster {
        async fn register(&self, record: &RegistrationRecord) -> Result<(), MasterError> {
            self.calls.lock().push(record.clone());
            Ok(())
        }
    }

    fn test_config() -> Config {
        Config {
            server_addr: "0.0.0.0:7777".parse().unwrap(),
            log_level: "info".into(),
            client_origin: "*".into(),
            public_addr: "203.0.113.5".into(),
            master_url: "http://master.test".into(),
            heartbeat_interval_secs: 10,
            heartbeat_backoff_cap_secs: 120,
            profile_api_url: "http://profiles.test".into(),
            profile_api_key: "key".into(),
            max_players: 16,
            tick_rate: 30,
            inbound_queue_capacity: 64,
            max_commands_per_tick: 32,
            session_buffer: 8,
            max_sessions: 32,
            malformed_frame_limit: 8,
            max_frame_bytes: 64 * 1024,
            idle_timeout_secs: 30,
            shutdown_grace_ms: 100,
            arena_seed: Some(1),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retry_gaps_grow_up_to_the_cap() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let master = FailingMaster {
            calls: calls.clone(),
        };
        let (_metrics_tx, metrics_rx) = watch::channel(LoadMetrics::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let client =
            HeartbeatClient::new(master, &test_config(), Uuid::new_v4(), metrics_rx, shutdown_rx);
        let task = tokio::spawn(client.run());

        // Attempts land at 10s, then +20s, +40s, +80s, +120s (cap), +120s
        tokio::time::sleep(Duration::from_secs(10 + 20 + 40 + 80 + 120 + 120 + 1)).await;
        shutdown_tx.send(true).unwrap();
        let _ = task.await;

        let calls = calls.lock();
        assert!(calls.len() >= 6, "expected 6 attempts, saw {}", calls.len());

        let gaps: Vec<Duration> = calls.windows(2).map(|w| w[1] - w[0]).collect();
        // Strictly increasing until the cap is hit
        assert!(gaps[0] < gaps[1]);
        assert!(gaps[1] < gaps[2]);
        assert!(gaps[2] < gaps[3]);
        // Capped afterwards
        assert_eq!(gaps[4], Duration::from_secs(120));
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_reports_current_load_and_recovers_cadence() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let master = HealthyMaster {
            calls: calls.clone(),
        };
        let (metrics_tx, metrics_rx) = watch::channel(LoadMetrics::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let client =
            HeartbeatClient::new(master, &test_config(), Uuid::new_v4(), metrics_rx, shutdown_rx);
        let task = tokio::spawn(client.run());

        metrics_tx
            .send(LoadMetrics {
                tick: 42,
                current_players: 5,
                capacity: 16,
            })
            .unwrap();

        tokio::time::sleep(Duration::from_secs(21)).await;
        shutdown_tx.send(true).unwrap();
        let _ = task.await;

        let calls = calls.lock();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].current_players, 5);
        assert_eq!(calls[0].capacity, 16);
        assert_eq!(calls[0].port, 7777);
        assert_eq!(calls[0].public_addr, "203.0.113.5");
    }
}
