//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every backend with a TCP connect
//! - Update backend liveness based on results

use std::sync::Arc;
use std::time::Duration;
use futures_util::future::join_all;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::config::HealthCheckConfig;
use crate::load_balancer::{backend::{Backend, HealthState}, ServerPool};
use crate::observability::metrics;

/// Attempt a TCP connection to `authority` within `timeout`.
///
/// The connection is closed immediately on success.
pub async fn probe(authority: &str, timeout: Duration) -> bool {
    match time::timeout(timeout, TcpStream::connect(authority)).await {
        Ok(Ok(_stream)) => true,
        Ok(Err(e)) => {
            tracing::debug!(addr = %authority, error = %e, "Probe failed: connection error");
            false
        }
        Err(_) => {
            tracing::debug!(addr = %authority, "Probe failed: timeout");
            false
        }
    }
}

pub struct HealthMonitor {
    pool: Arc<ServerPool>,
    config: HealthCheckConfig,
}

impl HealthMonitor {
    pub fn new(pool: Arc<ServerPool>, config: HealthCheckConfig) -> Self {
        Self { pool, config }
    }

    /// Run on a background task until `shutdown` fires.
    pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Scan immediately, then every `interval_secs`, until shutdown.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }
        if self.pool.is_empty() {
            tracing::info!("No backends configured, health monitor not started");
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            timeout = self.config.timeout_secs,
            backends = self.pool.len(),
            "Health monitor starting"
        );

        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every backend once. Returns how many are alive afterwards.
    pub async fn check_all(&self) -> usize {
        let backends = self.pool.all_backends();
        let results = join_all(backends.iter().map(|b| self.check_backend(b))).await;
        let alive = results.into_iter().filter(|alive| *alive).count();

        tracing::debug!(alive, total = backends.len(), "Health check complete");
        alive
    }

    async fn check_backend(&self, backend: &Arc<Backend>) -> bool {
        let timeout = Duration::from_secs(self.config.timeout_secs);
        let alive = probe(&backend.authority, timeout).await;
        let previous = backend.set_alive(alive);
        let active_connections = backend.active_connections();

        tracing::info!(
            backend = %backend.url,
            status = if alive { "up" } else { "down" },
            active_connections,
            "Health check"
        );
        if previous != HealthState::Unknown && (previous == HealthState::Alive) != alive {
            tracing::warn!(backend = %backend.url, alive, "Backend state changed");
        }

        metrics::record_backend_health(backend.url.as_str(), alive, active_connections);
        alive
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SelectionPolicy;
    use tokio::net::TcpListener;
    use url::Url;

    async fn closed_port() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        addr.to_string()
    }

    #[tokio::test]
    async fn probe_is_stable_for_reachable_backend() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        for _ in 0..5 {
            assert!(probe(&addr, Duration::from_secs(2)).await);
        }
    }

    #[tokio::test]
    async fn probe_is_stable_for_unreachable_backend() {
        let addr = closed_port().await;
        for _ in 0..5 {
            assert!(!probe(&addr, Duration::from_secs(2)).await);
        }
    }

    #[tokio::test]
    async fn check_all_updates_liveness() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let up = format!("http://{}", listener.local_addr().unwrap());
        let down = format!("http://{}", closed_port().await);

        let pool = Arc::new(ServerPool::new(
            vec![Url::parse(&up).unwrap(), Url::parse(&down).unwrap()],
            SelectionPolicy::LeastConnections,
        ));
        let monitor = HealthMonitor::new(pool.clone(), HealthCheckConfig::default());

        assert_eq!(monitor.check_all().await, 1);
        assert!(pool.all_backends()[0].is_alive());
        assert!(!pool.all_backends()[1].is_alive());

        // Repeated scans do not flap.
        assert_eq!(monitor.check_all().await, 1);
        assert!(!pool.all_backends()[1].is_alive());
    }

    #[tokio::test]
    async fn dead_backend_revived_by_scan() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = Url::parse(&format!("http://{}", listener.local_addr().unwrap())).unwrap();
        let pool = Arc::new(ServerPool::new(vec![url], SelectionPolicy::RoundRobin));
        pool.all_backends()[0].set_alive(false);

        let monitor = HealthMonitor::new(pool.clone(), HealthCheckConfig::default());
        monitor.check_all().await;
        assert!(pool.all_backends()[0].is_alive());
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = Url::parse(&format!("http://{}", listener.local_addr().unwrap())).unwrap();
        let pool = Arc::new(ServerPool::new(vec![url], SelectionPolicy::LeastConnections));

        let (tx, rx) = broadcast::channel(1);
        let handle = HealthMonitor::new(pool, HealthCheckConfig::default()).spawn(rx);

        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(()).unwrap();
        time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("monitor should exit")
            .unwrap();
    }

    #[tokio::test]
    async fn empty_pool_schedules_nothing() {
        let pool = Arc::new(ServerPool::new(Vec::new(), SelectionPolicy::LeastConnections));
        let (_tx, rx) = broadcast::channel(1);
        let handle = HealthMonitor::new(pool, HealthCheckConfig::default()).spawn(rx);

        // Returns without waiting for a shutdown signal.
        time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("monitor should return immediately")
            .unwrap();
    }
}
