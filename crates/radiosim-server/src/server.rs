//! Start and stop lifecycle around the listener and sessions.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use radiosim_core::RadioError;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::{ServerConfig, validate_host, validate_port};
use crate::listener;
use crate::registry::ClientRegistry;
use crate::session::SessionContext;
use crate::shutdown::ShutdownCoordinator;

/// State of one start→stop cycle.
struct ActiveRun {
    local_addr: SocketAddr,
    shutdown: ShutdownCoordinator,
}

/// The relay server.
///
/// Construct one per process and pass it to the entry point. The server can
/// be started again after it has been stopped.
pub struct RadioServer {
    config: Arc<ServerConfig>,
    registry: Arc<ClientRegistry>,
    running: AtomicBool,
    run: Mutex<Option<ActiveRun>>,
}

impl RadioServer {
    /// Create a stopped server.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config: Arc::new(config),
            registry: Arc::new(ClientRegistry::new()),
            running: AtomicBool::new(false),
            run: Mutex::new(None),
        }
    }

    /// Validate, bind, and spawn the accept loop.
    ///
    /// Returns the bound address. If the server is already running this is
    /// a no-op that returns the current address.
    pub async fn start(&self, host: &str, port: i64) -> Result<SocketAddr, RadioError> {
        let mut run = self.run.lock().await;
        if let Some(active) = run.as_ref() {
            debug!(addr = %active.local_addr, "start ignored, already running");
            return Ok(active.local_addr);
        }

        let port = validate_port(port)?;
        let host = validate_host(host)?;
        let listener = listener::bind(host, port, self.config.listen_backlog).await?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| RadioError::bind(host, port, e))?;

        let shutdown = ShutdownCoordinator::new();
        let ctx = SessionContext::new(self.registry.clone(), self.config.clone(), shutdown.token());
        let tracker = shutdown.tracker().clone();
        self.running.store(true, Ordering::Release);
        let _ = tracker.spawn(listener::accept_loop(listener, ctx, tracker.clone()));

        *run = Some(ActiveRun {
            local_addr,
            shutdown,
        });
        info!(%local_addr, "radio server started");
        Ok(local_addr)
    }

    /// Stop accepting, close every session, and wait until all of them and
    /// the listener have finished. No-op when already stopped.
    pub async fn stop(&self) {
        let mut run = self.run.lock().await;
        let Some(active) = run.take() else {
            debug!("stop ignored, not running");
            return;
        };

        self.running.store(false, Ordering::Release);
        info!(
            addr = %active.local_addr,
            sessions = self.registry.len(),
            "stopping radio server"
        );
        active.shutdown.drain().await;
        info!(addr = %active.local_addr, "radio server stopped");
    }

    /// Whether the server is between a successful `start` and `stop`.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Bound address while running.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.run.lock().await.as_ref().map(|r| r.local_addr)
    }

    /// Number of live sessions.
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

impl Default for RadioServer {
    fn default() -> Self {
        Self::new(ServerConfig::default())
    }
}

impl Drop for RadioServer {
    fn drop(&mut self) {
        // Dropped without stop(): signal tasks so they do not outlive the server.
        if let Some(active) = self.run.get_mut().as_ref() {
            if !active.shutdown.is_shutting_down() {
                warn!(addr = %active.local_addr, "radio server dropped while running");
                active.shutdown.shutdown();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use radiosim_core::ConfigError;

    use super::*;

    fn free_port() -> i64 {
        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        i64::from(probe.local_addr().unwrap().port())
    }

    #[tokio::test]
    async fn new_server_is_stopped() {
        let server = RadioServer::default();
        assert!(!server.is_running());
        assert_eq!(server.connection_count(), 0);
        assert!(server.local_addr().await.is_none());
        assert_eq!(server.config().max_frame_size, 4096);
    }

    #[tokio::test]
    async fn start_rejects_non_positive_port() {
        let server = RadioServer::default();
        let err = server.start("127.0.0.1", 0).await.unwrap_err();
        assert_matches!(err, RadioError::Config(ConfigError::NonPositivePort(0)));
        let err = server.start("127.0.0.1", -80).await.unwrap_err();
        assert_matches!(err, RadioError::Config(ConfigError::NonPositivePort(-80)));
        assert!(!server.is_running());
    }

    #[tokio::test]
    async fn start_rejects_out_of_range_port() {
        let server = RadioServer::default();
        let err = server.start("127.0.0.1", 70_000).await.unwrap_err();
        assert_matches!(err, RadioError::Config(ConfigError::PortOutOfRange(70_000)));
    }

    #[tokio::test]
    async fn start_rejects_empty_host() {
        let server = RadioServer::default();
        let err = server.start(" ", 15100).await.unwrap_err();
        assert_matches!(err, RadioError::Config(ConfigError::EmptyHost));
    }

    #[tokio::test]
    async fn start_reports_bind_error() {
        let holder = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = i64::from(holder.local_addr().unwrap().port());
        let server = RadioServer::default();
        let err = server.start("127.0.0.1", port).await.unwrap_err();
        assert_matches!(err, RadioError::Bind { .. });
        assert!(!server.is_running());
    }

    #[tokio::test]
    async fn start_twice_is_noop() {
        let server = RadioServer::default();
        let port = free_port();
        let first = server.start("127.0.0.1", port).await.unwrap();
        let second = server.start("127.0.0.1", port).await.unwrap();
        assert_eq!(first, second);
        assert!(server.is_running());
        server.stop().await;
    }

    #[tokio::test]
    async fn drop_without_stop_closes_listener() {
        let port = free_port();
        let addr = {
            let server = RadioServer::default();
            server.start("127.0.0.1", port).await.unwrap()
        };
        let mut refused = false;
        for _ in 0..50 {
            if tokio::net::TcpStream::connect(addr).await.is_err() {
                refused = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(refused, "listener still accepting after drop");
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let server = RadioServer::default();
        server.stop().await;
        let _ = server.start("127.0.0.1", free_port()).await.unwrap();
        server.stop().await;
        server.stop().await;
        assert!(!server.is_running());
        assert!(server.local_addr().await.is_none());
    }
}
