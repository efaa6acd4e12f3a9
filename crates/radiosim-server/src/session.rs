//! Per-connection session: socket ownership, state machine, frame dispatch.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use metrics::{counter, gauge, histogram};
use parking_lot::Mutex;
use radiosim_core::protocol::{self, Frame, TUNE_ACK};
use radiosim_core::{AtomicFrequency, Frequency, SessionError, SessionId};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::broadcast::Broadcaster;
use crate::config::ServerConfig;
use crate::metrics::{
    DISCONNECTIONS_TOTAL, FRAMES_TOTAL, PROTOCOL_ERRORS_TOTAL, SESSION_DURATION_SECONDS,
    SESSIONS_ACTIVE,
};
use crate::registry::ClientRegistry;

/// Lifecycle of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Accepted, not yet registered.
    Connected,
    /// Registered and processing frames.
    Active,
    /// Teardown in progress; no longer a relay target.
    Closing,
    /// Socket released and removed from the registry.
    Closed,
}

/// Why a session left the `Active` state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// Client sent a disconnect frame.
    Requested,
    /// Client closed its end of the stream.
    PeerClosed,
    /// Read or write on the session's own socket failed.
    ConnectionLost,
    /// The server is stopping.
    Shutdown,
}

impl CloseReason {
    /// Label for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::PeerClosed => "peer_closed",
            Self::ConnectionLost => "connection_lost",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Server-side state for one connected client.
///
/// The read half is owned by the session task; the write half lives behind
/// `writer` so relays from other sessions and this session's own replies
/// are serialized.
///
/// A failed or timed-out write may leave a partial frame on the stream, so
/// the first failure tears the output down for good: the session leaves
/// `Active`, later sends are refused, and its task winds down.
pub struct Session {
    id: SessionId,
    peer: SocketAddr,
    frequency: AtomicFrequency,
    writer: tokio::sync::Mutex<OwnedWriteHalf>,
    state: Mutex<SessionState>,
    connected_at: Instant,
    write_timeout: Duration,
    output_lost: CancellationToken,
    mid_frame: AtomicBool,
}

impl Session {
    /// Split an accepted stream into a session and the read half its task drives.
    pub fn accept(
        stream: TcpStream,
        peer: SocketAddr,
        write_timeout: Duration,
    ) -> (Arc<Self>, OwnedReadHalf) {
        let (reader, writer) = stream.into_split();
        let session = Self {
            id: SessionId::new(),
            peer,
            frequency: AtomicFrequency::default(),
            writer: tokio::sync::Mutex::new(writer),
            state: Mutex::new(SessionState::Connected),
            connected_at: Instant::now(),
            write_timeout,
            output_lost: CancellationToken::new(),
            mid_frame: AtomicBool::new(false),
        };
        (Arc::new(session), reader)
    }

    /// Session identity.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Remote address.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Currently tuned frequency.
    pub fn frequency(&self) -> Frequency {
        self.frequency.load()
    }

    /// Retune, returning the previous frequency.
    pub fn tune(&self, frequency: Frequency) -> Frequency {
        self.frequency.swap(frequency)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Whether the session accepts relayed frames.
    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    /// Time since the connection was accepted.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }

    fn set_state(&self, next: SessionState) {
        let prev = std::mem::replace(&mut *self.state.lock(), next);
        debug!(session_id = %self.id, from = ?prev, to = ?next, "session state change");
    }

    /// Write `bytes` to the client under the session's write lock.
    ///
    /// The whole write, including waiting for the lock, is bounded by the
    /// write timeout. On failure the output is torn down, see [`Session`].
    pub async fn send(&self, bytes: &[u8]) -> Result<(), SessionError> {
        let write = async {
            let mut writer = self.writer.lock().await;
            // Checked under the lock: nothing may follow a truncated frame.
            // `mid_frame` stays set when a timed-out write was dropped.
            if self.output_lost.is_cancelled() || self.mid_frame.load(Ordering::Acquire) {
                return Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "session output already torn down",
                ));
            }
            self.mid_frame.store(true, Ordering::Release);
            writer.write_all(bytes).await?;
            self.mid_frame.store(false, Ordering::Release);
            Ok(())
        };
        let result = match tokio::time::timeout(self.write_timeout, write).await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(source)) => Err(SessionError::PeerDelivery {
                peer: self.peer,
                source,
            }),
            Err(_) => Err(SessionError::PeerTimeout { peer: self.peer }),
        };
        self.tear_down_output().await;
        result
    }

    async fn tear_down_output(&self) {
        if self.output_lost.is_cancelled() {
            return;
        }
        self.output_lost.cancel();
        if self.state() == SessionState::Active {
            self.set_state(SessionState::Closing);
        }
        debug!(session_id = %self.id, "write failed, output torn down");
        self.close().await;
    }

    /// Shut down the write half. Errors are irrelevant at this point.
    async fn close(&self) {
        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("frequency", &self.frequency())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Shared handles every session task needs.
#[derive(Clone)]
pub struct SessionContext {
    /// Live sessions.
    pub registry: Arc<ClientRegistry>,
    /// Fan-out engine over `registry`.
    pub broadcaster: Broadcaster,
    /// Server tuning knobs.
    pub config: Arc<ServerConfig>,
    /// Cancelled when the server stops.
    pub token: CancellationToken,
}

impl SessionContext {
    /// Build a context whose broadcaster reads from `registry`.
    pub fn new(
        registry: Arc<ClientRegistry>,
        config: Arc<ServerConfig>,
        token: CancellationToken,
    ) -> Self {
        Self {
            broadcaster: Broadcaster::new(registry.clone()),
            registry,
            config,
            token,
        }
    }
}

enum Flow {
    Continue,
    Close(CloseReason),
}

/// Drive one session from registration through teardown.
///
/// 1. Registers the session with the untuned frequency
/// 2. Reads frames until disconnect, peer close, read error, or shutdown
/// 3. Unregisters and shuts down the socket
#[instrument(skip_all, fields(session_id = %session.id(), peer = %session.peer()))]
pub async fn run_session(session: Arc<Session>, mut reader: OwnedReadHalf, ctx: SessionContext) {
    if !ctx.registry.register(session.clone()) {
        warn!("duplicate session id, dropping connection");
        session.close().await;
        return;
    }
    session.set_state(SessionState::Active);
    gauge!(SESSIONS_ACTIVE).increment(1.0);
    info!("client connected");

    let mut buf = vec![0u8; ctx.config.max_frame_size];
    let reason = loop {
        let read = tokio::select! {
            () = ctx.token.cancelled() => break CloseReason::Shutdown,
            () = session.output_lost.cancelled() => break CloseReason::ConnectionLost,
            read = reader.read(&mut buf) => read,
        };
        let n = match read {
            Ok(0) => break CloseReason::PeerClosed,
            Ok(n) => n,
            Err(e) => {
                let err = SessionError::from(e);
                debug!(error = %err, "read failed");
                break CloseReason::ConnectionLost;
            }
        };
        if let Flow::Close(reason) = handle_frame(&session, &buf[..n], &ctx).await {
            break reason;
        }
    };

    session.set_state(SessionState::Closing);
    let _ = ctx.registry.unregister(session.id());
    session.close().await;
    session.set_state(SessionState::Closed);

    info!(reason = reason.as_str(), "client disconnected");
    counter!(DISCONNECTIONS_TOTAL, "reason" => reason.as_str()).increment(1);
    gauge!(SESSIONS_ACTIVE).decrement(1.0);
    histogram!(SESSION_DURATION_SECONDS).record(session.age().as_secs_f64());
}

async fn handle_frame(session: &Session, bytes: &[u8], ctx: &SessionContext) -> Flow {
    let frame = match protocol::decode(bytes) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, len = bytes.len(), "dropping malformed tune frame");
            counter!(PROTOCOL_ERRORS_TOTAL).increment(1);
            return Flow::Continue;
        }
    };
    counter!(FRAMES_TOTAL, "kind" => frame.kind()).increment(1);

    match frame {
        Frame::Tune(frequency) => {
            let previous = session.tune(frequency);
            info!(%previous, %frequency, "tuned");
            if let Err(e) = session.send(TUNE_ACK).await {
                warn!(error = %e, "failed to acknowledge tune");
                return Flow::Close(CloseReason::ConnectionLost);
            }
            Flow::Continue
        }
        Frame::Disconnect => Flow::Close(CloseReason::Requested),
        Frame::Data(payload) => {
            let report = ctx.broadcaster.relay(session, payload).await;
            debug!(
                len = payload.len(),
                delivered = report.delivered,
                failed = report.failed,
                "relayed data frame"
            );
            Flow::Continue
        }
    }
}
