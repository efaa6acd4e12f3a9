//! # radiosim-server
//!
//! TCP relay that groups clients by radio frequency.
//!
//! - Listener: binds the socket, accepts, spawns one task per session
//! - Session: decodes tune/disconnect control frames, forwards data frames
//! - Client registry: live sessions behind a single lock
//! - Broadcaster: relays a payload to every co-tuned peer
//! - Lifecycle: idempotent `start`/`stop` via `CancellationToken` + `TaskTracker`

#![deny(unsafe_code)]

pub mod broadcast;
pub mod config;
pub mod listener;
pub mod metrics;
pub mod registry;
pub mod server;
pub mod session;
pub mod shutdown;

pub use broadcast::{Broadcaster, RelayReport};
pub use config::ServerConfig;
pub use registry::ClientRegistry;
pub use server::RadioServer;
pub use session::{Session, SessionState};
