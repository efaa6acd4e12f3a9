//! # radiosim-core
//!
//! Foundation types for the RadioSim relay.
//!
//! - [`frequency`]: channel identifier and its atomic cell
//! - [`ids`]: session identity
//! - [`protocol`]: prefix-sniffed control frames and opaque data frames
//! - [`errors`]: `thiserror` hierarchy shared by the server and binary
//! - [`logging`]: `tracing` subscriber setup

#![deny(unsafe_code)]

pub mod errors;
pub mod frequency;
pub mod ids;
pub mod logging;
pub mod protocol;

pub use errors::{ConfigError, ProtocolError, RadioError, SessionError};
pub use frequency::{AtomicFrequency, Frequency};
pub use ids::SessionId;
pub use protocol::Frame;
