//! Wire protocol: text-prefixed control frames and opaque data frames.
//!
//! There is no length delimiting. Each read from the socket is treated as one
//! frame and classified by prefix:
//!
//! | Frame      | Wire form                                         | Reply |
//! |------------|---------------------------------------------------|-------|
//! | Tune       | `RadioSim - Settings` + `{"Frequency": <number>}` | `OK`  |
//! | Disconnect | `RadioSim - Disconnect`                           | none  |
//! | Data       | anything else                                     | none  |
//!
//! A data payload that happens to begin with a control prefix is classified
//! as that control frame.

use serde::Deserialize;

use crate::errors::ProtocolError;
use crate::frequency::Frequency;

/// Prefix of a tune frame; the JSON settings object follows immediately.
pub const SETTINGS_PREFIX: &[u8] = b"RadioSim - Settings";

/// Complete disconnect frame (matched as a prefix).
pub const DISCONNECT_PREFIX: &[u8] = b"RadioSim - Disconnect";

/// Acknowledgment sent after a successful tune.
pub const TUNE_ACK: &[u8] = b"OK";

/// A decoded inbound frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Frame<'a> {
    /// Retune the sending session.
    Tune(Frequency),
    /// Orderly teardown requested.
    Disconnect,
    /// Opaque payload to relay to co-tuned peers.
    Data(&'a [u8]),
}

impl Frame<'_> {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Tune(_) => "tune",
            Self::Disconnect => "disconnect",
            Self::Data(_) => "data",
        }
    }
}

/// JSON body of a tune frame.
#[derive(Debug, Clone, Copy, Deserialize)]
struct TuneSettings {
    #[serde(rename = "Frequency")]
    frequency: f64,
}

/// Classify one received chunk.
///
/// Returns [`ProtocolError`] only for a tune frame whose body cannot be
/// parsed; the caller drops such frames without replying.
pub fn decode(bytes: &[u8]) -> Result<Frame<'_>, ProtocolError> {
    if let Some(body) = bytes.strip_prefix(SETTINGS_PREFIX) {
        let settings: TuneSettings = serde_json::from_slice(body)?;
        return Ok(Frame::Tune(Frequency::new(settings.frequency)));
    }
    if bytes.starts_with(DISCONNECT_PREFIX) {
        return Ok(Frame::Disconnect);
    }
    Ok(Frame::Data(bytes))
}

/// Encode a tune frame for `frequency`.
pub fn tune_frame(frequency: Frequency) -> Vec<u8> {
    let mut frame = SETTINGS_PREFIX.to_vec();
    let body = serde_json::json!({ "Frequency": frequency.value() });
    frame.extend_from_slice(body.to_string().as_bytes());
    frame
}

/// Encode a disconnect frame.
pub fn disconnect_frame() -> Vec<u8> {
    DISCONNECT_PREFIX.to_vec()
}
