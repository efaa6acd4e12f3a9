//! Radio frequency channel identifier.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Numeric channel identifier.
///
/// Two sessions hear each other when their frequencies compare equal as
/// `f64` values. [`Frequency::UNTUNED`] means the session is on no channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Frequency(f64);

impl Frequency {
    /// Sentinel for a session that has not tuned yet.
    pub const UNTUNED: Self = Self(0.0);

    /// Wrap a raw value.
    pub const fn new(value: f64) -> Self {
        Self(value)
    }

    /// Raw numeric value.
    pub const fn value(self) -> f64 {
        self.0
    }

    /// Whether this frequency is a relay target.
    pub fn is_tuned(self) -> bool {
        self != Self::UNTUNED
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_tuned() {
            write!(f, "{}", self.0)
        } else {
            f.write_str("untuned")
        }
    }
}

impl From<f64> for Frequency {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

/// A [`Frequency`] that can be read and replaced from any thread.
///
/// Stored as the `f64` bit pattern, so a reader sees either the old or the
/// new value in full.
#[derive(Debug)]
pub struct AtomicFrequency(AtomicU64);

impl AtomicFrequency {
    /// Create with an initial value.
    pub fn new(frequency: Frequency) -> Self {
        Self(AtomicU64::new(frequency.0.to_bits()))
    }

    /// Current value.
    pub fn load(&self) -> Frequency {
        Frequency(f64::from_bits(self.0.load(Ordering::Acquire)))
    }

    /// Replace the value, returning the previous one.
    pub fn swap(&self, frequency: Frequency) -> Frequency {
        Frequency(f64::from_bits(
            self.0.swap(frequency.0.to_bits(), Ordering::AcqRel),
        ))
    }
}

impl Default for AtomicFrequency {
    fn default() -> Self {
        Self::new(Frequency::UNTUNED)
    }
}
