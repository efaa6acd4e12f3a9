//! Frequency-scoped fan-out of data frames.

use std::sync::Arc;

use futures::future::join_all;
use metrics::counter;
use tracing::{debug, warn};

use crate::metrics::{RELAY_DELIVERIES_TOTAL, RELAY_DROPS_TOTAL};
use crate::registry::ClientRegistry;
use crate::session::Session;

/// Outcome of one relay call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RelayReport {
    /// Peers that received the payload.
    pub delivered: usize,
    /// Peers whose write failed or timed out.
    pub failed: usize,
}

/// Relays payloads to every other session on the sender's frequency.
#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<ClientRegistry>,
}

impl Broadcaster {
    /// Create a broadcaster over `registry`.
    pub fn new(registry: Arc<ClientRegistry>) -> Self {
        Self { registry }
    }

    /// Deliver `payload` verbatim to every active session, other than
    /// `sender`, tuned to exactly the sender's frequency.
    ///
    /// Untuned senders reach nobody. Peer failures are logged and counted,
    /// never propagated. A peer whose write fails or times out has its
    /// output torn down by [`Session::send`] and stops being a target.
    /// Writes to different peers run concurrently, so a stalled peer costs
    /// at most one write timeout.
    pub async fn relay(&self, sender: &Session, payload: &[u8]) -> RelayReport {
        let frequency = sender.frequency();
        if !frequency.is_tuned() {
            debug!(session_id = %sender.id(), "untuned sender, nothing to relay");
            return RelayReport::default();
        }

        let peers: Vec<Arc<Session>> = self
            .registry
            .tuned_to(frequency)
            .into_iter()
            .filter(|peer| peer.id() != sender.id() && peer.is_active())
            .collect();

        if peers.is_empty() {
            return RelayReport::default();
        }

        let results = join_all(peers.iter().map(|peer| peer.send(payload))).await;

        let mut report = RelayReport::default();
        for (peer, result) in peers.iter().zip(results) {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(session_id = %peer.id(), error = %e, "skipping peer");
                }
            }
        }

        counter!(RELAY_DELIVERIES_TOTAL).increment(report.delivered as u64);
        if report.failed > 0 {
            counter!(RELAY_DROPS_TOTAL).increment(report.failed as u64);
        }
        debug!(
            session_id = %sender.id(),
            %frequency,
            recipients = peers.len(),
            delivered = report.delivered,
            "relay complete"
        );
        report
    }
}
