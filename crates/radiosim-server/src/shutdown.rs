//! Shutdown coordination via `CancellationToken` and `TaskTracker`.

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;

/// Coordinates shutdown of the accept loop and every session it spawned.
///
/// One coordinator covers one run of the server; a restarted server gets a
/// fresh one because a cancelled token cannot be reset.
pub struct ShutdownCoordinator {
    token: CancellationToken,
    tracker: TaskTracker,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Get a clone of the cancellation token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Tracker that every server task is spawned on.
    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    /// Signal all tasks to stop without waiting.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether a shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Signal all tasks and wait until every tracked task has finished.
    ///
    /// Tasks spawned on the tracker while draining are waited for as well.
    pub async fn drain(&self) {
        self.shutdown();
        let _ = self.tracker.close();
        info!(task_count = self.tracker.len(), "waiting for tasks to complete");
        self.tracker.wait().await;
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
