//! Realtime row-change feed for projects.

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use crate::models::{Project, ProjectChange};

const FEED_CAPACITY: usize = 256;

/// Fan-out of project row updates to every open subscription.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ProjectChange>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(FEED_CAPACITY);
        Self { tx }
    }

    pub fn publish(&self, project: Project) {
        // No receivers is the common case outside an open editor.
        let delivered = self.tx.send(ProjectChange { project }).unwrap_or(0);
        debug!("Published project change to {delivered} subscriber(s)");
    }

    pub fn subscribe_project(&self, project_id: impl Into<String>) -> ProjectSubscription {
        ProjectSubscription {
            project_id: project_id.into(),
            rx: self.tx.subscribe(),
        }
    }
}

/// Updates for a single project, in publication order.
#[derive(Debug)]
pub struct ProjectSubscription {
    project_id: String,
    rx: broadcast::Receiver<ProjectChange>,
}

impl ProjectSubscription {
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Next update for this project; `None` once the feed is gone.
    /// Updates missed by a lagging receiver are skipped.
    pub async fn next(&mut self) -> Option<Project> {
        loop {
            match self.rx.recv().await {
                Ok(change) if change.project.id == self.project_id => return Some(change.project),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Subscription for {} lagged by {skipped} events", self.project_id);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`Self::next`].
    pub fn try_next(&mut self) -> Option<Project> {
        use broadcast::error::TryRecvError;
        loop {
            match self.rx.try_recv() {
                Ok(change) if change.project.id == self.project_id => return Some(change.project),
                Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }
}
