use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Buffer per page channel. A listener that falls this far behind sees
/// `RecvError::Lagged` and should refetch.
pub(crate) const CLIENT_CHANNEL_CAPACITY: usize = 16;

/// Message posted by the worker to a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WorkerMessage {
    /// A background fetch stored a response whose `Last-Modified` differs
    /// from the one previously cached.
    Fetched { url: String },
}

impl WorkerMessage {
    pub fn url(&self) -> &str {
        match self {
            WorkerMessage::Fetched { url } => url,
        }
    }
}

/// Identifies one page registered with the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// A page's end of the worker channel. Clone it freely; every clone
/// belongs to the same page and `listen` hands out independent receivers.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    id: ClientId,
    tx: broadcast::Sender<WorkerMessage>,
}

impl ClientHandle {
    pub(crate) fn new(id: ClientId, tx: broadcast::Sender<WorkerMessage>) -> Self {
        Self { id, tx }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Start receiving messages posted to this page from now on.
    pub fn listen(&self) -> broadcast::Receiver<WorkerMessage> {
        self.tx.subscribe()
    }

    #[cfg(test)]
    pub(crate) fn post(&self, message: WorkerMessage) {
        let _ = self.tx.send(message);
    }
}
