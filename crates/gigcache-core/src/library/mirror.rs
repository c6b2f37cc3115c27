use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::remote::{RemoteDocument, RemoteDocumentStore};

/// Fire-and-forget writer for the remote mirror.
///
/// Documents are queued on an unbounded channel and written in order by a
/// background task. When several documents are waiting only the newest is
/// written, since each one carries the full state.
#[derive(Clone, Default)]
pub struct MirrorQueue {
    tx: Option<mpsc::UnboundedSender<RemoteDocument>>,
}

impl MirrorQueue {
    /// Start the writer task. Must be called from within a tokio runtime.
    pub fn spawn(store: Arc<dyn RemoteDocumentStore>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(Self::run(store, rx));
        (Self { tx: Some(tx) }, handle)
    }

    /// A queue that discards everything, for users without a remote document.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    pub fn enqueue(&self, document: RemoteDocument) {
        let Some(tx) = self.tx.as_ref() else {
            return;
        };
        if tx.send(document).is_err() {
            warn!("Remote mirror writer has stopped; dropping update");
        }
    }

    async fn run(store: Arc<dyn RemoteDocumentStore>, mut rx: mpsc::UnboundedReceiver<RemoteDocument>) {
        while let Some(mut document) = rx.recv().await {
            while let Ok(newer) = rx.try_recv() {
                document = newer;
            }
            let saved = document.saved_events.len();
            let hidden = document.hidden_event_ids.len();
            match store.merge_write(document).await {
                Ok(()) => debug!(saved, hidden, "Remote mirror updated"),
                Err(e) => warn!(error = %e, "Failed to update remote mirror"),
            }
        }
    }
}
