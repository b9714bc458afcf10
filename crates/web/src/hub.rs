//! Registry of connected viewers and fan-out of status updates.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use axum::extract::ws::Utf8Bytes;
use pipeline_monitor_core::models::StatusDocument;
use tokio::sync::{Mutex, mpsc, watch};

use crate::messages::ServerMessage;

pub type ViewerId = u64;

/// Holds the published status document and one outbound queue per viewer.
///
/// Each connection task drains its queue into the socket, so a broadcast never waits on
/// a slow viewer. A queue whose receiver is gone belongs to a viewer that has
/// disconnected and is dropped on the next broadcast.
pub struct Hub {
    current: watch::Sender<Arc<StatusDocument>>,
    viewers: Mutex<HashMap<ViewerId, mpsc::UnboundedSender<Utf8Bytes>>>,
    next_id: AtomicU64,
}

impl Hub {
    pub fn new(initial: StatusDocument) -> Self {
        Self {
            current: watch::Sender::new(Arc::new(initial)),
            viewers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn current(&self) -> Arc<StatusDocument> { self.current.borrow().clone() }

    /// Register a viewer. The initial status is already queued on the returned receiver.
    pub async fn register(&self) -> (ViewerId, mpsc::UnboundedReceiver<Utf8Bytes>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        let mut viewers = self.viewers.lock().await;
        // Queued under the lock so no update can overtake the initial status
        let current = self.current();
        match (ServerMessage::InitialStatus { data: &current }).to_text() {
            Ok(text) => {
                let _ = tx.send(text);
            }
            Err(e) => tracing::error!("Failed to encode initial status: {:?}", e),
        }
        viewers.insert(id, tx);
        (id, rx)
    }

    pub async fn unregister(&self, id: ViewerId) -> bool {
        self.viewers.lock().await.remove(&id).is_some()
    }

    pub async fn viewer_count(&self) -> usize { self.viewers.lock().await.len() }

    /// Replace the published document and send it to every viewer.
    /// Returns the number of viewers it was delivered to.
    pub async fn publish(&self, document: StatusDocument) -> usize {
        let document = Arc::new(document);
        let mut viewers = self.viewers.lock().await;
        self.current.send_replace(document.clone());
        if viewers.is_empty() {
            return 0;
        }
        let text = match (ServerMessage::StatusUpdate { data: &document }).to_text() {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Failed to encode status update: {:?}", e);
                return 0;
            }
        };
        viewers.retain(|id, tx| match tx.send(text.clone()) {
            Ok(()) => true,
            Err(_) => {
                tracing::debug!("Dropping disconnected viewer {}", id);
                false
            }
        });
        viewers.len()
    }

    /// Drop every viewer queue. Connection tasks close their sockets once drained.
    pub async fn close_all(&self) -> usize {
        let mut viewers = self.viewers.lock().await;
        let count = viewers.len();
        viewers.clear();
        count
    }
}
