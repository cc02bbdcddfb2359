//! In-memory loopback bus implementing both channel traits.
//!
//! Wires any number of clients together over flume queues, scoped per
//! document. Publishes are fanned out to every client on the document,
//! including the publisher. Real backends echo writes back to the writer,
//! and the echo keeps the dedup path exercised.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use doc_model::{Cursor, DocumentId};

use crate::channel::{AnnotationChannel, AnnotationEvent, ChannelError, PresenceChannel};

#[derive(Default)]
struct BusInner {
    annotation_peers: HashMap<DocumentId, Vec<flume::Sender<AnnotationEvent>>>,
    presence_peers: HashMap<DocumentId, Vec<flume::Sender<Cursor>>>,
}

/// Shared hub; cheap to clone.
#[derive(Clone, Default)]
pub struct MemoryBus {
    inner: Arc<Mutex<BusInner>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the bus for one document.
    pub fn client(&self, document: &DocumentId) -> MemoryClient {
        let (annotation_tx, annotation_rx) = flume::unbounded();
        let (cursor_tx, cursor_rx) = flume::unbounded();

        let mut inner = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        inner
            .annotation_peers
            .entry(document.clone())
            .or_default()
            .push(annotation_tx);
        inner
            .presence_peers
            .entry(document.clone())
            .or_default()
            .push(cursor_tx);

        MemoryClient {
            inner: Arc::clone(&self.inner),
            document: document.clone(),
            annotations: annotation_rx,
            cursors: cursor_rx,
        }
    }
}

/// One participant's endpoint on the bus.
pub struct MemoryClient {
    inner: Arc<Mutex<BusInner>>,
    document: DocumentId,
    annotations: flume::Receiver<AnnotationEvent>,
    cursors: flume::Receiver<Cursor>,
}

impl AnnotationChannel for MemoryClient {
    fn publish(&self, document: &DocumentId, event: AnnotationEvent) -> Result<(), ChannelError> {
        let inner = self.inner.lock().map_err(|_| ChannelError::Closed)?;
        let Some(peers) = inner.annotation_peers.get(document) else {
            return Ok(());
        };

        for peer in peers {
            // A dropped peer is not a publish failure.
            let _ = peer.send(event.clone());
        }
        Ok(())
    }

    fn poll(&self, document: &DocumentId) -> Vec<AnnotationEvent> {
        if *document != self.document {
            return Vec::new();
        }
        self.annotations.try_iter().collect()
    }
}

impl PresenceChannel for MemoryClient {
    fn publish(&self, document: &DocumentId, cursor: Cursor) -> Result<(), ChannelError> {
        let inner = self.inner.lock().map_err(|_| ChannelError::Closed)?;
        let Some(peers) = inner.presence_peers.get(document) else {
            return Ok(());
        };

        for peer in peers {
            let _ = peer.send(cursor.clone());
        }
        Ok(())
    }

    fn poll(&self, document: &DocumentId) -> Vec<Cursor> {
        if *document != self.document {
            return Vec::new();
        }
        self.cursors.try_iter().collect()
    }
}
