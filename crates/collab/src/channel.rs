//! Boundary contracts to the external annotation and presence channels.
//!
//! The real transport lives outside this core. Delivery is assumed
//! at-least-once with no cross-viewer ordering; consumers dedupe by
//! annotation id, and for cursors the last value per viewer wins.

use doc_model::{Annotation, AnnotationId, Cursor, DocumentId};
use serde::{Deserialize, Serialize};

/// One mutation on the shared annotation set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum AnnotationEvent {
    Add(Annotation),
    /// Whole-value replacement; carries the full annotation.
    Update(Annotation),
    Delete { id: AnnotationId },
}

impl AnnotationEvent {
    pub fn annotation_id(&self) -> AnnotationId {
        match self {
            AnnotationEvent::Add(a) | AnnotationEvent::Update(a) => a.id,
            AnnotationEvent::Delete { id } => *id,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("channel publish failed: {0}")]
    Publish(String),

    #[error("channel closed")]
    Closed,
}

/// Persistent annotation fan-out, scoped per document.
pub trait AnnotationChannel {
    fn publish(&self, document: &DocumentId, event: AnnotationEvent) -> Result<(), ChannelError>;

    /// Drain events received since the last poll. May contain duplicates.
    fn poll(&self, document: &DocumentId) -> Vec<AnnotationEvent>;
}

/// Ephemeral cursor fan-out. Fire-and-forget, no acknowledgement.
pub trait PresenceChannel {
    fn publish(&self, document: &DocumentId, cursor: Cursor) -> Result<(), ChannelError>;

    /// Drain cursor updates received since the last poll.
    fn poll(&self, document: &DocumentId) -> Vec<Cursor>;
}
