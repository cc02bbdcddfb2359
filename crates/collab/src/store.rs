//! Authoritative annotation set for one document, reconciled across viewers.
//!
//! Mutations apply locally first (optimistic) and are then forwarded to the
//! channel; remote events are the eventual source of truth, merged by
//! identifier. There is no locking and no ownership enforcement: any viewer
//! may delete any annotation, and concurrent note edits resolve
//! last-write-wins.

use std::collections::HashMap;

use doc_model::{Annotation, AnnotationId, DocumentId, HighlightColor, NormalizedRect};
use log::{debug, warn};

use crate::channel::{AnnotationChannel, AnnotationEvent};

struct Entry {
    annotation: Annotation,
    /// False until the remote channel echoes the mutation back.
    confirmed: bool,
}

/// Local projection of the shared annotation set.
pub struct AnnotationStore {
    document: DocumentId,
    entries: HashMap<AnnotationId, Entry>,
}

impl AnnotationStore {
    pub fn new(document: DocumentId) -> Self {
        Self { document, entries: HashMap::new() }
    }

    pub fn document(&self) -> &DocumentId {
        &self.document
    }

    /// Create an annotation: apply locally, then forward to the channel.
    ///
    /// A publish failure keeps the optimistic entry but leaves it
    /// unconfirmed; reconciliation with remote truth happens as events
    /// arrive. Returns the new annotation's id.
    pub fn create(
        &mut self,
        channel: &dyn AnnotationChannel,
        page_number: u16,
        rects: Vec<NormalizedRect>,
        color: HighlightColor,
        author: impl Into<String>,
    ) -> AnnotationId {
        let annotation = Annotation::new(page_number, rects, color, author);
        let id = annotation.id;

        self.entries.insert(id, Entry { annotation: annotation.clone(), confirmed: false });
        self.forward(channel, AnnotationEvent::Add(annotation));
        id
    }

    /// Insert an annotation built elsewhere (e.g. the selection translator).
    pub fn insert(&mut self, channel: &dyn AnnotationChannel, annotation: Annotation) {
        let id = annotation.id;
        self.entries.insert(id, Entry { annotation: annotation.clone(), confirmed: false });
        self.forward(channel, AnnotationEvent::Add(annotation));
    }

    /// Replace an annotation's note whole-value. Last write wins; there is
    /// no merge between concurrent edits. Returns false for an unknown id.
    pub fn update_note(
        &mut self,
        channel: &dyn AnnotationChannel,
        id: AnnotationId,
        note: Option<String>,
    ) -> bool {
        let Some(entry) = self.entries.get_mut(&id) else {
            return false;
        };

        entry.annotation.note = note;
        entry.confirmed = false;
        let event = AnnotationEvent::Update(entry.annotation.clone());
        self.forward(channel, event);
        true
    }

    /// Delete by id. Any viewer may delete any annotation; deleting an id
    /// that is already gone is a no-op, not an error.
    pub fn delete(&mut self, channel: &dyn AnnotationChannel, id: AnnotationId) -> bool {
        if self.entries.remove(&id).is_none() {
            return false;
        }

        self.forward(channel, AnnotationEvent::Delete { id });
        true
    }

    /// Merge one remote event into the local projection.
    ///
    /// Duplicate `add` deliveries collapse onto the existing entry; `update`
    /// replaces the stored annotation wholesale; `delete` removes the entry
    /// even if a local edit is still unconfirmed; the delete wins.
    pub fn apply_remote(&mut self, event: AnnotationEvent) {
        match event {
            AnnotationEvent::Add(annotation) => match self.entries.get_mut(&annotation.id) {
                Some(entry) => {
                    debug!("annotation {} confirmed", annotation.id);
                    entry.confirmed = true;
                }
                None => {
                    self.entries
                        .insert(annotation.id, Entry { annotation, confirmed: true });
                }
            },
            AnnotationEvent::Update(annotation) => {
                self.entries
                    .insert(annotation.id, Entry { annotation, confirmed: true });
            }
            AnnotationEvent::Delete { id } => {
                self.entries.remove(&id);
            }
        }
    }

    /// Apply a batch of polled events.
    pub fn apply_all(&mut self, events: impl IntoIterator<Item = AnnotationEvent>) {
        for event in events {
            self.apply_remote(event);
        }
    }

    /// Annotations on one page, ordered by creation time ascending.
    pub fn annotations_for_page(&self, page_number: u16) -> Vec<&Annotation> {
        let mut annotations: Vec<&Annotation> = self
            .entries
            .values()
            .map(|entry| &entry.annotation)
            .filter(|a| a.page_number == page_number)
            .collect();

        annotations.sort_by_key(|a| (a.created_at, a.id));
        annotations
    }

    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.entries.get(&id).map(|entry| &entry.annotation)
    }

    /// Whether the remote channel has echoed this annotation back yet.
    pub fn is_confirmed(&self, id: AnnotationId) -> Option<bool> {
        self.entries.get(&id).map(|entry| entry.confirmed)
    }

    /// Ids of entries still awaiting remote confirmation.
    pub fn pending_ids(&self) -> Vec<AnnotationId> {
        let mut ids: Vec<AnnotationId> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.confirmed)
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop everything, e.g. when switching documents.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn forward(&self, channel: &dyn AnnotationChannel, event: AnnotationEvent) {
        let id = event.annotation_id();
        if let Err(error) = channel.publish(&self.document, event) {
            warn!("annotation {id} publish failed, kept unconfirmed: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelError;
    use std::cell::RefCell;

    /// Records published events; optionally refuses them.
    #[derive(Default)]
    struct TestChannel {
        published: RefCell<Vec<AnnotationEvent>>,
        fail: bool,
    }

    impl TestChannel {
        fn failing() -> Self {
            Self { published: RefCell::new(Vec::new()), fail: true }
        }
    }

    impl AnnotationChannel for TestChannel {
        fn publish(
            &self,
            _document: &DocumentId,
            event: AnnotationEvent,
        ) -> Result<(), ChannelError> {
            if self.fail {
                return Err(ChannelError::Publish("backend down".to_owned()));
            }
            self.published.borrow_mut().push(event);
            Ok(())
        }

        fn poll(&self, _document: &DocumentId) -> Vec<AnnotationEvent> {
            Vec::new()
        }
    }

    fn store() -> AnnotationStore {
        AnnotationStore::new(DocumentId::from("doc-1"))
    }

    fn rects() -> Vec<NormalizedRect> {
        vec![NormalizedRect::new(0.1, 0.1, 0.2, 0.05)]
    }

    #[test]
    fn create_is_applied_locally_and_forwarded() {
        let channel = TestChannel::default();
        let mut store = store();

        let id = store.create(&channel, 2, rects(), HighlightColor::Yellow, "alice");

        assert_eq!(store.len(), 1);
        assert_eq!(store.annotations_for_page(2).len(), 1);
        assert_eq!(store.is_confirmed(id), Some(false));
        assert_eq!(channel.published.borrow().len(), 1);
    }

    #[test]
    fn publish_failure_keeps_the_entry_unconfirmed() {
        let channel = TestChannel::failing();
        let mut store = store();

        let id = store.create(&channel, 1, rects(), HighlightColor::Green, "alice");

        // Still visible locally, but flagged as never confirmed.
        assert_eq!(store.len(), 1);
        assert_eq!(store.pending_ids(), vec![id]);
    }

    #[test]
    fn echoed_add_confirms_the_optimistic_entry() {
        let channel = TestChannel::default();
        let mut store = store();

        let id = store.create(&channel, 1, rects(), HighlightColor::Yellow, "alice");
        let echoed = channel.published.borrow()[0].clone();
        store.apply_remote(echoed);

        assert_eq!(store.is_confirmed(id), Some(true));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn duplicate_add_delivery_yields_one_entry() {
        let mut store = store();
        let annotation = Annotation::new(1, rects(), HighlightColor::Blue, "bob");

        store.apply_remote(AnnotationEvent::Add(annotation.clone()));
        store.apply_remote(AnnotationEvent::Add(annotation));

        assert_eq!(store.len(), 1);
    }

    #[test]
    fn remote_update_replaces_the_note_last_write_wins() {
        let mut store = store();
        let mut annotation = Annotation::new(1, rects(), HighlightColor::Blue, "bob");
        store.apply_remote(AnnotationEvent::Add(annotation.clone()));

        annotation.note = Some("second".to_owned());
        store.apply_remote(AnnotationEvent::Update(annotation.clone()));

        assert_eq!(store.get(annotation.id).unwrap().note.as_deref(), Some("second"));
    }

    #[test]
    fn remote_delete_beats_a_pending_local_note_edit() {
        let down = TestChannel::failing();
        let mut store = store();

        let annotation = Annotation::new(1, rects(), HighlightColor::Pink, "alice");
        let id = annotation.id;
        store.apply_remote(AnnotationEvent::Add(annotation));

        // Local edit queued but never reaches the backend.
        assert!(store.update_note(&down, id, Some("my unsent note".to_owned())));
        assert_eq!(store.pending_ids(), vec![id]);

        // The other viewer's delete arrives: the entry ceases to exist.
        store.apply_remote(AnnotationEvent::Delete { id });
        assert!(store.get(id).is_none());
        assert!(store.annotations_for_page(1).is_empty());
    }

    #[test]
    fn delete_is_idempotent() {
        let channel = TestChannel::default();
        let mut store = store();

        let id = store.create(&channel, 1, rects(), HighlightColor::Yellow, "alice");
        assert!(store.delete(&channel, id));
        assert!(!store.delete(&channel, id));

        store.apply_remote(AnnotationEvent::Delete { id });
        assert!(store.is_empty());
    }

    #[test]
    fn update_note_on_unknown_id_is_refused() {
        let channel = TestChannel::default();
        let mut store = store();
        assert!(!store.update_note(&channel, AnnotationId::new_v4(), Some("x".to_owned())));
        assert!(channel.published.borrow().is_empty());
    }

    #[test]
    fn page_view_is_filtered_and_ordered_by_creation_time() {
        let mut store = store();

        let older = Annotation::with_id(
            AnnotationId::new_v4(),
            3,
            rects(),
            HighlightColor::Yellow,
            None,
            "alice",
            100,
        );
        let newer = Annotation::with_id(
            AnnotationId::new_v4(),
            3,
            rects(),
            HighlightColor::Green,
            None,
            "bob",
            200,
        );
        let elsewhere = Annotation::with_id(
            AnnotationId::new_v4(),
            5,
            rects(),
            HighlightColor::Blue,
            None,
            "carol",
            150,
        );

        // Delivered newest-first; the read view reorders.
        store.apply_remote(AnnotationEvent::Add(newer.clone()));
        store.apply_remote(AnnotationEvent::Add(elsewhere));
        store.apply_remote(AnnotationEvent::Add(older.clone()));

        let page = store.annotations_for_page(3);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].id, older.id);
        assert_eq!(page[1].id, newer.id);
    }

    #[test]
    fn clear_empties_the_projection_for_a_document_switch() {
        let channel = TestChannel::default();
        let mut store = store();

        store.create(&channel, 1, rects(), HighlightColor::Yellow, "alice");
        store.clear();
        assert!(store.is_empty());
    }
}
