//! Two viewer sessions sharing one in-memory bus, exercising the full
//! annotate / sync / edit / delete flow the way an application shell would.

use std::time::Instant;

use coread_collab::{MemoryBus, MemoryClient};
use coread_core::loader::{DocumentSource, LoadRequest, MemorySource};
use coread_core::selection::SelectionCapture;
use coread_render::stub::StubEngine;
use doc_model::{DeviceRect, DocumentId};
use viewer_core::Session;

struct FixedCapture {
    rects: Vec<DeviceRect>,
    page_number: u16,
}

impl SelectionCapture for FixedCapture {
    fn client_rects(&self) -> Vec<DeviceRect> {
        self.rects.clone()
    }

    fn page_number(&self) -> u16 {
        self.page_number
    }

    fn clear(&mut self) {}
}

fn sources() -> Vec<Box<dyn DocumentSource>> {
    vec![Box::new(MemorySource::new("primary", b"%PDF-stub".to_vec()))]
}

fn open_session(bus: &MemoryBus, viewer: &str) -> Session<StubEngine, MemoryClient> {
    let mut session = Session::new(StubEngine::new(2, 600.0, 800.0), viewer, viewer);
    let request = LoadRequest {
        id: DocumentId::from("shared-doc"),
        source_url: "https://docs.example/shared-doc.pdf".to_owned(),
        display_name: "shared-doc.pdf".to_owned(),
    };
    let client = bus.client(&DocumentId::from("shared-doc"));
    session.open_document(request, &sources(), client).map(|_| ()).unwrap();
    session
}

fn highlight(session: &mut Session<StubEngine, MemoryClient>) -> doc_model::AnnotationId {
    let mut capture = FixedCapture {
        rects: vec![DeviceRect::new(60.0, 80.0, 120.0, 40.0)],
        page_number: 1,
    };
    session.selection_completed(&mut capture).unwrap()
}

#[test]
fn own_echo_confirms_an_optimistic_annotation() {
    let bus = MemoryBus::new();
    let mut alice = open_session(&bus, "v-alice");

    let id = highlight(&mut alice);
    let store = alice.store().unwrap();
    assert_eq!(store.is_confirmed(id), Some(false));
    assert_eq!(store.pending_ids(), vec![id]);

    alice.sync(Instant::now());
    assert_eq!(alice.store().unwrap().is_confirmed(id), Some(true));
    assert!(alice.store().unwrap().pending_ids().is_empty());
}

#[test]
fn note_edits_propagate_and_last_write_wins() {
    let bus = MemoryBus::new();
    let mut alice = open_session(&bus, "v-alice");
    let mut bob = open_session(&bus, "v-bob");

    let id = highlight(&mut alice);
    bob.sync(Instant::now());
    assert!(bob.store().unwrap().get(id).is_some());

    assert!(bob.update_note(id, Some("key passage".to_owned())));
    alice.sync(Instant::now());
    assert_eq!(
        alice.store().unwrap().get(id).unwrap().note.as_deref(),
        Some("key passage")
    );

    // Concurrent edits: whoever's update arrives last owns the note.
    assert!(alice.update_note(id, Some("revisit".to_owned())));
    bob.sync(Instant::now());
    assert_eq!(bob.store().unwrap().get(id).unwrap().note.as_deref(), Some("revisit"));
}

#[test]
fn remote_delete_beats_a_pending_local_edit() {
    let bus = MemoryBus::new();
    let mut alice = open_session(&bus, "v-alice");
    let mut bob = open_session(&bus, "v-bob");

    let id = highlight(&mut alice);
    bob.sync(Instant::now());

    // Alice edits while Bob deletes; both have published but neither synced.
    alice.update_note(id, Some("still thinking".to_owned()));
    assert!(bob.delete_annotation(id));

    alice.sync(Instant::now());
    assert!(alice.store().unwrap().get(id).is_none());
    assert!(alice.projected_annotations().is_empty());
}

#[test]
fn deleting_an_already_deleted_annotation_is_a_no_op() {
    let bus = MemoryBus::new();
    let mut alice = open_session(&bus, "v-alice");
    let mut bob = open_session(&bus, "v-bob");

    let id = highlight(&mut alice);
    bob.sync(Instant::now());

    assert!(bob.delete_annotation(id));
    alice.sync(Instant::now());

    // The annotation is gone on both sides; a second delete reports false.
    assert!(!alice.delete_annotation(id));
    assert!(!bob.delete_annotation(id));
}

#[test]
fn annotations_only_show_on_their_own_page() {
    let bus = MemoryBus::new();
    let mut alice = open_session(&bus, "v-alice");

    highlight(&mut alice);
    assert_eq!(alice.projected_annotations().len(), 1);

    alice.go_to_page(2).unwrap();
    assert!(alice.projected_annotations().is_empty());

    alice.go_to_page(1).unwrap();
    assert_eq!(alice.projected_annotations().len(), 1);
}

#[test]
fn reprojection_follows_zoom_changes() {
    let bus = MemoryBus::new();
    let mut alice = open_session(&bus, "v-alice");

    highlight(&mut alice);
    let at_100 = alice.projected_annotations();
    assert_eq!(at_100[0].rects[0], DeviceRect::new(60.0, 80.0, 120.0, 40.0));

    alice.set_zoom(200).unwrap();
    let at_200 = alice.projected_annotations();
    assert_eq!(at_200[0].rects[0], DeviceRect::new(120.0, 160.0, 240.0, 80.0));
}
