//! Live cursor broadcast: sample, throttle, publish, merge.
//!
//! Positions travel as fractions of the shared viewport, so viewers with
//! different window sizes still point at comparable spots. Everything here is
//! advisory render-only state. Cursors never gate a data mutation, and two
//! viewers can always annotate the same text at once.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use doc_model::{Cursor, DocumentId, SurfaceBounds};
use log::trace;

use crate::channel::PresenceChannel;

/// Minimum interval between cursor emissions. Raw pointer-move events arrive
/// far faster than this; emitting each one would flood the channel.
pub const EMIT_INTERVAL: Duration = Duration::from_millis(50);

/// A cursor not refreshed within this window is treated as gone. Authoritative
/// connection state lives in the external presence channel, not here.
pub const STALE_AFTER: Duration = Duration::from_secs(5);

/// One viewer's end of the presence stream.
pub struct PresenceBroadcaster {
    document: DocumentId,
    viewer_id: String,
    display_name: String,
    last_emit: Option<Instant>,
    remote: HashMap<String, (Cursor, Instant)>,
}

impl PresenceBroadcaster {
    pub fn new(
        document: DocumentId,
        viewer_id: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            document,
            viewer_id: viewer_id.into(),
            display_name: display_name.into(),
            last_emit: None,
            remote: HashMap::new(),
        }
    }

    pub fn viewer_id(&self) -> &str {
        &self.viewer_id
    }

    /// Handle a raw pointer move at device coordinates within the viewport.
    ///
    /// Emission is throttled to [`EMIT_INTERVAL`]; a publish failure is
    /// logged and dropped; presence is fire-and-forget, latest value wins.
    /// Returns whether an update was actually published.
    pub fn pointer_moved(
        &mut self,
        channel: &dyn PresenceChannel,
        device_x: f64,
        device_y: f64,
        viewport: SurfaceBounds,
        now: Instant,
    ) -> bool {
        if viewport.is_empty() {
            return false;
        }
        if let Some(last) = self.last_emit {
            if now.duration_since(last) < EMIT_INTERVAL {
                return false;
            }
        }

        let x = ((device_x - viewport.origin_x) / viewport.width).clamp(0.0, 1.0);
        let y = ((device_y - viewport.origin_y) / viewport.height).clamp(0.0, 1.0);
        let cursor = Cursor::new(self.viewer_id.clone(), self.display_name.clone(), x, y);

        if let Err(error) = channel.publish(&self.document, cursor) {
            trace!("cursor publish dropped: {error}");
        }
        self.last_emit = Some(now);
        true
    }

    /// Merge one received cursor. The viewer's own echo is ignored; a known
    /// viewer is updated in place, never duplicated.
    pub fn apply_remote(&mut self, cursor: Cursor, now: Instant) {
        if cursor.viewer_id == self.viewer_id {
            return;
        }
        self.remote.insert(cursor.viewer_id.clone(), (cursor, now));
    }

    /// Merge a batch of polled cursor updates.
    pub fn apply_all(&mut self, cursors: impl IntoIterator<Item = Cursor>, now: Instant) {
        for cursor in cursors {
            self.apply_remote(cursor, now);
        }
    }

    /// Cursors fresh enough to draw, ordered by viewer id for stable output.
    pub fn cursors(&self, now: Instant) -> Vec<&Cursor> {
        let mut fresh: Vec<&Cursor> = self
            .remote
            .values()
            .filter(|(_, seen)| now.duration_since(*seen) < STALE_AFTER)
            .map(|(cursor, _)| cursor)
            .collect();

        fresh.sort_by(|a, b| a.viewer_id.cmp(&b.viewer_id));
        fresh
    }

    /// Drop all remote cursors, e.g. when switching documents.
    pub fn clear(&mut self) {
        self.remote.clear();
        self.last_emit = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelError;
    use std::cell::RefCell;

    #[derive(Default)]
    struct TestPresence {
        published: RefCell<Vec<Cursor>>,
        fail: bool,
    }

    impl PresenceChannel for TestPresence {
        fn publish(&self, _document: &DocumentId, cursor: Cursor) -> Result<(), ChannelError> {
            if self.fail {
                return Err(ChannelError::Publish("offline".to_owned()));
            }
            self.published.borrow_mut().push(cursor);
            Ok(())
        }

        fn poll(&self, _document: &DocumentId) -> Vec<Cursor> {
            Vec::new()
        }
    }

    fn broadcaster() -> PresenceBroadcaster {
        PresenceBroadcaster::new(DocumentId::from("doc-1"), "v-self", "Me")
    }

    fn viewport() -> SurfaceBounds {
        SurfaceBounds::new(0.0, 0.0, 1200.0, 800.0)
    }

    #[test]
    fn pointer_position_is_published_as_viewport_fractions() {
        let channel = TestPresence::default();
        let mut presence = broadcaster();

        let emitted = presence.pointer_moved(&channel, 600.0, 400.0, viewport(), Instant::now());
        assert!(emitted);

        let published = channel.published.borrow();
        assert_eq!(published[0].x, 0.5);
        assert_eq!(published[0].y, 0.5);
    }

    #[test]
    fn raw_move_bursts_are_throttled() {
        let channel = TestPresence::default();
        let mut presence = broadcaster();
        let start = Instant::now();

        assert!(presence.pointer_moved(&channel, 10.0, 10.0, viewport(), start));
        assert!(!presence.pointer_moved(
            &channel,
            20.0,
            20.0,
            viewport(),
            start + Duration::from_millis(10)
        ));
        assert!(presence.pointer_moved(
            &channel,
            30.0,
            30.0,
            viewport(),
            start + Duration::from_millis(60)
        ));

        assert_eq!(channel.published.borrow().len(), 2);
    }

    #[test]
    fn positions_outside_the_viewport_are_clamped() {
        let channel = TestPresence::default();
        let mut presence = broadcaster();

        presence.pointer_moved(&channel, -50.0, 9000.0, viewport(), Instant::now());

        let published = channel.published.borrow();
        assert_eq!(published[0].x, 0.0);
        assert_eq!(published[0].y, 1.0);
    }

    #[test]
    fn publish_failure_is_swallowed() {
        let channel = TestPresence { published: RefCell::new(Vec::new()), fail: true };
        let mut presence = broadcaster();

        // Fire-and-forget: the failure neither panics nor blocks throttling.
        assert!(presence.pointer_moved(&channel, 1.0, 1.0, viewport(), Instant::now()));
    }

    #[test]
    fn remote_cursor_updates_in_place_without_duplicates() {
        let mut presence = broadcaster();
        let now = Instant::now();

        presence.apply_remote(Cursor::new("v-b", "Bea", 0.1, 0.1), now);
        presence.apply_remote(Cursor::new("v-b", "Bea", 0.7, 0.7), now);

        let cursors = presence.cursors(now);
        assert_eq!(cursors.len(), 1);
        assert_eq!(cursors[0].x, 0.7);
    }

    #[test]
    fn own_echo_is_suppressed() {
        let mut presence = broadcaster();
        let now = Instant::now();

        presence.apply_remote(Cursor::new("v-self", "Me", 0.2, 0.2), now);
        assert!(presence.cursors(now).is_empty());
    }

    #[test]
    fn stale_cursors_drop_out_of_the_render_list() {
        let mut presence = broadcaster();
        let start = Instant::now();

        presence.apply_remote(Cursor::new("v-b", "Bea", 0.3, 0.3), start);
        assert_eq!(presence.cursors(start + Duration::from_secs(1)).len(), 1);
        assert!(presence.cursors(start + Duration::from_secs(6)).is_empty());
    }

    #[test]
    fn cursor_list_is_ordered_by_viewer_id() {
        let mut presence = broadcaster();
        let now = Instant::now();

        presence.apply_remote(Cursor::new("v-c", "Cy", 0.1, 0.1), now);
        presence.apply_remote(Cursor::new("v-a", "Ann", 0.2, 0.2), now);

        let ids: Vec<&str> = presence.cursors(now).iter().map(|c| c.viewer_id.as_str()).collect();
        assert_eq!(ids, vec!["v-a", "v-c"]);
    }
}
