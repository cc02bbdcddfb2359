//! One viewer's live session over a document.
//!
//! The session owns the loaded document, one renderer per page, the
//! optimistic annotation store, and the presence broadcaster. An application
//! shell drives it with UI events (navigation, zoom, selection, pointer
//! moves) and polls `sync` on its tick to merge remote state.

use std::time::Instant;

use log::info;
use thiserror::Error;

use coread_collab::{
    AnnotationChannel, AnnotationStore, PresenceBroadcaster, PresenceChannel,
};
use coread_core::loader::{DocumentLoader, DocumentSource, LoadError, LoadRequest, LoadedDocument};
use coread_core::normalize::to_device;
use coread_core::selection::{SelectionCapture, SelectionTranslator};
use coread_render::engine::{EngineError, RenderEngine};
use coread_render::page::{render_page, PageHandle, PageRenderer, RenderOutcome, RenderState};
use coread_render::text_layer::TextLayer;
use doc_model::{
    AnnotationId, Cursor, DeviceRect, DocumentInfo, HighlightColor, SurfaceBounds,
};

use crate::{clamp_zoom, fit_page_percent, fit_width_percent};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no document is open")]
    NoDocument,
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Render(#[from] EngineError),
}

/// A page annotation projected to device space for drawing.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedAnnotation {
    pub id: AnnotationId,
    pub color: HighlightColor,
    /// RGBA the shell composites over the raster.
    pub fill: (u8, u8, u8, u8),
    pub rects: Vec<DeviceRect>,
    pub note: Option<String>,
    pub author: String,
}

struct OpenDocument<C> {
    document: LoadedDocument,
    renderers: Vec<PageRenderer>,
    store: AnnotationStore,
    presence: PresenceBroadcaster,
    channel: C,
    current_page: u16,
    zoom_percent: u16,
    page_origin: (f64, f64),
}

pub struct Session<E: RenderEngine, C> {
    loader: DocumentLoader<E>,
    viewer_id: String,
    display_name: String,
    translator: SelectionTranslator,
    viewport_width_px: f32,
    viewport_height_px: f32,
    dpr: f32,
    open: Option<OpenDocument<C>>,
}

impl<E, C> Session<E, C>
where
    E: RenderEngine,
    C: AnnotationChannel + PresenceChannel,
{
    pub fn new(engine: E, viewer_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        let display_name = display_name.into();
        Self {
            loader: DocumentLoader::new(engine),
            viewer_id: viewer_id.into(),
            translator: SelectionTranslator::new(display_name.clone(), HighlightColor::default()),
            display_name,
            viewport_width_px: 1280.0,
            viewport_height_px: 800.0,
            dpr: 1.0,
            open: None,
        }
    }

    pub fn set_viewport(&mut self, width_px: f32, height_px: f32, dpr: f32) {
        self.viewport_width_px = width_px;
        self.viewport_height_px = height_px;
        self.dpr = dpr.max(0.1);
    }

    /// Load a document and make it the session's current one.
    ///
    /// All state from the previous document is discarded: renderers,
    /// annotations, remote cursors. A load failure leaves the previous
    /// document open untouched.
    pub fn open_document(
        &mut self,
        request: LoadRequest,
        sources: &[Box<dyn DocumentSource>],
        channel: C,
    ) -> Result<&DocumentInfo, SessionError> {
        let document = self.loader.load(request, sources)?;
        let renderers: Vec<PageRenderer> =
            document.pages().iter().map(|handle| PageRenderer::new(*handle)).collect();

        let id = document.info().id.clone();
        info!("session {} switched to document {id}", self.viewer_id);

        self.open = Some(OpenDocument {
            store: AnnotationStore::new(id.clone()),
            presence: PresenceBroadcaster::new(id, self.viewer_id.clone(), self.display_name.clone()),
            document,
            renderers,
            channel,
            current_page: 1,
            zoom_percent: 100,
            page_origin: (0.0, 0.0),
        });
        self.render_current()?;

        let open = self.open.as_ref().ok_or(SessionError::NoDocument)?;
        Ok(open.document.info())
    }

    pub fn document_info(&self) -> Option<&DocumentInfo> {
        self.open.as_ref().map(|open| open.document.info())
    }

    pub fn page_count(&self) -> u16 {
        self.open.as_ref().map(|open| open.document.page_count()).unwrap_or(0)
    }

    pub fn current_page(&self) -> Option<u16> {
        self.open.as_ref().map(|open| open.current_page)
    }

    pub fn zoom_percent(&self) -> Option<u16> {
        self.open.as_ref().map(|open| open.zoom_percent)
    }

    /// Navigate to a 1-indexed page, clamped to the document's range.
    pub fn go_to_page(&mut self, page_number: u16) -> Result<RenderOutcome, SessionError> {
        let open = self.open.as_mut().ok_or(SessionError::NoDocument)?;
        let target = page_number.clamp(1, open.document.page_count());

        if target == open.current_page {
            let renderer = &open.renderers[target as usize - 1];
            if renderer.state() == RenderState::Rendered {
                return Ok(RenderOutcome::Rendered);
            }
        } else {
            // Anything in flight for the page being left is wasted work.
            open.renderers[open.current_page as usize - 1].cancel();
            open.current_page = target;
        }

        self.render_current()
    }

    /// Set the zoom percent, clamped to the supported range. The current
    /// page re-renders at the new scale; the previous surface stays up until
    /// the new one commits.
    pub fn set_zoom(&mut self, percent: u16) -> Result<RenderOutcome, SessionError> {
        let open = self.open.as_mut().ok_or(SessionError::NoDocument)?;
        let clamped = clamp_zoom(percent);

        if clamped == open.zoom_percent {
            return Ok(RenderOutcome::Rendered);
        }

        open.zoom_percent = clamped;
        self.render_current()
    }

    pub fn fit_width(&mut self) -> Result<RenderOutcome, SessionError> {
        let handle = self.current_handle()?;
        let percent = fit_width_percent(self.viewport_width_px, handle.width_pt, self.dpr);
        self.set_zoom(percent)
    }

    pub fn fit_page(&mut self) -> Result<RenderOutcome, SessionError> {
        let handle = self.current_handle()?;
        let percent = fit_page_percent(
            self.viewport_width_px,
            self.viewport_height_px,
            handle.width_pt,
            handle.height_pt,
            self.dpr,
        );
        self.set_zoom(percent)
    }

    /// Where the current page's surface sits in device space.
    pub fn set_page_origin(&mut self, x: f64, y: f64) {
        if let Some(open) = self.open.as_mut() {
            open.page_origin = (x, y);
        }
    }

    /// Bounds of the current page's committed surface, if one exists.
    pub fn surface_bounds(&self) -> Option<SurfaceBounds> {
        let open = self.open.as_ref()?;
        let renderer = &open.renderers[open.current_page as usize - 1];
        renderer.surface_bounds(open.page_origin.0, open.page_origin.1)
    }

    /// Text layer of the current page, present only after a committed render.
    pub fn text_layer(&self) -> Option<&TextLayer> {
        let open = self.open.as_ref()?;
        open.renderers[open.current_page as usize - 1].text_layer()
    }

    /// Text of the current page under a device-space region, for copy or
    /// note prefill. `None` until a surface commits.
    pub fn text_in_region(&self, region: DeviceRect) -> Option<String> {
        let open = self.open.as_ref()?;
        let layer = self.text_layer()?;

        // Span boxes live in surface-local pixels; shift the region by the
        // page origin before querying.
        let local = DeviceRect::new(
            region.left - open.page_origin.0,
            region.top - open.page_origin.1,
            region.width,
            region.height,
        );
        let parts: Vec<&str> =
            layer.spans_in_rect(&local).into_iter().map(|span| span.text.as_str()).collect();
        Some(parts.join(" "))
    }

    pub fn highlight_color(&self) -> HighlightColor {
        self.translator.color()
    }

    pub fn set_highlight_color(&mut self, color: HighlightColor) {
        self.translator.set_color(color);
    }

    /// Turn a finished selection into an annotation on the current page.
    ///
    /// The capture is always cleared. Returns the new annotation's id, or
    /// `None` when the selection normalized to nothing usable or no surface
    /// is committed yet.
    pub fn selection_completed(
        &mut self,
        capture: &mut dyn SelectionCapture,
    ) -> Option<AnnotationId> {
        let bounds = match self.surface_bounds() {
            Some(bounds) => bounds,
            None => {
                capture.clear();
                return None;
            }
        };

        let annotation = self.translator.annotate(capture, bounds)?;
        let id = annotation.id;
        let open = self.open.as_mut()?;
        open.store.insert(&open.channel, annotation);
        Some(id)
    }

    /// Replace an annotation's note. Last write wins.
    pub fn update_note(&mut self, id: AnnotationId, note: Option<String>) -> bool {
        match self.open.as_mut() {
            Some(open) => open.store.update_note(&open.channel, id, note),
            None => false,
        }
    }

    /// Delete an annotation by id. Any viewer may delete any annotation.
    pub fn delete_annotation(&mut self, id: AnnotationId) -> bool {
        match self.open.as_mut() {
            Some(open) => open.store.delete(&open.channel, id),
            None => false,
        }
    }

    pub fn store(&self) -> Option<&AnnotationStore> {
        self.open.as_ref().map(|open| &open.store)
    }

    /// Current-page annotations projected onto the committed surface, in
    /// draw order. Empty until a surface commits.
    pub fn projected_annotations(&self) -> Vec<ProjectedAnnotation> {
        let Some(open) = self.open.as_ref() else {
            return Vec::new();
        };
        let Some(bounds) = self.surface_bounds() else {
            return Vec::new();
        };

        open.store
            .annotations_for_page(open.current_page)
            .into_iter()
            .map(|annotation| ProjectedAnnotation {
                id: annotation.id,
                color: annotation.color,
                fill: annotation.color.rgba(),
                rects: annotation.rects.iter().map(|rect| to_device(*rect, bounds)).collect(),
                note: annotation.note.clone(),
                author: annotation.author.clone(),
            })
            .collect()
    }

    /// Forward a raw pointer move to presence. Throttled internally.
    pub fn pointer_moved(&mut self, device_x: f64, device_y: f64, now: Instant) -> bool {
        let viewport = SurfaceBounds::new(
            0.0,
            0.0,
            self.viewport_width_px as f64,
            self.viewport_height_px as f64,
        );
        match self.open.as_mut() {
            Some(open) => {
                open.presence.pointer_moved(&open.channel, device_x, device_y, viewport, now)
            }
            None => false,
        }
    }

    /// Drain both channels and merge what arrived.
    pub fn sync(&mut self, now: Instant) {
        let Some(open) = self.open.as_mut() else {
            return;
        };

        let events = AnnotationChannel::poll(&open.channel, open.store.document());
        open.store.apply_all(events);

        let cursors = PresenceChannel::poll(&open.channel, open.store.document());
        open.presence.apply_all(cursors, now);
    }

    /// Remote cursors fresh enough to draw.
    pub fn cursors(&self, now: Instant) -> Vec<&Cursor> {
        match self.open.as_ref() {
            Some(open) => open.presence.cursors(now),
            None => Vec::new(),
        }
    }

    fn current_handle(&self) -> Result<PageHandle, SessionError> {
        let open = self.open.as_ref().ok_or(SessionError::NoDocument)?;
        open.document.page(open.current_page).ok_or(SessionError::NoDocument)
    }

    fn render_current(&mut self) -> Result<RenderOutcome, SessionError> {
        let dpr = self.dpr;
        let open = self.open.as_mut().ok_or(SessionError::NoDocument)?;
        let scale = (open.zoom_percent as f32 / 100.0) * dpr;
        let renderer = &mut open.renderers[open.current_page as usize - 1];
        let outcome = render_page(open.document.engine_document(), renderer, scale)?;
        Ok(outcome)
    }
}
