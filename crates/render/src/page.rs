//! Per-page render state machine with cancellation.
//!
//! Each page runs `Idle → Rendering → {Rendered | Cancelled}`. Beginning a
//! new attempt while one is in flight cancels the old token first, and a
//! commit from a superseded attempt never reaches the shared surface. That is
//! the guard against a slow stale render overwriting a newer one when zoom or
//! page changes arrive mid-flight.

use doc_model::SurfaceBounds;
use log::{debug, warn};

use crate::cancel::CancellationToken;
use crate::engine::{EngineDocument, EngineError, EngineResult, RawTextSpan};
use crate::text_layer::TextLayer;

/// Handle to one page of a loaded document, materialized eagerly at load.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageHandle {
    /// Page number, 1-indexed.
    pub page_number: u16,
    /// Intrinsic width in points at scale 1.
    pub width_pt: f32,
    /// Intrinsic height in points at scale 1.
    pub height_pt: f32,
}

impl PageHandle {
    /// Pixel size of the surface this page occupies at a scale.
    pub fn pixel_size(&self, scale: f32) -> (u32, u32) {
        let width = (self.width_pt * scale).round().max(1.0) as u32;
        let height = (self.height_pt * scale).round().max(1.0) as u32;
        (width, height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    Idle,
    Rendering,
    Rendered,
    Cancelled,
}

/// Rasterized page pixels, valid for exactly one scale.
#[derive(Debug, Clone)]
pub struct RasterSurface {
    pub width: u32,
    pub height: u32,
    pub scale: f32,
    /// RGBA, 4 bytes per pixel, row-major.
    pub pixels: Vec<u8>,
}

/// One render attempt. Owns the cancellation token for its lifetime.
#[derive(Debug)]
pub struct RenderAttempt {
    generation: u64,
    token: CancellationToken,
    scale: f32,
    target_width: u32,
    target_height: u32,
}

impl RenderAttempt {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn target_size(&self) -> (u32, u32) {
        (self.target_width, self.target_height)
    }
}

/// Whether a commit reached the surface or was discarded as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    Stale,
}

/// Final outcome of driving one render request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Rendered,
    /// Superseded or navigated away mid-flight. Expected and silent; never a
    /// failure.
    Cancelled,
}

/// Render state for a single page.
pub struct PageRenderer {
    handle: PageHandle,
    state: RenderState,
    generation: u64,
    inflight: Option<CancellationToken>,
    surface: Option<RasterSurface>,
    text_layer: Option<TextLayer>,
}

impl PageRenderer {
    pub fn new(handle: PageHandle) -> Self {
        Self {
            handle,
            state: RenderState::Idle,
            generation: 0,
            inflight: None,
            surface: None,
            text_layer: None,
        }
    }

    pub fn handle(&self) -> PageHandle {
        self.handle
    }

    pub fn page_number(&self) -> u16 {
        self.handle.page_number
    }

    pub fn state(&self) -> RenderState {
        self.state
    }

    /// Start a new render attempt at the given scale.
    ///
    /// Any in-flight attempt for this page is cancelled first; the most
    /// recent request always wins.
    pub fn begin(&mut self, scale: f32) -> RenderAttempt {
        if let Some(previous) = self.inflight.take() {
            previous.cancel();
            debug!(
                "page {}: render superseded at generation {}",
                self.handle.page_number, self.generation
            );
        }

        self.generation += 1;
        let token = CancellationToken::new();
        self.inflight = Some(token.clone());
        self.state = RenderState::Rendering;

        let (target_width, target_height) = self.handle.pixel_size(scale);
        RenderAttempt { generation: self.generation, token, scale, target_width, target_height }
    }

    /// Commit a finished raster plus its text spans.
    ///
    /// A cancelled or superseded attempt is rejected without touching the
    /// surface or the text layer. The text layer is only ever built here,
    /// after the raster succeeded.
    pub fn commit(
        &mut self,
        attempt: &RenderAttempt,
        pixels: Vec<u8>,
        spans: Vec<RawTextSpan>,
    ) -> CommitOutcome {
        if attempt.token.is_cancelled() || attempt.generation != self.generation {
            return CommitOutcome::Stale;
        }

        self.surface = Some(RasterSurface {
            width: attempt.target_width,
            height: attempt.target_height,
            scale: attempt.scale,
            pixels,
        });
        self.text_layer = Some(TextLayer::from_raw(self.handle.page_number, attempt.scale, &spans));
        self.inflight = None;
        self.state = RenderState::Rendered;
        CommitOutcome::Committed
    }

    /// Record a genuine render fault for the current attempt.
    ///
    /// The page keeps its last-good surface; a stale attempt's failure is
    /// ignored entirely.
    pub fn fail(&mut self, attempt: &RenderAttempt, error: &EngineError) {
        if attempt.generation != self.generation {
            return;
        }

        warn!("page {}: render failed: {error}", self.handle.page_number);
        self.inflight = None;
        self.state = if self.surface.is_some() { RenderState::Rendered } else { RenderState::Idle };
    }

    /// Cancel any in-flight attempt, e.g. when navigating away from the page.
    pub fn cancel(&mut self) {
        if let Some(token) = self.inflight.take() {
            token.cancel();
            self.state = RenderState::Cancelled;
        }
    }

    pub fn surface(&self) -> Option<&RasterSurface> {
        self.surface.as_ref()
    }

    pub fn text_layer(&self) -> Option<&TextLayer> {
        self.text_layer.as_ref()
    }

    /// Device-space bounds of the committed surface at the given origin.
    pub fn surface_bounds(&self, origin_x: f64, origin_y: f64) -> Option<SurfaceBounds> {
        self.surface.as_ref().map(|surface| {
            SurfaceBounds::new(origin_x, origin_y, surface.width as f64, surface.height as f64)
        })
    }
}

/// Drive one full render request: begin, rasterize, extract text, commit.
pub fn render_page(
    document: &dyn EngineDocument,
    renderer: &mut PageRenderer,
    scale: f32,
) -> EngineResult<RenderOutcome> {
    let attempt = renderer.begin(scale);
    finish_render(document, renderer, &attempt)
}

/// Complete an already-begun attempt.
///
/// Split from [`render_page`] so callers interleaving requests can hold the
/// attempt across suspension points.
pub fn finish_render(
    document: &dyn EngineDocument,
    renderer: &mut PageRenderer,
    attempt: &RenderAttempt,
) -> EngineResult<RenderOutcome> {
    // An attempt already cancelled does no raster work at all.
    if attempt.token().is_cancelled() {
        return Ok(RenderOutcome::Cancelled);
    }

    let index = renderer.page_number() - 1;
    let (width, height) = attempt.target_size();

    let pixels = match document.render_page(index, width, height) {
        Ok(pixels) => pixels,
        Err(error) => {
            // A fault in a cancelled attempt is noise, not a failure.
            if attempt.token().is_cancelled() {
                return Ok(RenderOutcome::Cancelled);
            }
            renderer.fail(attempt, &error);
            return Err(error);
        }
    };

    // The text layer step is skipped entirely when the attempt was cancelled
    // while the raster was in progress.
    if attempt.token().is_cancelled() {
        return Ok(RenderOutcome::Cancelled);
    }

    let spans = match document.text_spans(index) {
        Ok(spans) => spans,
        Err(error) => {
            if attempt.token().is_cancelled() {
                return Ok(RenderOutcome::Cancelled);
            }
            renderer.fail(attempt, &error);
            return Err(error);
        }
    };

    match renderer.commit(attempt, pixels, spans) {
        CommitOutcome::Committed => Ok(RenderOutcome::Rendered),
        CommitOutcome::Stale => Ok(RenderOutcome::Cancelled),
    }
}
