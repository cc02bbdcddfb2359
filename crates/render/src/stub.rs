//! In-memory engine stand-ins for tests.
//!
//! Available to downstream crates through the `test-utils` feature so loader
//! and session tests can run without a pdfium library installed.

use std::cell::Cell;
use std::collections::HashMap;

use crate::engine::{EngineDocument, EngineError, EngineResult, RawTextSpan, RenderEngine};

/// Byte prefix that makes [`StubEngine::open`] report unreadable content.
pub const CORRUPT_PREFIX: u8 = b'!';

/// A paginated document with fixed page sizes and scripted text spans.
pub struct StubDocument {
    sizes: Vec<(f32, f32)>,
    spans: HashMap<u16, Vec<RawTextSpan>>,
    render_calls: Cell<usize>,
    text_calls: Cell<usize>,
    fail_next_render: Cell<bool>,
}

impl StubDocument {
    /// A document with `count` pages, all of the same intrinsic size.
    pub fn with_pages(count: u16, width_pt: f32, height_pt: f32) -> Self {
        Self {
            sizes: vec![(width_pt, height_pt); count as usize],
            spans: HashMap::new(),
            render_calls: Cell::new(0),
            text_calls: Cell::new(0),
            fail_next_render: Cell::new(false),
        }
    }

    /// Script the text spans returned for a 0-based page index.
    pub fn set_spans(&mut self, index: u16, spans: Vec<RawTextSpan>) {
        self.spans.insert(index, spans);
    }

    /// Make the next `render_page` call fail with a render error.
    pub fn fail_next_render(&self) {
        self.fail_next_render.set(true);
    }

    pub fn render_calls(&self) -> usize {
        self.render_calls.get()
    }

    pub fn text_calls(&self) -> usize {
        self.text_calls.get()
    }
}

impl EngineDocument for StubDocument {
    fn page_count(&self) -> u16 {
        self.sizes.len() as u16
    }

    fn page_size(&self, index: u16) -> EngineResult<(f32, f32)> {
        self.sizes
            .get(index as usize)
            .copied()
            .ok_or(EngineError::InvalidPageIndex(index))
    }

    fn render_page(&self, index: u16, width: u32, height: u32) -> EngineResult<Vec<u8>> {
        self.render_calls.set(self.render_calls.get() + 1);

        if index as usize >= self.sizes.len() {
            return Err(EngineError::InvalidPageIndex(index));
        }
        if self.fail_next_render.take() {
            return Err(EngineError::Render("scripted failure".to_owned()));
        }

        // Deterministic fill derived from the target size, so tests can tell
        // which request produced a surface.
        let fill = (width % 251) as u8;
        Ok(vec![fill; (width * height * 4) as usize])
    }

    fn text_spans(&self, index: u16) -> EngineResult<Vec<RawTextSpan>> {
        self.text_calls.set(self.text_calls.get() + 1);

        if index as usize >= self.sizes.len() {
            return Err(EngineError::InvalidPageIndex(index));
        }
        Ok(self.spans.get(&index).cloned().unwrap_or_default())
    }
}

/// An engine whose documents all share one page geometry.
pub struct StubEngine {
    page_count: u16,
    width_pt: f32,
    height_pt: f32,
    spans: HashMap<u16, Vec<RawTextSpan>>,
}

impl StubEngine {
    pub fn new(page_count: u16, width_pt: f32, height_pt: f32) -> Self {
        Self { page_count, width_pt, height_pt, spans: HashMap::new() }
    }

    /// Script the text spans every opened document reports for a 0-based
    /// page index.
    pub fn set_spans(&mut self, index: u16, spans: Vec<RawTextSpan>) {
        self.spans.insert(index, spans);
    }
}

impl RenderEngine for StubEngine {
    fn open(&self, bytes: Vec<u8>) -> EngineResult<Box<dyn EngineDocument>> {
        if bytes.first() == Some(&CORRUPT_PREFIX) {
            return Err(EngineError::Unreadable("corrupt fixture".to_owned()));
        }

        let mut document = StubDocument::with_pages(self.page_count, self.width_pt, self.height_pt);
        for (index, spans) in &self.spans {
            document.set_spans(*index, spans.clone());
        }
        Ok(Box::new(document))
    }
}
