//! Rendering-engine abstraction and the pdfium-backed implementation.
//!
//! The engine is a process-wide resource loaded once and reused. Call sites
//! go through [`PdfiumEngine::shared`] instead of touching any global state
//! directly, and everything above the engine depends on the [`RenderEngine`]
//! and [`EngineDocument`] traits so rendering logic stays testable without a
//! pdfium library on the machine.

use std::sync::OnceLock;

use pdfium_render::prelude::*;

/// Errors from the rendering engine.
///
/// `Init` means the engine itself could not be brought up (no library found
/// at any configured location); `Unreadable` means bytes were obtained but do
/// not parse as a document. Callers treat the first as retryable and the
/// second as not.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("render engine unavailable: {0}")]
    Init(String),

    #[error("document could not be parsed: {0}")]
    Unreadable(String),

    #[error("invalid page index: {0}")]
    InvalidPageIndex(u16),

    #[error("page render failed: {0}")]
    Render(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// A text span in page space at scale 1, top-left origin, units in points.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTextSpan {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Opens raw document bytes into a paginated handle.
pub trait RenderEngine {
    fn open(&self, bytes: Vec<u8>) -> EngineResult<Box<dyn EngineDocument>>;
}

/// An opened, paginated document.
///
/// Page indices are 0-based at this boundary; everything above converts to
/// the 1-indexed page numbers the data model uses.
pub trait EngineDocument {
    fn page_count(&self) -> u16;

    /// Intrinsic page size at scale 1, in points.
    fn page_size(&self, index: u16) -> EngineResult<(f32, f32)>;

    /// Rasterize a page into RGBA bytes (4 per pixel) at the given pixel size.
    fn render_page(&self, index: u16, width: u32, height: u32) -> EngineResult<Vec<u8>>;

    /// Extract positioned text spans for the invisible text layer.
    fn text_spans(&self, index: u16) -> EngineResult<Vec<RawTextSpan>>;
}

/// The pdfium-backed engine.
pub struct PdfiumEngine {
    pdfium: Pdfium,
}

static ENGINE: OnceLock<PdfiumEngine> = OnceLock::new();

impl PdfiumEngine {
    /// Shared process-wide engine, initialized on first use.
    ///
    /// Binding is attempted against an ordered list of locations and the
    /// first that initializes wins; `Init` is returned only if all fail.
    pub fn shared() -> EngineResult<&'static PdfiumEngine> {
        if let Some(engine) = ENGINE.get() {
            return Ok(engine);
        }

        let engine = Self::init()?;
        Ok(ENGINE.get_or_init(|| engine))
    }

    fn init() -> EngineResult<PdfiumEngine> {
        // Executable directory first (bundled library), then the working
        // directory, then the system library path.
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()));

        if let Some(dir) = exe_dir {
            if let Ok(bindings) =
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir))
            {
                return Ok(PdfiumEngine { pdfium: Pdfium::new(bindings) });
            }
        }

        let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| EngineError::Init(e.to_string()))?;

        Ok(PdfiumEngine { pdfium: Pdfium::new(bindings) })
    }
}

impl RenderEngine for &'static PdfiumEngine {
    fn open(&self, bytes: Vec<u8>) -> EngineResult<Box<dyn EngineDocument>> {
        // The document borrows the engine for the process lifetime; the byte
        // buffer has to live at least as long.
        let engine: &'static PdfiumEngine = self;
        let data: &'static [u8] = Box::leak(bytes.into_boxed_slice());
        let document = engine
            .pdfium
            .load_pdf_from_byte_slice(data, None)
            .map_err(|e| EngineError::Unreadable(e.to_string()))?;

        Ok(Box::new(PdfiumDocument { document }))
    }
}

struct PdfiumDocument {
    document: PdfDocument<'static>,
}

impl PdfiumDocument {
    fn page(&self, index: u16) -> EngineResult<PdfPage<'_>> {
        self.document
            .pages()
            .get(index)
            .map_err(|_| EngineError::InvalidPageIndex(index))
    }
}

impl EngineDocument for PdfiumDocument {
    fn page_count(&self) -> u16 {
        self.document.pages().len()
    }

    fn page_size(&self, index: u16) -> EngineResult<(f32, f32)> {
        let page = self.page(index)?;
        Ok((page.width().value, page.height().value))
    }

    fn render_page(&self, index: u16, width: u32, height: u32) -> EngineResult<Vec<u8>> {
        let page = self.page(index)?;

        let config = PdfRenderConfig::new()
            .set_target_width(width as i32)
            .set_target_height(height as i32);

        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| EngineError::Render(e.to_string()))?;

        Ok(bitmap.as_rgba_bytes().to_vec())
    }

    fn text_spans(&self, index: u16) -> EngineResult<Vec<RawTextSpan>> {
        let page = self.page(index)?;
        let page_height = page.height().value;

        let text_page = page
            .text()
            .map_err(|e| EngineError::Render(format!("text extraction failed: {e}")))?;

        let mut spans = Vec::new();
        let mut run = SpanRun::default();

        for ch in text_page.chars().iter() {
            let Some(c) = ch.unicode_char() else { continue };
            let Ok(bounds) = ch.loose_bounds() else { continue };

            if c.is_whitespace() {
                run.flush(&mut spans);
                continue;
            }

            // pdfium reports bottom-left-origin bounds; the text layer uses
            // top-left origin to match the raster.
            run.push(
                c,
                bounds.left().value,
                page_height - bounds.top().value,
                bounds.right().value - bounds.left().value,
                bounds.top().value - bounds.bottom().value,
            );
        }
        run.flush(&mut spans);

        Ok(spans)
    }
}

/// Accumulates consecutive non-whitespace characters into one span.
#[derive(Default)]
struct SpanRun {
    text: String,
    left: f32,
    top: f32,
    right: f32,
    bottom: f32,
}

impl SpanRun {
    fn push(&mut self, c: char, x: f32, y: f32, width: f32, height: f32) {
        if self.text.is_empty() {
            self.left = x;
            self.top = y;
            self.right = x + width;
            self.bottom = y + height;
        } else {
            self.top = self.top.min(y);
            self.right = self.right.max(x + width);
            self.bottom = self.bottom.max(y + height);
        }
        self.text.push(c);
    }

    fn flush(&mut self, spans: &mut Vec<RawTextSpan>) {
        if self.text.is_empty() {
            return;
        }
        spans.push(RawTextSpan {
            text: std::mem::take(&mut self.text),
            x: self.left,
            y: self.top,
            width: self.right - self.left,
            height: self.bottom - self.top,
        });
    }
}
