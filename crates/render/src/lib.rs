//! Page rendering for the collaborative reader.
//!
//! Wraps the process-wide rendering engine behind traits, and runs the
//! per-page render state machine with cooperative cancellation so a stale
//! render can never overwrite a newer one.

pub mod cancel;
pub mod engine;
pub mod page;
pub mod text_layer;

#[cfg(any(test, feature = "test-utils"))]
pub mod stub;

pub use cancel::CancellationToken;
pub use engine::{EngineDocument, EngineError, EngineResult, PdfiumEngine, RawTextSpan, RenderEngine};
pub use page::{
    finish_render, render_page, CommitOutcome, PageHandle, PageRenderer, RasterSurface,
    RenderAttempt, RenderOutcome, RenderState,
};
pub use text_layer::{TextLayer, TextSpanBox};
