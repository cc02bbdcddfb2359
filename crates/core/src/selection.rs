//! Turning a completed text selection into a highlight annotation.
//!
//! The live-selection API is inherently host-coupled (in the browser it is
//! the DOM selection), so it sits behind the narrow [`SelectionCapture`]
//! capability: "give me the client-space rectangles of the completed
//! selection, and clear it". Normalization against the page surface and the
//! epsilon filtering are plain logic here, testable without a browser.

use doc_model::{Annotation, HighlightColor, DeviceRect, NormalizedRect, SurfaceBounds};
use log::debug;

use crate::normalize::{clamp_unit, to_normalized};

/// Host capability around the live text selection.
pub trait SelectionCapture {
    /// Client-space bounding rectangles of the completed selection, one per
    /// visual line. Empty for a collapsed selection.
    fn client_rects(&self) -> Vec<DeviceRect>;

    /// Page whose text layer captured the selection release. A selection
    /// spanning multiple pages is attributed to this page only.
    fn page_number(&self) -> u16;

    /// Clear the live selection so the next interaction starts clean.
    fn clear(&mut self);
}

/// Builds annotations from completed selections.
pub struct SelectionTranslator {
    author: String,
    color: HighlightColor,
}

impl SelectionTranslator {
    pub fn new(author: impl Into<String>, color: HighlightColor) -> Self {
        Self { author: author.into(), color }
    }

    pub fn color(&self) -> HighlightColor {
        self.color
    }

    /// Switch the color applied to subsequent selections.
    pub fn set_color(&mut self, color: HighlightColor) {
        self.color = color;
    }

    /// Translate the captured selection into an annotation, or nothing.
    ///
    /// Rects are normalized against the page's current surface bounds,
    /// clipped to the page, and dropped when degenerate. The live selection
    /// is always cleared, whether or not an annotation comes out; a
    /// selection that normalizes to zero usable rects is silently ignored.
    pub fn annotate(
        &self,
        capture: &mut dyn SelectionCapture,
        bounds: SurfaceBounds,
    ) -> Option<Annotation> {
        let rects: Vec<NormalizedRect> = capture
            .client_rects()
            .into_iter()
            .map(|rect| clamp_unit(to_normalized(rect, bounds)))
            .filter(|rect| !rect.is_degenerate())
            .collect();

        let page_number = capture.page_number();
        capture.clear();

        if rects.is_empty() {
            debug!("selection on page {page_number} produced no usable rects");
            return None;
        }

        Some(Annotation::new(page_number, rects, self.color, self.author.clone()))
    }
}
