//! Invisible text layer aligned to a rendered page surface.
//!
//! Span boxes are projected to device pixels at the same scale as the raster
//! beneath them, so native text selection over the layer lines up with the
//! image pixel-for-pixel. The layer is derived state and is rebuilt on every
//! successful render; it is never built for a cancelled attempt.

use doc_model::DeviceRect;

use crate::engine::RawTextSpan;

/// One selectable text span, positioned in device pixels at the rendered scale.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpanBox {
    pub text: String,
    pub rect: DeviceRect,
}

/// The full text layer for one rendered page at one scale.
#[derive(Debug, Clone)]
pub struct TextLayer {
    page_number: u16,
    scale: f32,
    spans: Vec<TextSpanBox>,
}

impl TextLayer {
    /// Project raw page-space spans (points at scale 1) to device pixels.
    pub fn from_raw(page_number: u16, scale: f32, raw: &[RawTextSpan]) -> Self {
        let scale_f = scale as f64;
        let spans = raw
            .iter()
            .map(|span| TextSpanBox {
                text: span.text.clone(),
                rect: DeviceRect::new(
                    span.x as f64 * scale_f,
                    span.y as f64 * scale_f,
                    span.width as f64 * scale_f,
                    span.height as f64 * scale_f,
                ),
            })
            .collect();

        Self { page_number, scale, spans }
    }

    pub fn page_number(&self) -> u16 {
        self.page_number
    }

    /// Scale this layer was built at. Must match the raster it overlays.
    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn spans(&self) -> &[TextSpanBox] {
        &self.spans
    }

    /// Spans intersecting a device-space rectangle.
    pub fn spans_in_rect(&self, rect: &DeviceRect) -> Vec<&TextSpanBox> {
        self.spans
            .iter()
            .filter(|span| rects_overlap(&span.rect, rect))
            .collect()
    }
}

fn rects_overlap(a: &DeviceRect, b: &DeviceRect) -> bool {
    !(a.left + a.width < b.left
        || b.left + b.width < a.left
        || a.top + a.height < b.top
        || b.top + b.height < a.top)
}
