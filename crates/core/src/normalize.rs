//! Conversions between device pixels and the scale-invariant fraction space.
//!
//! All persisted geometry lives in normalized space; device rects exist only
//! transiently, against the surface bounds current at that instant. The two
//! conversions are exact inverses of each other, which is what keeps an
//! annotation pinned to the same text across viewers at different zooms:
//! annotations are never re-normalized on read, only re-projected for
//! drawing.

use doc_model::{DeviceRect, NormalizedRect, SurfaceBounds};

/// Convert a device-space rect to fractions of the surface.
///
/// Empty bounds yield a degenerate rect, which downstream filtering discards.
pub fn to_normalized(device: DeviceRect, bounds: SurfaceBounds) -> NormalizedRect {
    if bounds.is_empty() {
        return NormalizedRect::new(0.0, 0.0, 0.0, 0.0);
    }

    NormalizedRect::new(
        (device.left - bounds.origin_x) / bounds.width,
        (device.top - bounds.origin_y) / bounds.height,
        device.width / bounds.width,
        device.height / bounds.height,
    )
}

/// Project a normalized rect onto the surface for drawing.
pub fn to_device(rect: NormalizedRect, bounds: SurfaceBounds) -> DeviceRect {
    DeviceRect::new(
        rect.x * bounds.width + bounds.origin_x,
        rect.y * bounds.height + bounds.origin_y,
        rect.width * bounds.width,
        rect.height * bounds.height,
    )
}

/// Clip a normalized rect to the unit square.
///
/// Selections can bleed a fraction of a pixel outside the surface; anything
/// fully outside collapses to a degenerate rect.
pub fn clamp_unit(rect: NormalizedRect) -> NormalizedRect {
    let left = rect.x.clamp(0.0, 1.0);
    let top = rect.y.clamp(0.0, 1.0);
    let right = (rect.x + rect.width).clamp(0.0, 1.0);
    let bottom = (rect.y + rect.height).clamp(0.0, 1.0);

    NormalizedRect::new(left, top, (right - left).max(0.0), (bottom - top).max(0.0))
}
