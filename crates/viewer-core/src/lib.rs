//! Viewer session state: zoom and page navigation, annotation projection,
//! and the glue between loading, rendering, and collaboration.

pub mod session;

pub use session::{ProjectedAnnotation, Session, SessionError};

pub const MIN_ZOOM_PERCENT: u16 = 10;
pub const MAX_ZOOM_PERCENT: u16 = 1600;

pub fn clamp_zoom(percent: u16) -> u16 {
    percent.clamp(MIN_ZOOM_PERCENT, MAX_ZOOM_PERCENT)
}

pub fn fit_width_percent(viewport_width_px: f32, page_width_pt: f32, dpr: f32) -> u16 {
    if viewport_width_px <= 0.0 || page_width_pt <= 0.0 || dpr <= 0.0 {
        return 100;
    }

    ((viewport_width_px / (page_width_pt * dpr)) * 100.0)
        .round()
        .clamp(MIN_ZOOM_PERCENT as f32, MAX_ZOOM_PERCENT as f32) as u16
}

pub fn fit_page_percent(
    viewport_width_px: f32,
    viewport_height_px: f32,
    page_width_pt: f32,
    page_height_pt: f32,
    dpr: f32,
) -> u16 {
    if viewport_width_px <= 0.0
        || viewport_height_px <= 0.0
        || page_width_pt <= 0.0
        || page_height_pt <= 0.0
        || dpr <= 0.0
    {
        return 100;
    }

    let width = viewport_width_px / (page_width_pt * dpr);
    let height = viewport_height_px / (page_height_pt * dpr);

    (width.min(height) * 100.0)
        .round()
        .clamp(MIN_ZOOM_PERCENT as f32, MAX_ZOOM_PERCENT as f32) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_width_respects_expected_scale() {
        assert_eq!(fit_width_percent(1000.0, 500.0, 1.0), 200);
        assert_eq!(fit_width_percent(100_000.0, 100.0, 1.0), 1600);
    }

    #[test]
    fn fit_page_uses_smallest_dimension_ratio() {
        assert_eq!(fit_page_percent(1000.0, 800.0, 500.0, 2000.0, 1.0), 40);
    }

    #[test]
    fn degenerate_inputs_fall_back_to_actual_size() {
        assert_eq!(fit_width_percent(0.0, 500.0, 1.0), 100);
        assert_eq!(fit_page_percent(1000.0, 800.0, 500.0, 0.0, 1.0), 100);
    }

    #[test]
    fn zoom_is_clamped_to_the_supported_range() {
        assert_eq!(clamp_zoom(5), MIN_ZOOM_PERCENT);
        assert_eq!(clamp_zoom(100), 100);
        assert_eq!(clamp_zoom(9999), MAX_ZOOM_PERCENT);
    }
}
