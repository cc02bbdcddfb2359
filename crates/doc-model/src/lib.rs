use serde::{Deserialize, Serialize};

/// Smallest normalized extent considered a real selection. Rects narrower or
/// shorter than this are artifacts of a collapsed browser selection and are
/// never persisted.
pub const MIN_NORMALIZED_EXTENT: f64 = 1e-3;

/// Tolerance for floating-point comparison of normalized coordinates.
pub const COORD_TOLERANCE: f64 = 1e-9;

/// Identifier of a document as issued by the external backend.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub String);

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Unique identifier for an annotation, stable across all viewers.
pub type AnnotationId = uuid::Uuid;

/// A rectangle expressed as fractions of a page surface at scale 1.
///
/// All four fields live in [0, 1]. This is the only geometry representation
/// ever persisted or put on the wire; it is independent of any viewer's zoom,
/// so two viewers at different zooms agree on where a highlight sits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl NormalizedRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// A near-zero selection that should be discarded, never persisted.
    pub fn is_degenerate(&self) -> bool {
        self.width < MIN_NORMALIZED_EXTENT || self.height < MIN_NORMALIZED_EXTENT
    }

    /// All four fields within the closed unit interval.
    pub fn is_unit(&self) -> bool {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        in_unit(self.x)
            && in_unit(self.y)
            && in_unit(self.width)
            && in_unit(self.height)
            && self.x + self.width <= 1.0 + COORD_TOLERANCE
            && self.y + self.height <= 1.0 + COORD_TOLERANCE
    }

    pub fn approx_eq(&self, other: &NormalizedRect, tolerance: f64) -> bool {
        (self.x - other.x).abs() <= tolerance
            && (self.y - other.y).abs() <= tolerance
            && (self.width - other.width).abs() <= tolerance
            && (self.height - other.height).abs() <= tolerance
    }
}

/// A rectangle in device pixels, relative to the viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl DeviceRect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self { left, top, width, height }
    }
}

/// Position and size of a rendered page surface in device pixels.
///
/// Changes on every zoom or page change; all normalization and re-projection
/// go through the bounds current at that moment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceBounds {
    pub origin_x: f64,
    pub origin_y: f64,
    pub width: f64,
    pub height: f64,
}

impl SurfaceBounds {
    pub fn new(origin_x: f64, origin_y: f64, width: f64, height: f64) -> Self {
        Self { origin_x, origin_y, width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Fixed highlight palette shared by all viewers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightColor {
    Yellow,
    Green,
    Blue,
    Pink,
    Orange,
}

impl HighlightColor {
    pub const PALETTE: [HighlightColor; 5] = [
        HighlightColor::Yellow,
        HighlightColor::Green,
        HighlightColor::Blue,
        HighlightColor::Pink,
        HighlightColor::Orange,
    ];

    /// RGBA used when drawing the highlight over the raster.
    pub fn rgba(&self) -> (u8, u8, u8, u8) {
        match self {
            HighlightColor::Yellow => (255, 225, 60, 110),
            HighlightColor::Green => (95, 215, 120, 110),
            HighlightColor::Blue => (90, 170, 255, 110),
            HighlightColor::Pink => (255, 130, 200, 110),
            HighlightColor::Orange => (255, 170, 70, 110),
        }
    }

}

impl Default for HighlightColor {
    fn default() -> Self {
        HighlightColor::Yellow
    }
}

/// A highlight with an optional note, anchored to one page of one document.
///
/// Geometry is append-only: the rect list is fixed at creation. The note is
/// the only mutable field and is replaced whole, never diffed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: AnnotationId,
    /// Page number, 1-indexed.
    pub page_number: u16,
    /// One rect per visual line of the originating selection.
    pub rects: Vec<NormalizedRect>,
    pub color: HighlightColor,
    #[serde(default)]
    pub note: Option<String>,
    pub author: String,
    /// Unix timestamp in seconds.
    pub created_at: i64,
}

impl Annotation {
    /// Create a new annotation with a generated id and the current timestamp.
    pub fn new(
        page_number: u16,
        rects: Vec<NormalizedRect>,
        color: HighlightColor,
        author: impl Into<String>,
    ) -> Self {
        Self {
            id: AnnotationId::new_v4(),
            page_number,
            rects,
            color,
            note: None,
            author: author.into(),
            created_at: unix_now(),
        }
    }

    /// Rebuild an annotation with a known id (remote events, deserialization).
    #[allow(clippy::too_many_arguments)]
    pub fn with_id(
        id: AnnotationId,
        page_number: u16,
        rects: Vec<NormalizedRect>,
        color: HighlightColor,
        note: Option<String>,
        author: impl Into<String>,
        created_at: i64,
    ) -> Self {
        Self { id, page_number, rects, color, note, author: author.into(), created_at }
    }
}

/// Ephemeral pointer position of one connected viewer.
///
/// Coordinates are fractions of the shared viewport's bounding box. Cursors
/// are never persisted; recency tracking lives with the receiver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    pub viewer_id: String,
    pub display_name: String,
    pub x: f64,
    pub y: f64,
}

impl Cursor {
    pub fn new(viewer_id: impl Into<String>, display_name: impl Into<String>, x: f64, y: f64) -> Self {
        Self { viewer_id: viewer_id.into(), display_name: display_name.into(), x, y }
    }
}

/// Immutable description of a loaded document.
///
/// Replaced wholesale when a new file is uploaded; page content is never
/// diffed incrementally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub id: DocumentId,
    pub source_url: String,
    pub display_name: String,
    pub page_count: u16,
}

/// Current unix timestamp in seconds.
pub fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
