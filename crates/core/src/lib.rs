//! Core document pipeline for the collaborative reader.
//!
//! Loading with source fallback, the device/normalized coordinate bridge,
//! and translation of completed text selections into annotations.

pub mod loader;
pub mod normalize;
pub mod selection;

pub use loader::{
    DocumentLoader, DocumentSource, FileSource, LoadError, LoadRequest, LoadedDocument,
    MemorySource, SourceError,
};
pub use normalize::{clamp_unit, to_device, to_normalized};
pub use selection::{SelectionCapture, SelectionTranslator};
