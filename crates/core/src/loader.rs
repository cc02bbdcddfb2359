//! Document loading with ordered source fallback and eager page indexing.
//!
//! A document may be deliverable from several places (primary CDN, mirror,
//! local cache). The loader walks the configured sources in order and
//! succeeds on the first that both yields bytes and parses; it fails only
//! when every source has been exhausted. On success every page handle is
//! materialized up front so later navigation never re-fetches the document.

use std::path::PathBuf;

use coread_render::{EngineDocument, EngineError, PageHandle, PageRenderer, RenderEngine};
use doc_model::{DocumentId, DocumentInfo};
use log::{debug, info};

/// A single delivery source failed to produce bytes.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct SourceError(pub String);

/// Why a document could not be loaded.
///
/// `SourceUnreachable` is a delivery problem and worth retrying;
/// `ContentUnreadable` means bytes arrived but do not parse, so retrying the
/// fetch cannot help.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("no document source reachable: {0}")]
    SourceUnreachable(String),

    #[error("document content unreadable: {0}")]
    ContentUnreadable(String),
}

/// One place the document bytes can come from.
pub trait DocumentSource {
    /// Short name used in logs ("primary", "mirror", "cache").
    fn label(&self) -> &str;

    fn fetch(&self) -> Result<Vec<u8>, SourceError>;
}

/// Source backed by bytes already in memory.
pub struct MemorySource {
    label: String,
    bytes: Vec<u8>,
}

impl MemorySource {
    pub fn new(label: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { label: label.into(), bytes }
    }
}

impl DocumentSource for MemorySource {
    fn label(&self) -> &str {
        &self.label
    }

    fn fetch(&self) -> Result<Vec<u8>, SourceError> {
        Ok(self.bytes.clone())
    }
}

/// Source backed by a local file.
pub struct FileSource {
    label: String,
    path: PathBuf,
}

impl FileSource {
    pub fn new(label: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self { label: label.into(), path: path.into() }
    }
}

impl DocumentSource for FileSource {
    fn label(&self) -> &str {
        &self.label
    }

    fn fetch(&self) -> Result<Vec<u8>, SourceError> {
        std::fs::read(&self.path).map_err(|e| SourceError(format!("{}: {e}", self.path.display())))
    }
}

/// Identity of the document being requested.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub id: DocumentId,
    pub source_url: String,
    pub display_name: String,
}

/// A fully loaded, page-indexed document.
pub struct LoadedDocument {
    info: DocumentInfo,
    document: Box<dyn EngineDocument>,
    pages: Vec<PageHandle>,
}

impl std::fmt::Debug for LoadedDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedDocument")
            .field("info", &self.info)
            .field("pages", &self.pages)
            .finish_non_exhaustive()
    }
}

impl LoadedDocument {
    pub fn info(&self) -> &DocumentInfo {
        &self.info
    }

    pub fn page_count(&self) -> u16 {
        self.info.page_count
    }

    pub fn pages(&self) -> &[PageHandle] {
        &self.pages
    }

    /// Page handle by 1-indexed page number.
    pub fn page(&self, page_number: u16) -> Option<PageHandle> {
        page_number
            .checked_sub(1)
            .and_then(|i| self.pages.get(i as usize))
            .copied()
    }

    /// Fresh renderer for a page.
    pub fn renderer_for(&self, page_number: u16) -> Option<PageRenderer> {
        self.page(page_number).map(PageRenderer::new)
    }

    pub fn engine_document(&self) -> &dyn EngineDocument {
        self.document.as_ref()
    }
}

/// Loads documents through a rendering engine.
pub struct DocumentLoader<E: RenderEngine> {
    engine: E,
}

impl<E: RenderEngine> DocumentLoader<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    /// Try each source in order; succeed on the first that fetches and parses.
    pub fn load(
        &self,
        request: LoadRequest,
        sources: &[Box<dyn DocumentSource>],
    ) -> Result<LoadedDocument, LoadError> {
        let mut last_fetch_error: Option<String> = None;
        let mut last_parse_error: Option<String> = None;

        for source in sources {
            let bytes = match source.fetch() {
                Ok(bytes) => bytes,
                Err(error) => {
                    debug!("source '{}' unreachable: {error}", source.label());
                    last_fetch_error = Some(format!("{}: {error}", source.label()));
                    continue;
                }
            };

            match self.engine.open(bytes) {
                Ok(document) => {
                    info!(
                        "document '{}' loaded from source '{}'",
                        request.display_name,
                        source.label()
                    );
                    return Self::index_pages(request, document);
                }
                Err(EngineError::Unreadable(message)) => {
                    debug!("source '{}' returned unreadable content: {message}", source.label());
                    last_parse_error = Some(message);
                }
                Err(error) => {
                    debug!("source '{}' failed to initialize: {error}", source.label());
                    last_fetch_error = Some(error.to_string());
                }
            }
        }

        // Bad bytes dominate the classification: retrying the fetch will not
        // fix a parse failure.
        if let Some(message) = last_parse_error {
            Err(LoadError::ContentUnreadable(message))
        } else {
            Err(LoadError::SourceUnreachable(
                last_fetch_error.unwrap_or_else(|| "no sources configured".to_owned()),
            ))
        }
    }

    /// Materialize every page handle in one pass.
    fn index_pages(
        request: LoadRequest,
        document: Box<dyn EngineDocument>,
    ) -> Result<LoadedDocument, LoadError> {
        let page_count = document.page_count();
        if page_count == 0 {
            // A paginated document with nothing to paginate is bad content,
            // not a delivery problem.
            return Err(LoadError::ContentUnreadable("document has no pages".to_owned()));
        }
        let mut pages = Vec::with_capacity(page_count as usize);

        for index in 0..page_count {
            let (width_pt, height_pt) = document
                .page_size(index)
                .map_err(|e| LoadError::ContentUnreadable(e.to_string()))?;
            pages.push(PageHandle { page_number: index + 1, width_pt, height_pt });
        }

        Ok(LoadedDocument {
            info: DocumentInfo {
                id: request.id,
                source_url: request.source_url,
                display_name: request.display_name,
                page_count,
            },
            document,
            pages,
        })
    }
}
