//! PDF document ingestion

use super::IngestReport;
use crate::chunk::{filter_scalar_metadata, Chunk, ChunkSplitter};
use crate::error::{Error, Result};
use serde_json::json;
use std::path::Path;
use tracing::{debug, info};

/// One page of extracted document text.
#[derive(Debug, Clone)]
pub struct Page {
    pub number: usize,
    pub text: String,
}

/// Capability trait for document loaders.
pub trait DocumentLoader: Send + Sync {
    /// Extract per-page text; fails with a parse error on malformed input.
    fn load(&self, path: &Path) -> Result<Vec<Page>>;
}

/// PDF loader over pdf-extract.
pub struct PdfLoader;

impl DocumentLoader for PdfLoader {
    fn load(&self, path: &Path) -> Result<Vec<Page>> {
        let text = pdf_extract::extract_text(path)
            .map_err(|e| Error::Parse(format!("{}: {}", path.display(), e)))?;

        // pdf-extract separates pages with form feeds.
        let pages: Vec<Page> = text
            .split('\u{0C}')
            .enumerate()
            .map(|(i, page_text)| Page {
                number: i + 1,
                text: page_text.to_string(),
            })
            .filter(|p| !p.text.trim().is_empty())
            .collect();

        debug!("Extracted {} non-empty pages from {:?}", pages.len(), path);
        Ok(pages)
    }
}

/// Turns a document's pages into an indexable chunk batch.
pub struct DocumentIngestor {
    splitter: ChunkSplitter,
}

impl DocumentIngestor {
    pub fn new(splitter: ChunkSplitter) -> Self {
        Self { splitter }
    }

    /// Load a document and split it into chunks, one splitter pass per page
    /// so the page number survives as metadata.
    pub fn ingest(
        &self,
        loader: &dyn DocumentLoader,
        path: &Path,
    ) -> Result<(Vec<Chunk>, IngestReport)> {
        let unit = path.display().to_string();
        let pages = loader.load(path)?;

        let mut chunks = Vec::new();
        for page in &pages {
            for chunk in self.splitter.split(&page.text) {
                chunks.push(
                    chunk
                        .with_metadata("source", json!(unit.clone()))
                        .with_metadata("page", json!(page.number)),
                );
            }
        }
        let chunks = filter_scalar_metadata(chunks);

        if chunks.is_empty() {
            return Err(Error::Parse(format!(
                "Document produced no chunks: {}",
                unit
            )));
        }

        info!("Ingested {} chunks from {:?}", chunks.len(), path);
        let mut report = IngestReport::default();
        report.record_success(unit, chunks.len());
        Ok((chunks, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeLoader {
        pages: Vec<Page>,
    }

    impl DocumentLoader for FakeLoader {
        fn load(&self, _path: &Path) -> Result<Vec<Page>> {
            Ok(self.pages.clone())
        }
    }

    struct BrokenLoader;

    impl DocumentLoader for BrokenLoader {
        fn load(&self, path: &Path) -> Result<Vec<Page>> {
            Err(Error::Parse(format!("corrupt file: {}", path.display())))
        }
    }

    fn ingestor() -> DocumentIngestor {
        DocumentIngestor::new(ChunkSplitter::new(1024, 100).unwrap())
    }

    #[test]
    fn test_pages_become_chunks_with_metadata() {
        let loader = FakeLoader {
            pages: vec![
                Page {
                    number: 1,
                    text: "The sky is blue.".to_string(),
                },
                Page {
                    number: 2,
                    text: "Grass is green.".to_string(),
                },
            ],
        };

        let (chunks, report) = ingestor().ingest(&loader, Path::new("doc.pdf")).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(report.chunk_count, 2);
        assert_eq!(chunks[0].metadata()["page"], 1);
        assert_eq!(chunks[1].metadata()["page"], 2);
        assert_eq!(chunks[0].metadata()["source"], "doc.pdf");
    }

    #[test]
    fn test_parse_failure_propagates() {
        let result = ingestor().ingest(&BrokenLoader, Path::new("bad.pdf"));
        assert!(matches!(result, Err(Error::Parse(_))));
    }

    #[test]
    fn test_zero_chunks_is_an_error() {
        let loader = FakeLoader { pages: Vec::new() };
        let result = ingestor().ingest(&loader, Path::new("empty.pdf"));
        assert!(matches!(result, Err(Error::Parse(_))));
    }
}
