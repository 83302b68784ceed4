//! Assistant orchestration
//!
//! Owns exactly one vector index and retrieval chain at a time, routes
//! between the document and table ingestion paths, and keeps query-time
//! failures user-visible instead of fatal: `ask` always returns text, even
//! after a mid-session backend failure.

use crate::chain::RetrievalChain;
use crate::chunk::ChunkSplitter;
use crate::config::Config;
use crate::db::RelationalSource;
use crate::embed::Embedder;
use crate::error::{Error, Result};
use crate::format::ResponseFormatter;
use crate::index::VectorIndex;
use crate::ingest::{DocumentIngestor, DocumentLoader, IngestReport, TableIngestor};
use crate::llm::Completer;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};

/// The assistant: ingest sources, ask questions, clear state.
pub struct Assistant {
    config: Config,
    loader: Arc<dyn DocumentLoader>,
    source: Option<Arc<dyn RelationalSource>>,
    index: RwLock<VectorIndex>,
    chain: RetrievalChain,
    formatter: ResponseFormatter,
    ingesting: AtomicBool,
}

/// Clears the busy flag when an ingestion attempt ends, however it ends.
struct IngestGuard<'a>(&'a AtomicBool);

impl<'a> IngestGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| Error::IngestionInFlight)?;
        Ok(Self(flag))
    }
}

impl Drop for IngestGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Assistant {
    /// Wire the assistant from injected capabilities.
    pub fn new(
        config: Config,
        embedder: Arc<dyn Embedder>,
        completer: Arc<dyn Completer>,
        loader: Arc<dyn DocumentLoader>,
        source: Option<Arc<dyn RelationalSource>>,
    ) -> Result<Self> {
        config.validate()?;
        let chain = RetrievalChain::new(completer, &config.retrieval);
        let formatter = ResponseFormatter::new(&config.format);
        Ok(Self {
            loader,
            source,
            index: RwLock::new(VectorIndex::new(embedder)),
            chain,
            formatter,
            ingesting: AtomicBool::new(false),
            config,
        })
    }

    fn source(&self) -> Result<&Arc<dyn RelationalSource>> {
        self.source
            .as_ref()
            .ok_or_else(|| Error::Config("No database connection configured".to_string()))
    }

    /// Whether a successful ingestion has happened since the last clear.
    pub async fn is_ready(&self) -> bool {
        self.index.read().await.is_ready()
    }

    /// Ingest one PDF document, replacing the current index.
    pub async fn ingest_document(&self, path: &Path) -> Result<IngestReport> {
        let _guard = IngestGuard::acquire(&self.ingesting)?;
        info!("Ingesting document {:?}", path);

        let splitter = ChunkSplitter::from_config(&self.config.chunk)?;
        let ingestor = DocumentIngestor::new(splitter);

        // Extraction and splitting are blocking work; keep them off the
        // async workers.
        let loader = Arc::clone(&self.loader);
        let path = path.to_path_buf();
        let (chunks, report) =
            tokio::task::spawn_blocking(move || ingestor.ingest(loader.as_ref(), &path))
                .await
                .map_err(|e| Error::Other(format!("Ingestion task failed: {}", e)))??;

        self.index.write().await.rebuild(chunks).await?;
        Ok(report)
    }

    /// Ingest the named tables (schema, rows, relationships), replacing the
    /// current index. Per-table failures are captured in the report; only a
    /// batch that produced nothing at all aborts the attempt.
    pub async fn ingest_tables(&self, tables: &[String]) -> Result<IngestReport> {
        let _guard = IngestGuard::acquire(&self.ingesting)?;
        info!("Ingesting {} table(s)", tables.len());

        let source = Arc::clone(self.source()?);
        let ingestor = TableIngestor::new(self.config.database.batch_size);
        let (chunks, report) = ingestor.ingest(source, tables).await?;

        if chunks.is_empty() {
            return Err(Error::Other(format!(
                "Table ingestion produced no chunks ({})",
                report
            )));
        }

        self.index.write().await.rebuild(chunks).await?;
        Ok(report)
    }

    /// Answer a question from the current index. Never fails: backend
    /// errors come back as readable text so the session can continue.
    pub async fn ask(&self, question: &str) -> String {
        let index = self.index.read().await;
        match self.chain.answer(&index, question).await {
            Ok(answer) => self.formatter.format(&answer),
            Err(err) => {
                error!("Error during query processing: {}", err);
                format!("Error during query processing: {}", err)
            }
        }
    }

    /// Sample a handful of rows per table and return a formatted summary.
    /// The question is accepted for parity with `ask` but the summary is
    /// built from the samples alone.
    pub async fn generate_insights(&self, tables: &[String], _question: &str) -> Result<String> {
        if tables.is_empty() {
            return Err(Error::Config("No tables selected for insights".to_string()));
        }
        let source = self.source()?;
        let limit = self.config.insights.sample_rows;

        let mut insights = Vec::new();
        for table in tables {
            let descriptor = source.list_columns(table).await?;
            let sample = source.fetch_sample(&descriptor, limit).await?;
            if !sample.is_empty() {
                let rows = sample
                    .iter()
                    .map(|row| row.join(" | "))
                    .collect::<Vec<_>>()
                    .join("; ");
                insights.push(format!("Sample data from {}: {}", table, rows));
            }
        }

        Ok(self.formatter.format(&insights.join(" ")))
    }

    /// List the tables available in the connected source.
    pub async fn list_tables(&self) -> Result<Vec<String>> {
        self.source()?.list_tables().await
    }

    /// Drop the index, retriever state and fallback context. Idempotent.
    pub async fn clear(&self) {
        info!("Clearing vector index");
        self.index.write().await.clear();
    }
}
