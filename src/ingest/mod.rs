//! Source ingestion
//!
//! Two ingestion paths produce the chunk batches the vector index is built
//! from: PDF documents (per-page text through the splitter) and relational
//! tables (schema, rows and foreign-key relationships, fetched
//! concurrently). Failures are captured per unit of work; one table's
//! failure never discards chunks produced by its siblings.

mod document;
mod tables;

pub use document::*;
pub use tables::*;

use std::fmt;

/// Structured summary of one ingestion attempt: which units of work
/// succeeded, which failed and why, and how many chunks were produced.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, String)>,
    pub chunk_count: usize,
}

impl IngestReport {
    pub fn record_success(&mut self, unit: impl Into<String>, chunks: usize) {
        self.succeeded.push(unit.into());
        self.chunk_count += chunks;
    }

    pub fn record_failure(&mut self, unit: impl Into<String>, error: impl fmt::Display) {
        self.failed.push((unit.into(), error.to_string()));
    }

    /// True when no unit of work produced anything usable.
    pub fn is_total_failure(&self) -> bool {
        self.succeeded.is_empty()
    }
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} unit(s) succeeded, {} failed, {} chunk(s)",
            self.succeeded.len(),
            self.failed.len(),
            self.chunk_count
        )?;
        for (unit, error) in &self.failed {
            write!(f, "\n  {}: {}", unit, error)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_summary() {
        let mut report = IngestReport::default();
        report.record_success("users", 12);
        report.record_failure("orders", "connection reset");

        assert!(!report.is_total_failure());
        assert_eq!(report.chunk_count, 12);
        let text = report.to_string();
        assert!(text.contains("1 unit(s) succeeded"));
        assert!(text.contains("orders: connection reset"));
    }

    #[test]
    fn test_total_failure() {
        let mut report = IngestReport::default();
        report.record_failure("users", "nope");
        assert!(report.is_total_failure());
    }
}
