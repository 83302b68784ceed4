//! Relational table ingestion
//!
//! Fans out one task per table (schema chunk plus one chunk per row) and a
//! single global task for foreign-key relationships, then joins them all.
//! Each task appends to its own chunk list; lists are merged only after the
//! join, in request order, so no locking is needed and partial failures
//! keep every successful table's chunks.

use super::IngestReport;
use crate::chunk::Chunk;
use crate::db::{RelationalSource, RelationshipEdge, TableDescriptor};
use crate::error::{Error, Result};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Builds chunk batches out of relational tables.
pub struct TableIngestor {
    batch_size: usize,
}

impl TableIngestor {
    pub fn new(batch_size: usize) -> Self {
        Self { batch_size }
    }

    /// Ingest the named tables plus the relationship summary.
    ///
    /// Requested names are equality-checked against the source catalogue
    /// before any identifier reaches query text; unknown names fail their
    /// own unit without blocking the rest.
    pub async fn ingest(
        &self,
        source: Arc<dyn RelationalSource>,
        tables: &[String],
    ) -> Result<(Vec<Chunk>, IngestReport)> {
        if tables.is_empty() {
            return Err(Error::Config("No tables selected for ingestion".to_string()));
        }

        let known: HashSet<String> = source.list_tables().await?.into_iter().collect();
        let mut report = IngestReport::default();
        let mut join_set: JoinSet<(usize, String, Result<Vec<Chunk>>)> = JoinSet::new();

        for (order, table) in tables.iter().enumerate() {
            if !known.contains(table) {
                report.record_failure(table.clone(), "not in the source catalogue");
                continue;
            }
            let source = Arc::clone(&source);
            let table = table.clone();
            let batch_size = self.batch_size;
            join_set.spawn(async move {
                let result = fetch_table_chunks(source.as_ref(), &table, batch_size).await;
                (order, table, result)
            });
        }

        // Relationships are fetched once globally, not per table.
        {
            let source = Arc::clone(&source);
            join_set.spawn(async move {
                let result = fetch_relationship_chunk(source.as_ref()).await;
                (usize::MAX, "relationships".to_string(), result)
            });
        }

        let mut completed: Vec<(usize, String, Vec<Chunk>)> = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((order, unit, Ok(chunks))) => completed.push((order, unit, chunks)),
                Ok((_, unit, Err(err))) => {
                    warn!("Ingestion unit '{}' failed: {}", unit, err);
                    report.record_failure(unit, err);
                }
                Err(err) => report.record_failure("task", err),
            }
        }

        // Merge in request order regardless of completion order.
        completed.sort_by_key(|(order, _, _)| *order);
        let mut chunks = Vec::new();
        for (_, unit, unit_chunks) in completed {
            report.record_success(unit, unit_chunks.len());
            chunks.extend(unit_chunks);
        }

        info!("Table ingestion finished: {}", report);
        Ok((chunks, report))
    }
}

/// Schema-description chunk followed by one chunk per row.
async fn fetch_table_chunks(
    source: &dyn RelationalSource,
    table: &str,
    batch_size: usize,
) -> Result<Vec<Chunk>> {
    let descriptor = source.list_columns(table).await?;
    let mut chunks = Vec::new();

    if let Some(chunk) = Chunk::new(schema_text(&descriptor)) {
        chunks.push(
            chunk
                .with_metadata("table", json!(table))
                .with_metadata("kind", json!("schema")),
        );
    }

    for batch in source.fetch_rows(&descriptor, batch_size).await? {
        for row in batch {
            let content = format!("Table: {}\n{}", table, row.join(" | "));
            if let Some(chunk) = Chunk::new(content) {
                chunks.push(
                    chunk
                        .with_metadata("table", json!(table))
                        .with_metadata("kind", json!("row")),
                );
            }
        }
    }

    Ok(chunks)
}

/// One chunk summarizing every foreign-key edge across the source.
async fn fetch_relationship_chunk(source: &dyn RelationalSource) -> Result<Vec<Chunk>> {
    let edges = source.list_foreign_keys().await?;
    if edges.is_empty() {
        return Ok(Vec::new());
    }
    Ok(Chunk::new(relationship_text(&edges))
        .map(|chunk| chunk.with_metadata("kind", json!("relationships")))
        .into_iter()
        .collect())
}

fn schema_text(descriptor: &TableDescriptor) -> String {
    let columns = descriptor
        .columns
        .iter()
        .map(|(name, ty)| format!("{} ({})", name, ty))
        .collect::<Vec<_>>()
        .join("\n");
    format!("Table: {}\nColumns:\n{}", descriptor.table_name, columns)
}

fn relationship_text(edges: &[RelationshipEdge]) -> String {
    let lines = edges
        .iter()
        .map(|edge| edge.to_string())
        .collect::<Vec<_>>()
        .join("\n");
    format!("Relationships among tables:\n{}", lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// In-memory relational source with a users/orders schema and a
    /// configurable set of tables that fail on row fetch.
    struct FakeSource {
        failing: HashSet<String>,
    }

    impl FakeSource {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                failing: HashSet::new(),
            })
        }

        fn with_failing(table: &str) -> Arc<Self> {
            Arc::new(Self {
                failing: [table.to_string()].into_iter().collect(),
            })
        }
    }

    #[async_trait]
    impl RelationalSource for FakeSource {
        async fn list_tables(&self) -> Result<Vec<String>> {
            Ok(vec!["orders".to_string(), "users".to_string()])
        }

        async fn list_columns(&self, table: &str) -> Result<TableDescriptor> {
            match table {
                "users" => Ok(TableDescriptor {
                    table_name: "users".to_string(),
                    columns: vec![
                        ("id".to_string(), "integer".to_string()),
                        ("name".to_string(), "text".to_string()),
                    ],
                }),
                "orders" => Ok(TableDescriptor {
                    table_name: "orders".to_string(),
                    columns: vec![
                        ("id".to_string(), "integer".to_string()),
                        ("user_id".to_string(), "integer".to_string()),
                    ],
                }),
                other => Err(Error::Config(format!("Unknown table: {}", other))),
            }
        }

        async fn list_foreign_keys(&self) -> Result<Vec<RelationshipEdge>> {
            Ok(vec![RelationshipEdge {
                source_table: "orders".to_string(),
                source_column: "user_id".to_string(),
                target_table: "users".to_string(),
                target_column: "id".to_string(),
            }])
        }

        async fn fetch_rows(
            &self,
            descriptor: &TableDescriptor,
            _batch_size: usize,
        ) -> Result<Vec<Vec<Vec<String>>>> {
            if self.failing.contains(&descriptor.table_name) {
                return Err(Error::Other("connection reset".to_string()));
            }
            match descriptor.table_name.as_str() {
                "users" => Ok(vec![vec![
                    vec!["1".to_string(), "ada".to_string()],
                    vec!["2".to_string(), "grace".to_string()],
                ]]),
                "orders" => Ok(vec![vec![vec!["10".to_string(), "1".to_string()]]]),
                _ => Ok(Vec::new()),
            }
        }

        async fn fetch_sample(
            &self,
            descriptor: &TableDescriptor,
            limit: usize,
        ) -> Result<Vec<Vec<String>>> {
            let rows = self.fetch_rows(descriptor, limit).await?;
            Ok(rows.into_iter().flatten().take(limit).collect())
        }
    }

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_ingest_produces_schema_row_and_relationship_chunks() {
        let ingestor = TableIngestor::new(1000);
        let (chunks, report) = ingestor
            .ingest(FakeSource::new(), &names(&["users", "orders"]))
            .await
            .unwrap();

        assert!(report.failed.is_empty());
        // users: schema + 2 rows, orders: schema + 1 row, relationships: 1
        assert_eq!(chunks.len(), 6);

        let contents: Vec<&str> = chunks.iter().map(|c| c.content()).collect();
        assert!(contents[0].starts_with("Table: users\nColumns:\nid (integer)"));
        assert!(contents.contains(&"Table: users\n1 | ada"));
        assert!(contents
            .last()
            .unwrap()
            .contains("orders (user_id) -> users (id)"));
    }

    #[tokio::test]
    async fn test_one_failing_table_keeps_sibling_chunks() {
        let ingestor = TableIngestor::new(1000);
        let (chunks, report) = ingestor
            .ingest(
                FakeSource::with_failing("orders"),
                &names(&["users", "orders"]),
            )
            .await
            .unwrap();

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "orders");
        assert!(report.succeeded.contains(&"users".to_string()));
        assert!(chunks.iter().any(|c| c.content().contains("1 | ada")));
        assert!(!chunks.iter().any(|c| c.content().starts_with("Table: orders\n1")));
    }

    #[tokio::test]
    async fn test_unknown_table_is_rejected_without_querying() {
        let ingestor = TableIngestor::new(1000);
        let (chunks, report) = ingestor
            .ingest(FakeSource::new(), &names(&["users", "users; DROP TABLE users"]))
            .await
            .unwrap();

        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].1.contains("catalogue"));
        assert!(chunks.iter().any(|c| c.content().contains("ada")));
    }

    #[tokio::test]
    async fn test_empty_table_set_is_config_error() {
        let ingestor = TableIngestor::new(1000);
        let result = ingestor.ingest(FakeSource::new(), &[]).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_chunks_merge_in_request_order() {
        let ingestor = TableIngestor::new(1000);
        let (chunks, _) = ingestor
            .ingest(FakeSource::new(), &names(&["orders", "users"]))
            .await
            .unwrap();
        assert!(chunks[0].content().starts_with("Table: orders\nColumns:"));
    }
}
