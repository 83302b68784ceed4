//! Relational source access
//!
//! Wraps a bounded Postgres connection pool behind the `RelationalSource`
//! capability trait: catalogue lookups (tables, columns, foreign keys) and
//! batched row streaming. Identifiers interpolated into query text come only
//! from the catalogue itself; caller-supplied table names are equality-checked
//! against `list_tables()` before use.

use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use futures::StreamExt;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::time::Duration;
use tracing::debug;

/// Schema description of one table: ordered (column name, declared type) pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    pub table_name: String,
    pub columns: Vec<(String, String)>,
}

/// A foreign-key edge between two tables.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RelationshipEdge {
    pub source_table: String,
    pub source_column: String,
    pub target_table: String,
    pub target_column: String,
}

impl std::fmt::Display for RelationshipEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}) -> {} ({})",
            self.source_table, self.source_column, self.target_table, self.target_column
        )
    }
}

/// Capability trait over a relational store.
#[async_trait]
pub trait RelationalSource: Send + Sync {
    /// All table names in the source's public catalogue.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Ordered (name, declared type) pairs for one table.
    async fn list_columns(&self, table: &str) -> Result<TableDescriptor>;

    /// All foreign-key edges, sorted by (source_table, source_column).
    async fn list_foreign_keys(&self) -> Result<Vec<RelationshipEdge>>;

    /// Stream all rows of a table as batches of stringified values.
    ///
    /// `descriptor` must come from `list_columns` on the same source; its
    /// column names are the only identifiers interpolated into the query.
    async fn fetch_rows(
        &self,
        descriptor: &TableDescriptor,
        batch_size: usize,
    ) -> Result<Vec<Vec<Vec<String>>>>;

    /// Fetch at most `limit` rows of a table, for the insight path.
    async fn fetch_sample(
        &self,
        descriptor: &TableDescriptor,
        limit: usize,
    ) -> Result<Vec<Vec<String>>>;
}

/// Postgres-backed source over a bounded sqlx pool.
pub struct PgSource {
    pool: PgPool,
    query_timeout: Duration,
}

impl PgSource {
    /// Connect with the configured pool bounds.
    pub async fn connect(url: &str, config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .connect(url)
            .await?;
        debug!(
            "Connected to database (pool {}..{})",
            config.min_connections, config.max_connections
        );
        Ok(Self {
            pool,
            query_timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    /// Build from an existing pool (used by tests).
    pub fn from_pool(pool: PgPool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }

    async fn with_timeout<T>(
        &self,
        fut: impl std::future::Future<Output = std::result::Result<T, sqlx::Error>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.query_timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(Error::Other(format!(
                "Query timed out after {:?}",
                self.query_timeout
            ))),
        }
    }
}

#[async_trait]
impl RelationalSource for PgSource {
    async fn list_tables(&self) -> Result<Vec<String>> {
        let rows = self
            .with_timeout(
                sqlx::query(
                    "SELECT table_name FROM information_schema.tables \
                     WHERE table_schema = 'public' ORDER BY table_name",
                )
                .fetch_all(&self.pool),
            )
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| row.get::<String, _>("table_name"))
            .collect())
    }

    async fn list_columns(&self, table: &str) -> Result<TableDescriptor> {
        let rows = self
            .with_timeout(
                sqlx::query(
                    "SELECT column_name, data_type FROM information_schema.columns \
                     WHERE table_schema = 'public' AND table_name = $1 \
                     ORDER BY ordinal_position",
                )
                .bind(table)
                .fetch_all(&self.pool),
            )
            .await?;

        if rows.is_empty() {
            return Err(Error::Config(format!("Unknown table: {}", table)));
        }

        Ok(TableDescriptor {
            table_name: table.to_string(),
            columns: rows
                .into_iter()
                .map(|row| {
                    (
                        row.get::<String, _>("column_name"),
                        row.get::<String, _>("data_type"),
                    )
                })
                .collect(),
        })
    }

    async fn list_foreign_keys(&self) -> Result<Vec<RelationshipEdge>> {
        let rows = self
            .with_timeout(
                sqlx::query(
                    "SELECT tc.table_name, kcu.column_name, \
                            ccu.table_name AS foreign_table_name, \
                            ccu.column_name AS foreign_column_name \
                     FROM information_schema.table_constraints AS tc \
                     JOIN information_schema.key_column_usage AS kcu \
                       ON tc.constraint_name = kcu.constraint_name \
                     JOIN information_schema.constraint_column_usage AS ccu \
                       ON ccu.constraint_name = tc.constraint_name \
                     WHERE tc.constraint_type = 'FOREIGN KEY'",
                )
                .fetch_all(&self.pool),
            )
            .await?;

        let mut edges: Vec<RelationshipEdge> = rows
            .into_iter()
            .map(|row| RelationshipEdge {
                source_table: row.get("table_name"),
                source_column: row.get("column_name"),
                target_table: row.get("foreign_table_name"),
                target_column: row.get("foreign_column_name"),
            })
            .collect();

        // Deterministic order regardless of catalogue iteration order.
        edges.sort();
        edges.dedup();
        Ok(edges)
    }

    async fn fetch_rows(
        &self,
        descriptor: &TableDescriptor,
        batch_size: usize,
    ) -> Result<Vec<Vec<Vec<String>>>> {
        // Cast every column to text so value decoding is uniform; quoted
        // identifiers come straight from the catalogue.
        let select_list = descriptor
            .columns
            .iter()
            .map(|(name, _)| format!("\"{}\"::text", name.replace('"', "\"\"")))
            .collect::<Vec<_>>()
            .join(", ");
        let query = format!(
            "SELECT {} FROM \"{}\"",
            select_list,
            descriptor.table_name.replace('"', "\"\"")
        );

        let column_count = descriptor.columns.len();
        let collect = async {
            let mut stream = sqlx::query(&query).fetch(&self.pool).chunks(batch_size);
            let mut batches = Vec::new();
            while let Some(batch) = stream.next().await {
                let mut rows = Vec::with_capacity(batch.len());
                for row in batch {
                    let row = row?;
                    let values = (0..column_count)
                        .map(|i| {
                            row.get::<Option<String>, _>(i)
                                .unwrap_or_else(|| "NULL".to_string())
                        })
                        .collect::<Vec<String>>();
                    rows.push(values);
                }
                batches.push(rows);
            }
            Ok::<_, sqlx::Error>(batches)
        };
        self.with_timeout(collect).await
    }

    async fn fetch_sample(
        &self,
        descriptor: &TableDescriptor,
        limit: usize,
    ) -> Result<Vec<Vec<String>>> {
        let select_list = descriptor
            .columns
            .iter()
            .map(|(name, _)| format!("\"{}\"::text", name.replace('"', "\"\"")))
            .collect::<Vec<_>>()
            .join(", ");
        let query = format!(
            "SELECT {} FROM \"{}\" LIMIT $1",
            select_list,
            descriptor.table_name.replace('"', "\"\"")
        );

        let rows = self
            .with_timeout(
                sqlx::query(&query)
                    .bind(limit_param(limit))
                    .fetch_all(&self.pool),
            )
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                (0..descriptor.columns.len())
                    .map(|i| {
                        row.get::<Option<String>, _>(i)
                            .unwrap_or_else(|| "NULL".to_string())
                    })
                    .collect()
            })
            .collect())
    }
}

/// Clamp a row limit into the range a Postgres bigint parameter accepts.
fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_param_never_truncates() {
        assert_eq!(limit_param(5), 5);
        assert_eq!(limit_param(usize::MAX), i64::MAX);
    }

    #[test]
    fn test_relationship_edge_display() {
        let edge = RelationshipEdge {
            source_table: "orders".to_string(),
            source_column: "user_id".to_string(),
            target_table: "users".to_string(),
            target_column: "id".to_string(),
        };
        assert_eq!(edge.to_string(), "orders (user_id) -> users (id)");
    }

    #[test]
    fn test_edges_sort_by_source_then_column() {
        let mut edges = vec![
            RelationshipEdge {
                source_table: "orders".to_string(),
                source_column: "user_id".to_string(),
                target_table: "users".to_string(),
                target_column: "id".to_string(),
            },
            RelationshipEdge {
                source_table: "items".to_string(),
                source_column: "order_id".to_string(),
                target_table: "orders".to_string(),
                target_column: "id".to_string(),
            },
        ];
        edges.sort();
        assert_eq!(edges[0].source_table, "items");
        assert_eq!(edges[1].source_table, "orders");
    }
}
