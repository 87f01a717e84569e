//! Embedded SQLite snapshot source
//!
//! Each call table is read with `SELECT *` and every row is turned into a
//! JSON object keyed by column name, so the serde row shapes in
//! [`crate::models`] apply unchanged. JSON sub-fields stay as text here and
//! are decoded by the normalizer.

use std::path::Path;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use tracing::{debug, info, warn};

use super::{listing, sort_listings, TraceSource};
use crate::error::{Error, Result};
use crate::models::{RawRows, TraceListing, TraceRow};

/// Trace source reading an SQLite snapshot
#[derive(Debug, Clone)]
pub struct SqliteSource {
    pool: SqlitePool,
}

impl SqliteSource {
    /// Open a snapshot database read-only
    pub async fn connect(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new().filename(path).read_only(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        info!(path = %path.display(), "Opened SQLite snapshot");
        Ok(Self { pool })
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Rows of `table` belonging to `trace_id`; a missing table reads as empty
    async fn rows_of<T: DeserializeOwned>(&self, table: &str, trace_id: &str) -> Result<Vec<T>> {
        let sql = format!("SELECT * FROM {table} WHERE trace_id = ?");
        let rows = match sqlx::query(&sql).bind(trace_id).fetch_all(&self.pool).await {
            Ok(rows) => rows,
            Err(e) if is_missing_table(&e) => {
                debug!(table, "Table missing from snapshot, treating as empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        rows.iter().map(|row| decode(row, table)).collect()
    }
}

fn is_missing_table(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.message().contains("no such table"),
        _ => false,
    }
}

fn decode<T: DeserializeOwned>(row: &SqliteRow, table: &str) -> Result<T> {
    serde_json::from_value(row_to_json(row))
        .map_err(|e| Error::source(format!("bad row in {table}: {e}")))
}

/// Column name to JSON value, by the stored type of each cell
fn row_to_json(row: &SqliteRow) -> Value {
    let mut object = Map::new();
    for column in row.columns() {
        let i = column.ordinal();
        let value = match row.try_get_raw(i) {
            Ok(raw) if raw.is_null() => Value::Null,
            Ok(raw) => {
                let info = raw.type_info();
                match info.name() {
                    "INTEGER" | "BOOLEAN" => row
                        .try_get_unchecked::<i64, _>(i)
                        .map(Value::from)
                        .unwrap_or(Value::Null),
                    "REAL" | "NUMERIC" => row
                        .try_get_unchecked::<f64, _>(i)
                        .map(Value::from)
                        .unwrap_or(Value::Null),
                    _ => row
                        .try_get_unchecked::<String, _>(i)
                        .map(Value::String)
                        .unwrap_or(Value::Null),
                }
            }
            Err(_) => Value::Null,
        };
        object.insert(column.name().to_string(), value);
    }
    Value::Object(object)
}

#[async_trait]
impl TraceSource for SqliteSource {
    async fn list_traces(&self) -> Result<Vec<TraceListing>> {
        let rows = sqlx::query("SELECT * FROM traces").fetch_all(&self.pool).await?;

        let mut listings = Vec::with_capacity(rows.len());
        for row in &rows {
            let trace: TraceRow = decode(row, "traces")?;
            match listing(&trace) {
                Some(entry) => listings.push(entry),
                None => warn!("Trace row without id, skipping"),
            }
        }
        sort_listings(&mut listings);
        Ok(listings)
    }

    async fn fetch_trace(&self, trace_id: &str) -> Result<RawRows> {
        let trace = sqlx::query("SELECT * FROM traces WHERE id = ?")
            .bind(trace_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found("trace", trace_id))?;

        let rows = RawRows {
            trace: Some(decode(&trace, "traces")?),
            agent_calls: self.rows_of("agent_call", trace_id).await?,
            llm_calls: self.rows_of("llm_call", trace_id).await?,
            tool_calls: self.rows_of("tool_call", trace_id).await?,
            errors: self.rows_of("errors", trace_id).await?,
            user_interactions: self.rows_of("user_interactions", trace_id).await?,
        };

        debug!(trace_id, rows = rows.len(), "Fetched trace from SQLite");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::build_call_forest;
    use crate::models::CallKind;
    use pretty_assertions::assert_eq;

    const SCHEMA: &[&str] = &[
        "CREATE TABLE traces (id INTEGER PRIMARY KEY, name TEXT, start_time TEXT, end_time TEXT, total_duration REAL)",
        "CREATE TABLE agent_call (id INTEGER PRIMARY KEY, trace_id INTEGER, name TEXT, start_time TEXT, end_time TEXT, llm_call_ids TEXT, tool_call_ids TEXT)",
        "CREATE TABLE llm_call (id INTEGER PRIMARY KEY, trace_id INTEGER, name TEXT, model TEXT, start_time TEXT, end_time TEXT, duration REAL, token_usage TEXT, cost TEXT, input_prompt TEXT, output TEXT, memory_used INTEGER, agent_id INTEGER)",
        "CREATE TABLE tool_call (id INTEGER PRIMARY KEY, trace_id INTEGER, name TEXT, start_time TEXT, end_time TEXT, duration REAL, input_parameters TEXT, output TEXT, network_calls TEXT, memory_used INTEGER, agent_id INTEGER)",
        "CREATE TABLE errors (id INTEGER PRIMARY KEY, trace_id INTEGER, error_type TEXT, error_message TEXT, timestamp TEXT, agent_id INTEGER, tool_call_id INTEGER, llm_call_id INTEGER)",
    ];

    const DATA: &[&str] = &[
        "INSERT INTO traces VALUES (1, 'research', '2024-05-01 10:00:00', '2024-05-01 10:00:30', 30.0)",
        "INSERT INTO traces VALUES (2, 'other', '2024-05-02 10:00:00', NULL, NULL)",
        "INSERT INTO agent_call VALUES (1, 1, 'planner', '2024-05-01 10:00:00', '2024-05-01 10:00:20', '[1]', '[1]')",
        "INSERT INTO llm_call VALUES (1, 1, 'plan', 'gpt-4o', '2024-05-01 10:00:01', '2024-05-01 10:00:05', 4.0, '{\"input\": 10, \"completion\": 5}', '{\"total\": 0.01}', 'hi', 'ok', 1024, 1)",
        "INSERT INTO tool_call VALUES (1, 1, 'search', '2024-05-01 10:00:06', '2024-05-01 10:00:09', 3.0, '{\"q\": \"rust\"}', 'results', '[]', NULL, 1)",
        "INSERT INTO tool_call VALUES (2, 2, 'elsewhere', NULL, NULL, NULL, NULL, NULL, NULL, NULL, NULL)",
        "INSERT INTO errors VALUES (1, 1, 'Timeout', 'slow', '2024-05-01 10:00:08', 1, 1, NULL)",
    ];

    async fn fixture(dir: &tempfile::TempDir) -> SqliteSource {
        let path = dir.path().join("snapshot.db");
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(SqliteConnectOptions::new().filename(&path).create_if_missing(true))
            .await
            .unwrap();
        for statement in SCHEMA.iter().chain(DATA) {
            sqlx::query(statement).execute(&pool).await.unwrap();
        }
        pool.close().await;

        SqliteSource::connect(&path).await.unwrap()
    }

    #[tokio::test]
    async fn test_fetch_trace_rows() {
        let dir = tempfile::tempdir().unwrap();
        let source = fixture(&dir).await;

        let rows = source.fetch_trace("1").await.unwrap();
        assert_eq!(rows.agent_calls.len(), 1);
        assert_eq!(rows.llm_calls.len(), 1);
        assert_eq!(rows.tool_calls.len(), 1);
        assert_eq!(rows.errors.len(), 1);
        // no user_interactions table in this snapshot
        assert!(rows.user_interactions.is_empty());
        assert_eq!(rows.llm_calls[0].model.as_deref(), Some("gpt-4o"));

        let forest = build_call_forest(&rows);
        // equal starts fall back to id order
        let ids: Vec<_> = forest.iter().map(|t| t.call.id.as_str()).collect();
        assert_eq!(ids, vec!["agent-1", "trace-1"]);

        let agent = &forest[0];
        assert_eq!(agent.len(), 4);
        let tool = agent.find("tool-1").unwrap();
        assert_eq!(tool.children[0].call.kind(), CallKind::Error);
        assert_eq!(agent.find("llm-1").unwrap().call.total_tokens(), 15);
    }

    #[tokio::test]
    async fn test_list_and_missing_trace() {
        let dir = tempfile::tempdir().unwrap();
        let source = fixture(&dir).await;

        let listings = source.list_traces().await.unwrap();
        let ids: Vec<_> = listings.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1"]);
        assert_eq!(listings[1].name.as_deref(), Some("research"));

        let err = source.fetch_trace("99").await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
