//! Generic statement execution for the data access surface
//!
//! Parameters arrive as JSON values and rows leave as JSON objects keyed by
//! column name, so callers outside Rust can use the store without knowing
//! its column types.

use super::Store;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use tracing::debug;

/// Result of a mutating statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecOutcome {
    pub rows_affected: u64,
    pub last_insert_rowid: i64,
}

fn bind_json<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &[Value],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(*b),
            Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => query.bind(i),
                (None, Some(f)) => query.bind(f),
                (None, None) => query.bind(n.to_string()),
            },
            Value::String(s) => query.bind(s.clone()),
            // Arrays and objects are stored as their JSON text
            other => query.bind(other.to_string()),
        };
    }
    query
}

fn row_to_json(row: &SqliteRow) -> Result<Map<String, Value>> {
    let mut object = Map::new();
    for (i, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(i)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            match raw.type_info().name() {
                "INTEGER" => Value::from(row.try_get::<i64, _>(i)?),
                "REAL" => Number::from_f64(row.try_get::<f64, _>(i)?)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
                "BLOB" => Value::from(row.try_get::<Vec<u8>, _>(i)?),
                _ => Value::String(row.try_get::<String, _>(i)?),
            }
        };
        object.insert(column.name().to_string(), value);
    }
    Ok(object)
}

impl Store {
    /// Run a single mutating statement with positional parameters
    pub async fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecOutcome> {
        debug!("execute: {} ({} params)", sql, params.len());
        let result = bind_json(sqlx::query(sql), params)
            .execute(&self.pool)
            .await?;
        Ok(ExecOutcome {
            rows_affected: result.rows_affected(),
            last_insert_rowid: result.last_insert_rowid(),
        })
    }

    /// Run a statement and return each row as a JSON object
    pub async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Map<String, Value>>> {
        debug!("query: {} ({} params)", sql, params.len());
        let rows = bind_json(sqlx::query(sql), params)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_json).collect()
    }

    /// Run a parameterless script that may hold several statements
    pub async fn execute_raw(&self, sql: &str) -> Result<u64> {
        debug!("execute_raw: {} bytes", sql.len());
        let result = sqlx::query(sql).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::store::tests::setup_test_store;
    use serde_json::json;

    #[tokio::test]
    async fn test_execute_and_query_round_trip_types() {
        let (store, _tmp) = setup_test_store().await;

        let outcome = store
            .execute(
                "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, ?)",
                &[json!("layout"), json!({"columns": 2}), json!("2024-05-01")],
            )
            .await
            .unwrap();
        assert_eq!(outcome.rows_affected, 1);
        assert!(outcome.last_insert_rowid > 0);

        let rows = store
            .query("SELECT key, value FROM settings WHERE key = ?", &[json!("layout")])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["key"], json!("layout"));
        assert_eq!(rows[0]["value"], json!(r#"{"columns":2}"#));
    }

    #[tokio::test]
    async fn test_query_decodes_numbers_and_nulls() {
        let (store, _tmp) = setup_test_store().await;

        let rows = store
            .query(
                "SELECT ? AS n, ? AS f, ? AS b, ? AS missing",
                &[json!(42), json!(2.5), json!(true), Value::Null],
            )
            .await
            .unwrap();
        let row = &rows[0];
        assert_eq!(row["n"], json!(42));
        assert_eq!(row["f"], json!(2.5));
        assert_eq!(row["b"], json!(1));
        assert_eq!(row["missing"], Value::Null);
    }

    #[tokio::test]
    async fn test_execute_raw_runs_scripts() {
        let (store, _tmp) = setup_test_store().await;

        store
            .execute_raw(
                r#"
                INSERT INTO projects (id, name, created_at, updated_at) VALUES ('p1', 'One', 'x', 'x');
                INSERT INTO projects (id, name, created_at, updated_at) VALUES ('p2', 'Two', 'x', 'x');
                "#,
            )
            .await
            .unwrap();

        let rows = store
            .query("SELECT COUNT(*) AS total FROM projects", &[])
            .await
            .unwrap();
        assert_eq!(rows[0]["total"], json!(2));
    }

    #[tokio::test]
    async fn test_invalid_statement_is_database_error() {
        let (store, _tmp) = setup_test_store().await;
        let err = store.query("SELECT * FROM no_such_table", &[]).await.unwrap_err();
        assert!(matches!(err, Error::Database(_)));
        assert!(!err.is_fatal());
    }
}
