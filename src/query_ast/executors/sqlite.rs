//! SQLite relational store

use std::path::Path;
use std::str::FromStr;

use log::debug;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Executor, Row, SqlitePool, Statement, TypeInfo, ValueRef};
use tokio::runtime::Runtime;

use crate::models::{ResultTable, Value};
use crate::query_ast::errors::{QueryAstError, Result};
use crate::query_ast::executor::{RelationalStore, split_statements};

/// SQLite database driven through sqlx on a private runtime. Each call blocks
/// until the statements have run, so callers stay synchronous.
pub struct SqliteStore {
    pool: SqlitePool,
    name: String,
    runtime: Runtime,
}

impl SqliteStore {
    pub fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        Self::connect(":memory:".to_string(), options)
    }

    /// Open (creating if missing) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let options = SqliteConnectOptions::new().filename(path).create_if_missing(true);
        Self::connect(path.display().to_string(), options)
    }

    fn connect(name: String, options: SqliteConnectOptions) -> Result<Self> {
        let runtime = Runtime::new().map_err(|e| QueryAstError::Store(format!("cannot start runtime: {}", e)))?;
        // One long-lived connection: an in-memory database lives exactly as long
        // as its connection.
        let pool = runtime.block_on(
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options),
        )?;
        debug!("SqliteStore: opened {}", name);
        Ok(Self { pool, name, runtime })
    }

    pub fn table_names(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = self.runtime.block_on(
            sqlx::query_as(
                "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            )
            .fetch_all(&self.pool),
        )?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    /// `CREATE` statements of every table, each terminated with `;`
    pub fn schema(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = self.runtime.block_on(
            sqlx::query_as("SELECT sql || ';' FROM sqlite_master WHERE type='table' AND sql IS NOT NULL")
                .fetch_all(&self.pool),
        )?;
        Ok(rows.into_iter().map(|(sql,)| sql).collect())
    }

    async fn run_statement(&self, sql: &str) -> Result<Option<ResultTable>> {
        let prepared = (&self.pool).prepare(sql).await?;
        let columns: Vec<String> = prepared.columns().iter().map(|c| c.name().to_string()).collect();
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        debug!("SqliteStore: {} returned {} rows, {} columns", sql, rows.len(), columns.len());
        if columns.is_empty() {
            return Ok(None);
        }
        let rows: Vec<Vec<Value>> = rows
            .iter()
            .map(|row| (0..row.columns().len()).map(|i| decode_value(row, i)).collect())
            .collect();
        Ok(Some(ResultTable { columns, rows }))
    }
}

impl RelationalStore for SqliteStore {
    fn store_name(&self) -> &str {
        &self.name
    }

    fn execute(&self, sql: &str) -> Result<Vec<ResultTable>> {
        self.runtime.block_on(async {
            let mut tables = Vec::new();
            for statement in split_statements(sql) {
                if let Some(table) = self.run_statement(statement).await? {
                    tables.push(table);
                }
            }
            Ok(tables)
        })
    }
}

impl Drop for SqliteStore {
    fn drop(&mut self) {
        self.runtime.block_on(self.pool.close());
    }
}

/// Decode by the storage class of the value itself, falling back through the
/// wider types when a decode is refused.
fn decode_value(row: &SqliteRow, idx: usize) -> Value {
    let type_name = match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => raw.type_info().name().to_string(),
        Err(_) => return Value::Null,
    };

    match type_name.as_str() {
        "INTEGER" | "BOOLEAN" => {
            if let Ok(v) = row.try_get::<i64, _>(idx) {
                return Value::Integer(v);
            }
        }
        "REAL" | "NUMERIC" => {
            if let Ok(v) = row.try_get::<f64, _>(idx) {
                return Value::Real(v);
            }
        }
        "BLOB" => {
            if let Ok(v) = row.try_get::<Vec<u8>, _>(idx) {
                return Value::Text(format!("<BLOB {} bytes>", v.len()));
            }
        }
        _ => {}
    }

    if let Ok(v) = row.try_get::<String, _>(idx) {
        Value::Text(v)
    } else if let Ok(v) = row.try_get::<i64, _>(idx) {
        Value::Integer(v)
    } else if let Ok(v) = row.try_get::<f64, _>(idx) {
        Value::Real(v)
    } else {
        Value::Text(format!("Unsupported type '{}'", type_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .execute(
                "CREATE TABLE dogs (name TEXT, weight REAL, age INTEGER);\
                 INSERT INTO dogs VALUES ('rex', 40.5, 3), ('fido', NULL, 7);",
            )
            .unwrap();
        store
    }

    #[test]
    fn select_returns_typed_values() {
        let tables = store().execute("SELECT * FROM dogs;").unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].columns, vec!["name", "weight", "age"]);
        assert_eq!(
            tables[0].rows[0],
            vec![Value::from("rex"), Value::Real(40.5), Value::Integer(3)]
        );
        assert_eq!(tables[0].rows[1][1], Value::Null);
    }

    #[test]
    fn empty_select_keeps_columns() {
        let tables = store().execute("SELECT name FROM dogs WHERE age > 100;").unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].columns, vec!["name"]);
        assert!(tables[0].rows.is_empty());
    }

    #[test]
    fn one_table_per_result_set() {
        let tables = store().execute("SELECT 1; CREATE TABLE t (a); SELECT 2, 3;").unwrap();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[1].rows[0], vec![Value::Integer(2), Value::Integer(3)]);
    }

    #[test]
    fn store_errors_carry_sqlite_message() {
        match store().execute("SELECT * FROM cats;") {
            Err(QueryAstError::Store(msg)) => assert!(msg.contains("no such table"), "{}", msg),
            other => panic!("expected store error, got {:?}", other),
        }
    }

    #[test]
    fn lists_tables_and_schema() {
        let store = store();
        assert_eq!(store.table_names().unwrap(), vec!["dogs".to_string()]);
        assert!(store.schema().unwrap()[0].starts_with("CREATE TABLE dogs"));
    }
}
