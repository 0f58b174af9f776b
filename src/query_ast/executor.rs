//! Relational store abstraction
//!
//! The simulator never executes the user's statement itself. It only reads
//! whole tables through a store, and the caller runs the raw statement
//! against the same store for the authoritative result.

use log::debug;

use super::errors::{QueryAstError, Result};
use crate::models::{ResultTable, TableSnapshot};

/// Opaque relational store that accepts SQL text and returns result tables.
///
/// Implementations report their own failures as [`QueryAstError::Store`] with
/// the store's message unchanged.
pub trait RelationalStore {
    /// Human readable name of the underlying database (file path or `:memory:`)
    fn store_name(&self) -> &str;

    /// Execute one or more `;`-separated statements, returning one table per
    /// statement that produced a result set.
    fn execute(&self, sql: &str) -> Result<Vec<ResultTable>>;

    /// Full snapshot of a table, as seen by `SELECT * FROM <name>;`
    fn fetch_table(&self, name: &str) -> Result<TableSnapshot> {
        let sql = format!("SELECT * FROM {};", name);
        debug!("{}: loading snapshot with {}", self.store_name(), sql);
        let table = self
            .execute(&sql)?
            .into_iter()
            .next()
            .ok_or_else(|| QueryAstError::Store(format!("no result set for table {}", name)))?;
        TableSnapshot::try_from(table)
    }
}

/// Split a script into statements on `;` outside of quotes. Blank statements
/// are dropped; the terminating `;` is kept with its statement.
pub fn split_statements(script: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut quote: Option<char> = None;

    for (i, c) in script.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' || c == '`' => quote = Some(c),
            None if c == ';' => {
                let stmt = &script[start..=i];
                if !stmt.trim_end_matches(';').trim().is_empty() {
                    out.push(stmt.trim());
                }
                start = i + 1;
            }
            None => {}
        }
    }

    let tail = script[start..].trim();
    if !tail.is_empty() {
        out.push(tail);
    }
    out
}
