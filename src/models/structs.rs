use serde::{Deserialize, Serialize};

use crate::models::enums::{RowLabel, StepKind, Value};
use crate::query_ast::errors::QueryAstError;

pub type Row = Vec<Value>;

/// Raw result set returned by a relational store.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

/// Immutable column/row data captured at one point of the simulation.
/// Every row holds exactly `columns.len()` values.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TableSnapshot {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl TableSnapshot {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Result<Self, QueryAstError> {
        if let Some((idx, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(QueryAstError::Evaluation(format!(
                "row {} has {} values but the table has {} columns",
                idx,
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    pub fn empty(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Copy of this table with every column renamed to `prefix.column`.
    pub fn qualified(&self, prefix: &str) -> Self {
        Self {
            columns: self
                .columns
                .iter()
                .map(|c| format!("{}.{}", prefix, c))
                .collect(),
            rows: self.rows.clone(),
        }
    }

    /// New table holding the rows at `indices`, in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: indices
                .iter()
                .filter_map(|&i| self.rows.get(i).cloned())
                .collect(),
        }
    }
}

impl TryFrom<ResultTable> for TableSnapshot {
    type Error = QueryAstError;

    fn try_from(table: ResultTable) -> Result<Self, Self::Error> {
        TableSnapshot::new(table.columns, table.rows)
    }
}

/// A partition of a snapshot's rows sharing one group key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub key: String,
    pub members: Vec<usize>,
}

/// A snapshot plus the labels a renderer highlights it with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedTable {
    pub snapshot: TableSnapshot,
    /// Label for the table as a whole (e.g. a group kept by HAVING).
    pub table_label: Option<RowLabel>,
    /// One label per row, when rows are classified individually.
    pub row_labels: Option<Vec<RowLabel>>,
}

impl AnnotatedTable {
    pub fn plain(snapshot: TableSnapshot) -> Self {
        Self {
            snapshot,
            table_label: None,
            row_labels: None,
        }
    }

    pub fn with_row_labels(snapshot: TableSnapshot, labels: Vec<RowLabel>) -> Self {
        debug_assert_eq!(snapshot.row_count(), labels.len());
        Self {
            snapshot,
            table_label: None,
            row_labels: Some(labels),
        }
    }

    pub fn with_table_label(snapshot: TableSnapshot, label: RowLabel) -> Self {
        Self {
            snapshot,
            table_label: Some(label),
            row_labels: None,
        }
    }

    /// Label for row `idx`, falling back to the table label.
    pub fn label_for_row(&self, idx: usize) -> Option<RowLabel> {
        self.row_labels
            .as_ref()
            .and_then(|labels| labels.get(idx).copied())
            .or(self.table_label)
    }
}

/// One emitted stage of the simulated query plan. Tables are shown side by side.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub kind: StepKind,
    pub tables: Vec<AnnotatedTable>,
}

impl Step {
    pub fn single(kind: StepKind, table: AnnotatedTable) -> Self {
        Self {
            kind,
            tables: vec![table],
        }
    }

    pub fn side_by_side(kind: StepKind, tables: Vec<AnnotatedTable>) -> Self {
        Self { kind, tables }
    }

    pub fn title(&self) -> &'static str {
        self.kind.title()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TableSnapshot {
        TableSnapshot::new(
            vec!["id".into(), "name".into()],
            vec![
                vec![Value::Integer(1), Value::from("a")],
                vec![Value::Integer(2), Value::from("b")],
                vec![Value::Integer(3), Value::from("c")],
            ],
        )
        .unwrap()
    }

    #[test]
    fn rejects_ragged_rows() {
        let err = TableSnapshot::new(vec!["a".into()], vec![vec![]]).unwrap_err();
        assert!(matches!(err, QueryAstError::Evaluation(_)));
    }

    #[test]
    fn qualified_renames_every_column() {
        let t = sample().qualified("d");
        assert_eq!(t.columns(), &["d.id".to_string(), "d.name".to_string()]);
        assert_eq!(t.row_count(), 3);
    }

    #[test]
    fn select_rows_keeps_requested_order() {
        let t = sample().select_rows(&[2, 0]);
        assert_eq!(t.rows()[0][0], Value::Integer(3));
        assert_eq!(t.rows()[1][0], Value::Integer(1));
    }

    #[test]
    fn table_label_is_row_fallback() {
        let t = AnnotatedTable::with_table_label(sample(), RowLabel::Kept);
        assert_eq!(t.label_for_row(1), Some(RowLabel::Kept));
        let t = AnnotatedTable::with_row_labels(
            sample(),
            vec![RowLabel::Kept, RowLabel::Rejected, RowLabel::Kept],
        );
        assert_eq!(t.label_for_row(1), Some(RowLabel::Rejected));
    }
}
