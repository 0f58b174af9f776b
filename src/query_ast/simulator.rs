//! Relational step simulator.
//!
//! Re-derives the intermediate tables of a statement from whole-table snapshots:
//! load, cartesian join, WHERE filter, GROUP BY partition and HAVING filter.
//! Every stage appends [`Step`]s; earlier steps are never revisited. The store is
//! only ever asked for `SELECT * FROM <table>;`.

use std::collections::HashMap;
use std::time::Instant;

use log::{debug, info};

use super::ast::{Aliased, Expr, SelectStatement};
use super::errors::{QueryAstError, Result};
use super::evaluator::evaluate;
use super::executor::RelationalStore;
use super::parser::parse;
use crate::config::SimulatorConfig;
use crate::models::{AnnotatedTable, Group, RowLabel, Step, StepKind, TableSnapshot, Value};

/// Separator placed between the values of a multi-expression group key.
pub const GROUP_KEY_SEPARATOR: &str = "-------";

const DEADLINE_CHECK_INTERVAL: usize = 1024;

/// Simulate `raw_sql` against `store` with the default configuration.
pub fn simulate(raw_sql: &str, store: &dyn RelationalStore) -> Result<Vec<Step>> {
    Simulator::new(store, SimulatorConfig::default()).simulate(raw_sql)
}

pub struct Simulator<'s> {
    store: &'s dyn RelationalStore,
    config: SimulatorConfig,
}

impl<'s> Simulator<'s> {
    pub fn new(store: &'s dyn RelationalStore, config: SimulatorConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn simulate(&self, raw_sql: &str) -> Result<Vec<Step>> {
        let statement = parse(raw_sql)?;
        self.simulate_select(statement.select())
    }

    /// Steps for an already parsed SELECT. A statement without FROM yields no steps.
    pub fn simulate_select(&self, select: &SelectStatement) -> Result<Vec<Step>> {
        if select.from.is_empty() {
            debug!("simulate: no FROM clause, nothing to show");
            return Ok(Vec::new());
        }
        let mut run = Run {
            store: self.store,
            config: &self.config,
            select,
            started: Instant::now(),
            steps: Vec::new(),
        };
        run.execute()?;
        info!("simulate: {} steps on {}", run.steps.len(), self.store.store_name());
        Ok(run.steps)
    }
}

/// State of one simulation: the statement, its clock and the steps so far.
struct Run<'a> {
    store: &'a dyn RelationalStore,
    config: &'a SimulatorConfig,
    select: &'a SelectStatement,
    started: Instant,
    steps: Vec<Step>,
}

impl Run<'_> {
    fn execute(&mut self) -> Result<()> {
        let select = self.select;
        let inputs = self.load()?;
        let joined = self.join(inputs)?;
        let filtered = match &select.where_clause {
            Some(predicate) => self.filter(joined, predicate)?,
            None => joined,
        };

        let grouped = select.group_by.is_some();
        let groups = match &select.group_by {
            Some(exprs) => self.group(&filtered, exprs)?,
            None => vec![filtered.clone()],
        };

        let result = match &select.having {
            Some(predicate) => self.having(groups, predicate)?,
            None if grouped => groups,
            None => vec![filtered],
        };
        self.steps.push(Step::side_by_side(
            StepKind::Result,
            result.into_iter().map(AnnotatedTable::plain).collect(),
        ));
        Ok(())
    }

    fn columns(&self) -> &[Aliased<Expr>] {
        &self.select.columns
    }

    fn check_deadline(&self) -> Result<()> {
        match self.config.time_budget {
            Some(budget) if self.started.elapsed() > budget => Err(QueryAstError::Resource(format!(
                "simulation exceeded its time budget of {} ms",
                budget.as_millis()
            ))),
            _ => Ok(()),
        }
    }

    /// Snapshot every FROM entry, columns renamed to `<alias-or-name>.<column>`.
    fn load(&mut self) -> Result<Vec<TableSnapshot>> {
        let mut tables = Vec::with_capacity(self.select.from.len());
        for entry in &self.select.from {
            let snapshot = self.store.fetch_table(&entry.item)?.qualified(entry.display_name());
            debug!("load: {} -> {} rows", entry, snapshot.row_count());
            tables.push(snapshot);
            self.check_deadline()?;
        }
        Ok(tables)
    }

    fn join(&mut self, mut tables: Vec<TableSnapshot>) -> Result<TableSnapshot> {
        if tables.len() == 1 {
            let table = tables.remove(0);
            self.steps.push(Step::single(StepKind::Load, AnnotatedTable::plain(table.clone())));
            return Ok(table);
        }

        self.steps.push(Step::side_by_side(
            StepKind::Load,
            tables.iter().map(|t| AnnotatedTable::with_row_labels(t.clone(), source_labels(0..t.row_count()))).collect(),
        ));

        let product = self.product_size(&tables)?;
        info!("join: cartesian product of {} tables, {} rows", tables.len(), product);

        // Later FROM entries vary fastest.
        let mut expanded = Vec::with_capacity(tables.len());
        let mut duplicates = product;
        for table in &tables {
            let n = table.row_count();
            if n > 0 {
                duplicates /= n;
            }
            let mut indices = Vec::with_capacity(product);
            for i in 0..product {
                if i % DEADLINE_CHECK_INTERVAL == 0 {
                    self.check_deadline()?;
                }
                indices.push((i / duplicates.max(1)) % n);
            }
            let labels = source_labels(indices.iter().copied());
            expanded.push(AnnotatedTable::with_row_labels(table.select_rows(&indices), labels));
        }

        let columns: Vec<String> = tables.iter().flat_map(|t| t.columns().iter().cloned()).collect();
        let mut rows = Vec::with_capacity(product);
        for i in 0..product {
            if i % DEADLINE_CHECK_INTERVAL == 0 {
                self.check_deadline()?;
            }
            rows.push(
                expanded
                    .iter()
                    .flat_map(|t| t.snapshot.rows()[i].iter().cloned())
                    .collect::<Vec<Value>>(),
            );
        }
        let joined = TableSnapshot::new(columns, rows)?;

        self.steps.push(Step::side_by_side(StepKind::Expand, expanded));
        self.steps.push(Step::single(StepKind::Join, AnnotatedTable::plain(joined.clone())));
        Ok(joined)
    }

    fn product_size(&self, tables: &[TableSnapshot]) -> Result<usize> {
        let product = tables
            .iter()
            .try_fold(1usize, |acc, t| acc.checked_mul(t.row_count()))
            .ok_or_else(|| QueryAstError::Resource("cartesian product size overflows".into()))?;
        match self.config.max_product_rows {
            Some(cap) if product > cap => Err(QueryAstError::Resource(format!(
                "cartesian product of {} rows exceeds max_product_rows ({})",
                product, cap
            ))),
            _ => Ok(product),
        }
    }

    fn filter(&mut self, table: TableSnapshot, predicate: &Expr) -> Result<TableSnapshot> {
        let mut labels = Vec::with_capacity(table.row_count());
        let mut kept = Vec::new();
        for (idx, row) in table.rows().iter().enumerate() {
            if idx % DEADLINE_CHECK_INTERVAL == 0 {
                self.check_deadline()?;
            }
            if evaluate(predicate, table.columns(), row, self.columns(), None)?.is_truthy() {
                labels.push(RowLabel::Kept);
                kept.push(idx);
            } else {
                labels.push(RowLabel::Rejected);
            }
        }
        debug!("where: kept {} of {} rows", kept.len(), table.row_count());

        let result = table.select_rows(&kept);
        self.steps.push(Step::single(StepKind::FilterMarked, AnnotatedTable::with_row_labels(table, labels)));
        self.steps.push(Step::single(StepKind::Filtered, AnnotatedTable::plain(result.clone())));
        Ok(result)
    }

    fn group(&mut self, table: &TableSnapshot, exprs: &[Expr]) -> Result<Vec<TableSnapshot>> {
        let groups = partition(table, exprs, self.columns())?;
        debug!("group by: {} rows into {} groups", table.row_count(), groups.len());

        let mut labels = vec![RowLabel::Group(0); table.row_count()];
        for (id, group) in groups.iter().enumerate() {
            for &member in &group.members {
                labels[member] = RowLabel::Group(id);
            }
        }
        let tables: Vec<TableSnapshot> = groups.iter().map(|g| table.select_rows(&g.members)).collect();

        self.steps.push(Step::single(StepKind::GroupMarked, AnnotatedTable::with_row_labels(table.clone(), labels)));
        self.steps.push(Step::side_by_side(
            StepKind::Grouped,
            tables
                .iter()
                .enumerate()
                .map(|(id, t)| AnnotatedTable::with_table_label(t.clone(), RowLabel::Group(id)))
                .collect(),
        ));
        self.check_deadline()?;
        Ok(tables)
    }

    /// Evaluate the predicate once per group. Non-aggregate references read the
    /// group's last row; an empty group reads a row of NULLs.
    fn having(&mut self, groups: Vec<TableSnapshot>, predicate: &Expr) -> Result<Vec<TableSnapshot>> {
        let mut marked = Vec::with_capacity(groups.len());
        let mut kept = Vec::new();
        for group in groups {
            let nulls;
            let representative = match group.rows().last() {
                Some(row) => row.as_slice(),
                None => {
                    nulls = vec![Value::Null; group.columns().len()];
                    nulls.as_slice()
                }
            };
            let keep = evaluate(predicate, group.columns(), representative, self.columns(), Some(group.rows()))?
                .is_truthy();
            if keep {
                kept.push(group.clone());
            }
            let label = if keep { RowLabel::Kept } else { RowLabel::Rejected };
            marked.push(AnnotatedTable::with_table_label(group, label));
        }
        debug!("having: kept {} of {} groups", kept.len(), marked.len());

        self.steps.push(Step::side_by_side(StepKind::HavingMarked, marked));
        self.check_deadline()?;
        Ok(kept)
    }
}

/// Partition rows by their group key. Group ids follow first-seen order.
pub fn partition(table: &TableSnapshot, exprs: &[Expr], select_clause: &[Aliased<Expr>]) -> Result<Vec<Group>> {
    let mut groups: Vec<Group> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for (idx, row) in table.rows().iter().enumerate() {
        let key = exprs
            .iter()
            .map(|e| evaluate(e, table.columns(), row, select_clause, None).map(|v| v.to_string()))
            .collect::<Result<Vec<_>>>()?
            .join(GROUP_KEY_SEPARATOR);
        match index.get(&key) {
            Some(&id) => groups[id].members.push(idx),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(Group { key, members: vec![idx] });
            }
        }
    }
    Ok(groups)
}

fn source_labels(indices: impl IntoIterator<Item = usize>) -> Vec<RowLabel> {
    indices.into_iter().map(RowLabel::Source).collect()
}
