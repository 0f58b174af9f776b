use sqlformat::{FormatOptions, Indent, QueryParams};

use crate::query_ast::{self, SelectStatement, Statement};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LintSeverity {
    Info,
    Warning,
}

/// Remark about how a statement will be simulated.
#[derive(Clone, Debug, PartialEq)]
pub struct LintMessage {
    pub severity: LintSeverity,
    pub message: String,
    pub hint: Option<String>,
}

impl LintMessage {
    fn info(message: impl Into<String>) -> Self {
        Self { severity: LintSeverity::Info, message: message.into(), hint: None }
    }

    fn warning(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self { severity: LintSeverity::Warning, message: message.into(), hint: Some(hint.into()) }
    }
}

/// Parsed statement, its canonical formatted text and simulation remarks.
#[derive(Clone, Debug)]
pub struct Explanation {
    pub statement: Statement,
    pub formatted: String,
    pub lints: Vec<LintMessage>,
}

/// Parse `sql` and describe it. Syntax errors propagate unchanged.
pub fn explain(sql: &str) -> query_ast::Result<Explanation> {
    let statement = query_ast::parse(sql)?;
    let formatted = format_sql(&statement.to_string());
    let lints = lint_statement(&statement);
    Ok(Explanation { statement, formatted, lints })
}

pub fn format_sql(sql: &str) -> String {
    sqlformat::format(sql.trim(), &QueryParams::None, &default_sqlformat_options())
}

pub fn lint_statement(statement: &Statement) -> Vec<LintMessage> {
    let select: &SelectStatement = statement.select();
    let mut messages = Vec::new();

    if let Statement::CreateTableAs(c) = statement {
        messages.push(LintMessage::info(format!(
            "Only the SELECT feeding {} is simulated; the store creates the table.",
            c.table_name
        )));
    }

    match select.from.len() {
        0 => messages.push(LintMessage::info("No FROM clause: nothing to simulate.")),
        1 => {}
        n => messages.push(LintMessage::warning(
            format!("FROM lists {} tables: the join is a full cartesian product.", n),
            "Narrow the product early with a WHERE clause.",
        )),
    }

    if select.having.is_some() && select.group_by.is_none() {
        messages.push(LintMessage::info("HAVING without GROUP BY treats the whole table as one group."));
    }

    let aggregated = select.columns.iter().any(|c| c.item.contains_aggregate());
    if select.where_clause.as_ref().is_some_and(|w| w.contains_aggregate()) {
        messages.push(LintMessage::warning(
            "WHERE uses an aggregate, which fails outside a grouped context.",
            "Move the aggregate condition to HAVING.",
        ));
    }
    if aggregated && select.group_by.is_none() && select.having.is_none() {
        messages.push(LintMessage::info("Aggregates without GROUP BY are computed by the store only."));
    }

    if select.order_by.is_some() || select.limit.is_some() {
        messages.push(LintMessage::info("ORDER BY and LIMIT are applied by the store, not shown as steps."));
    }

    messages
}

// Centralized sqlformat options used across the app
pub fn default_sqlformat_options() -> FormatOptions<'static> {
    FormatOptions {
        indent: Indent::Spaces(4),
        uppercase: Some(true),
        lines_between_queries: 1,
        inline: false,
        max_inline_block: 50,
        max_inline_arguments: Some(60),
        max_inline_top_level: Some(60),
        ..Default::default()
    }
}
