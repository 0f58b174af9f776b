//! Statement and expression trees produced by the parser.
//!
//! `Display` prints canonical SQL: single spaces, every nested binary operand
//! parenthesised, so printing and re-parsing yields an equal tree.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Raw numeric text; converted to a float on evaluation.
    Numeric(String),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Or,
    And,
    NotEq,
    Eq,
    Gt,
    GtEq,
    Lt,
    LtEq,
    Plus,
    Minus,
    Multiply,
    Divide,
}

impl BinaryOperator {
    /// Lowest precedence first. A flat operand/operator sequence is split at the
    /// first textual occurrence of the earliest operator in this list present.
    pub const PRECEDENCE: [BinaryOperator; 12] = [
        BinaryOperator::Or,
        BinaryOperator::And,
        BinaryOperator::NotEq,
        BinaryOperator::Eq,
        BinaryOperator::Gt,
        BinaryOperator::GtEq,
        BinaryOperator::Lt,
        BinaryOperator::LtEq,
        BinaryOperator::Plus,
        BinaryOperator::Minus,
        BinaryOperator::Multiply,
        BinaryOperator::Divide,
    ];

    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Or => "OR",
            BinaryOperator::And => "AND",
            BinaryOperator::NotEq => "!=",
            BinaryOperator::Eq => "=",
            BinaryOperator::Gt => ">",
            BinaryOperator::GtEq => ">=",
            BinaryOperator::Lt => "<",
            BinaryOperator::LtEq => "<=",
            BinaryOperator::Plus => "+",
            BinaryOperator::Minus => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Column(String),
    Qualified { table: String, column: String },
    Aggregate { function: String, inner: Box<Expr> },
    BinaryOp { op: BinaryOperator, left: Box<Expr>, right: Box<Expr> },
}

impl Expr {
    pub fn column(name: impl Into<String>) -> Self {
        Expr::Column(name.into())
    }

    pub fn number(raw: impl Into<String>) -> Self {
        Expr::Literal(Literal::Numeric(raw.into()))
    }

    pub fn string(raw: impl Into<String>) -> Self {
        Expr::Literal(Literal::String(raw.into()))
    }

    pub fn binary(op: BinaryOperator, left: Expr, right: Expr) -> Self {
        Expr::BinaryOp { op, left: Box::new(left), right: Box::new(right) }
    }

    pub fn contains_aggregate(&self) -> bool {
        match self {
            Expr::Aggregate { .. } => true,
            Expr::BinaryOp { left, right, .. } => left.contains_aggregate() || right.contains_aggregate(),
            Expr::Literal(_) | Expr::Column(_) | Expr::Qualified { .. } => false,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(Literal::Numeric(n)) => write!(f, "{}", n),
            Expr::Literal(Literal::String(s)) => {
                if s.contains('"') { write!(f, "'{}'", s) } else { write!(f, "\"{}\"", s) }
            }
            Expr::Column(c) => write!(f, "{}", c),
            Expr::Qualified { table, column } => write!(f, "{}.{}", table, column),
            Expr::Aggregate { function, inner } => write!(f, "{}({})", function, inner),
            Expr::BinaryOp { op, left, right } => {
                write_operand(f, left)?;
                write!(f, " {} ", op)?;
                write_operand(f, right)
            }
        }
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, e: &Expr) -> fmt::Result {
    match e {
        Expr::BinaryOp { .. } => write!(f, "({})", e),
        _ => write!(f, "{}", e),
    }
}

/// A production optionally followed by `AS alias`.
#[derive(Debug, Clone, PartialEq)]
pub struct Aliased<T> {
    pub item: T,
    pub alias: Option<String>,
}

impl<T> Aliased<T> {
    pub fn bare(item: T) -> Self {
        Self { item, alias: None }
    }

    pub fn named(item: T, alias: impl Into<String>) -> Self {
        Self { item, alias: Some(alias.into()) }
    }
}

impl Aliased<String> {
    /// Name a FROM entry's columns are qualified with.
    pub fn display_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.item)
    }
}

impl<T: fmt::Display> fmt::Display for Aliased<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.alias {
            Some(a) => write!(f, "{} AS {}", self.item, a),
            None => write!(f, "{}", self.item),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortItem {
    pub expr: Expr,
    pub asc: bool,
}

impl fmt::Display for SortItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.asc { write!(f, "{}", self.expr) } else { write!(f, "{} DESC", self.expr) }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectStatement {
    pub columns: Vec<Aliased<Expr>>,
    pub from: Vec<Aliased<String>>,
    pub where_clause: Option<Expr>,
    pub group_by: Option<Vec<Expr>>,
    pub having: Option<Expr>,
    /// Parsed for the store only; the simulator ignores ordering.
    pub order_by: Option<Vec<SortItem>>,
    /// Parsed for the store only; the simulator ignores limits.
    pub limit: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableAs {
    pub table_name: String,
    pub select: SelectStatement,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(SelectStatement),
    CreateTableAs(CreateTableAs),
}

impl Statement {
    /// The SELECT whose evaluation gets simulated.
    pub fn select(&self) -> &SelectStatement {
        match self {
            Statement::Select(s) => s,
            Statement::CreateTableAs(c) => &c.select,
        }
    }
}

fn join_list<T: fmt::Display>(items: &[T]) -> String {
    items.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(", ")
}

impl fmt::Display for SelectStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT {}", join_list(&self.columns))?;
        if !self.from.is_empty() {
            write!(f, " FROM {}", join_list(&self.from))?;
        }
        if let Some(w) = &self.where_clause {
            write!(f, " WHERE {}", w)?;
        }
        if let Some(g) = &self.group_by {
            write!(f, " GROUP BY {}", join_list(g))?;
        }
        if let Some(h) = &self.having {
            write!(f, " HAVING {}", h)?;
        }
        if let Some(o) = &self.order_by {
            write!(f, " ORDER BY {}", join_list(o))?;
        }
        if let Some(l) = &self.limit {
            write!(f, " LIMIT {}", l)?;
        }
        write!(f, ";")
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Select(s) => write!(f, "{}", s),
            Statement::CreateTableAs(c) => write!(f, "CREATE TABLE {} AS {}", c.table_name, c.select),
        }
    }
}
