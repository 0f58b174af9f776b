use log::debug;

use super::ast::{Aliased, CreateTableAs, SelectStatement, SortItem, Statement};
use super::errors::{Result, syntax};
use super::expression::parse_expr;
use super::tokenizer::{Token, tokenize};

/// Cursor over a token sequence shared by the statement and expression parsers.
pub struct TokenBuffer<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
}

impl<'a> TokenBuffer<'a> {
    pub fn new(tokens: Vec<Token<'a>>) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    pub fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.pos).copied()
    }

    pub fn peek_nth(&self, n: usize) -> Option<Token<'a>> {
        self.tokens.get(self.pos + n).copied()
    }

    /// Exact (case-sensitive) match against the next token.
    pub fn peek_is(&self, expected: &str) -> bool {
        self.peek() == Some(expected)
    }

    /// Case-insensitive match against the next token.
    pub fn peek_keyword(&self, keyword: &str) -> bool {
        self.peek().is_some_and(|t| t.eq_ignore_ascii_case(keyword))
    }

    pub fn pop(&mut self) -> Result<Token<'a>> {
        let token = self.peek().ok_or_else(|| syntax("unexpected end of statement"))?;
        self.pos += 1;
        Ok(token)
    }

    pub fn expect(&mut self, expected: &str, msg: &str) -> Result<()> {
        match self.peek() {
            Some(t) if t == expected => {
                self.pos += 1;
                Ok(())
            }
            _ => Err(syntax(msg)),
        }
    }

    pub fn expect_keyword(&mut self, keyword: &str, msg: &str) -> Result<()> {
        if self.peek_keyword(keyword) {
            self.pos += 1;
            Ok(())
        } else {
            Err(syntax(msg))
        }
    }
}

/// Parse one statement. A missing trailing `;` is appended once.
pub fn parse(text: &str) -> Result<Statement> {
    let mut tokens = tokenize(text);
    if tokens.is_empty() {
        return Err(syntax("No tokens found"));
    }
    if tokens.last() != Some(&";") {
        tokens.push(";");
    }
    let mut buf = TokenBuffer::new(tokens);
    let statement = parse_statement(&mut buf)?;
    debug!("parsed statement: {}", statement);
    Ok(statement)
}

fn parse_statement(buf: &mut TokenBuffer<'_>) -> Result<Statement> {
    let first = buf.pop()?.to_ascii_uppercase();
    match first.as_str() {
        "SELECT" => Ok(Statement::Select(parse_select_body(buf)?)),
        "CREATE" => {
            buf.expect_keyword("TABLE", "CREATE must be followed by TABLE")?;
            let table_name = buf.pop()?.to_string();
            buf.expect_keyword("AS", "CREATE TABLE <name> must be followed by AS")?;
            buf.expect_keyword("SELECT", "CREATE TABLE ... AS must be followed by a SELECT statement")?;
            let select = parse_select_body(buf)?;
            Ok(Statement::CreateTableAs(CreateTableAs { table_name, select }))
        }
        _ => Err(syntax("Can only handle SELECT and CREATE TABLE ... AS statements")),
    }
}

type ClauseParser = fn(&mut TokenBuffer<'_>, &mut SelectStatement) -> Result<()>;

/// Optional SELECT clauses, checked in this order only. A keyword appearing out
/// of order is not consumed here and ends up failing the terminator check.
const CLAUSES: [(&str, ClauseParser); 6] = [
    ("FROM", parse_from),
    ("WHERE", parse_where),
    ("GROUP", parse_group_by),
    ("HAVING", parse_having),
    ("ORDER", parse_order_by),
    ("LIMIT", parse_limit),
];

fn parse_select_body(buf: &mut TokenBuffer<'_>) -> Result<SelectStatement> {
    let mut stmt = SelectStatement {
        columns: comma_list(buf, |b| aliased(b, parse_expr))?,
        ..Default::default()
    };
    for (keyword, clause) in CLAUSES {
        if buf.peek_is(";") {
            break;
        }
        if buf.peek_keyword(keyword) {
            buf.pop()?;
            clause(buf, &mut stmt)?;
        }
    }
    buf.expect(";", "SELECT statement not terminated.")?;
    Ok(stmt)
}

fn parse_from(buf: &mut TokenBuffer<'_>, stmt: &mut SelectStatement) -> Result<()> {
    stmt.from = comma_list(buf, |b| aliased(b, |b| Ok(b.pop()?.to_string())))?;
    Ok(())
}

fn parse_where(buf: &mut TokenBuffer<'_>, stmt: &mut SelectStatement) -> Result<()> {
    stmt.where_clause = Some(parse_expr(buf)?);
    Ok(())
}

fn parse_group_by(buf: &mut TokenBuffer<'_>, stmt: &mut SelectStatement) -> Result<()> {
    buf.expect_keyword("BY", "GROUP must be followed by BY")?;
    stmt.group_by = Some(comma_list(buf, parse_expr)?);
    Ok(())
}

fn parse_having(buf: &mut TokenBuffer<'_>, stmt: &mut SelectStatement) -> Result<()> {
    stmt.having = Some(parse_expr(buf)?);
    Ok(())
}

fn parse_order_by(buf: &mut TokenBuffer<'_>, stmt: &mut SelectStatement) -> Result<()> {
    buf.expect_keyword("BY", "ORDER must be followed by BY")?;
    stmt.order_by = Some(comma_list(buf, |b| {
        let expr = parse_expr(b)?;
        let asc = if b.peek_keyword("DESC") {
            b.pop()?;
            false
        } else {
            if b.peek_keyword("ASC") {
                b.pop()?;
            }
            true
        };
        Ok(SortItem { expr, asc })
    })?);
    Ok(())
}

fn parse_limit(buf: &mut TokenBuffer<'_>, stmt: &mut SelectStatement) -> Result<()> {
    stmt.limit = Some(parse_expr(buf)?);
    Ok(())
}

/// Parse `item`, then an optional `AS alias`.
fn aliased<'a, T>(
    buf: &mut TokenBuffer<'a>,
    item: impl Fn(&mut TokenBuffer<'a>) -> Result<T>,
) -> Result<Aliased<T>> {
    let item = item(buf)?;
    let alias = if buf.peek_keyword("AS") {
        buf.pop()?;
        Some(buf.pop()?.to_string())
    } else {
        None
    };
    Ok(Aliased { item, alias })
}

/// Parse one or more `item`s separated by `,`.
fn comma_list<'a, T>(
    buf: &mut TokenBuffer<'a>,
    item: impl Fn(&mut TokenBuffer<'a>) -> Result<T>,
) -> Result<Vec<T>> {
    let mut out = Vec::new();
    loop {
        out.push(item(buf)?);
        if !buf.peek_is(",") {
            return Ok(out);
        }
        buf.pop()?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_ast::ast::{BinaryOperator, Expr};
    use crate::query_ast::errors::QueryAstError;

    fn select(sql: &str) -> SelectStatement {
        match parse(sql).expect("parse") {
            Statement::Select(s) => s,
            other => panic!("expected SELECT, got {:?}", other),
        }
    }

    #[test]
    fn select_with_every_clause() {
        let s = select(
            "SELECT name AS n, count(*) AS c FROM dogs AS d, parents \
             WHERE d.age > 2 GROUP BY name HAVING c > 1 ORDER BY name DESC LIMIT 5;",
        );
        assert_eq!(s.columns.len(), 2);
        assert_eq!(s.columns[0].alias.as_deref(), Some("n"));
        assert_eq!(s.from[0], Aliased::named("dogs".to_string(), "d"));
        assert_eq!(s.from[1], Aliased::bare("parents".to_string()));
        assert!(s.where_clause.is_some());
        assert_eq!(s.group_by, Some(vec![Expr::column("name")]));
        assert_eq!(
            s.having,
            Some(Expr::binary(BinaryOperator::Gt, Expr::column("c"), Expr::number("1")))
        );
        assert_eq!(s.order_by, Some(vec![SortItem { expr: Expr::column("name"), asc: false }]));
        assert_eq!(s.limit, Some(Expr::number("5")));
    }

    #[test]
    fn keywords_are_case_insensitive_and_semicolon_optional() {
        let s = select("select a as b from t where a = 1");
        assert_eq!(s.columns[0].alias.as_deref(), Some("b"));
        assert_eq!(s.from.len(), 1);
        assert!(s.where_clause.is_some());
    }

    #[test]
    fn create_table_as_wraps_select() {
        match parse("CREATE TABLE big AS SELECT name FROM dogs WHERE weight > 50;").unwrap() {
            Statement::CreateTableAs(c) => {
                assert_eq!(c.table_name, "big");
                assert_eq!(c.select.from[0].item, "dogs");
            }
            other => panic!("expected CREATE TABLE AS, got {:?}", other),
        }
    }

    #[test]
    fn create_requires_table_and_as() {
        assert!(matches!(parse("CREATE t AS SELECT 1;"), Err(QueryAstError::Syntax(_))));
        assert!(matches!(parse("CREATE TABLE t SELECT 1;"), Err(QueryAstError::Syntax(_))));
        assert!(matches!(parse("CREATE TABLE t AS 1;"), Err(QueryAstError::Syntax(_))));
    }

    #[test]
    fn empty_input_is_rejected() {
        assert_eq!(parse("   "), Err(QueryAstError::Syntax("No tokens found".into())));
    }

    #[test]
    fn unsupported_statement_is_rejected() {
        assert!(matches!(parse("INSERT INTO t VALUES (1);"), Err(QueryAstError::Syntax(_))));
    }

    #[test]
    fn group_and_order_need_by() {
        assert!(matches!(parse("SELECT a FROM t GROUP a;"), Err(QueryAstError::Syntax(_))));
        assert!(matches!(parse("SELECT a FROM t ORDER a;"), Err(QueryAstError::Syntax(_))));
    }

    #[test]
    fn out_of_order_clause_fails_termination() {
        let err = parse("SELECT a FROM t LIMIT 1 WHERE a > 1;").unwrap_err();
        assert_eq!(err, QueryAstError::Syntax("SELECT statement not terminated.".into()));
        assert!(parse("SELECT a WHERE a > 1 FROM t;").is_err());
    }

    #[test]
    fn printed_statement_reparses_to_same_tree() {
        let inputs = [
            "SELECT a.x + b.y * 2 AS s, max(a.z) FROM a, b AS bb WHERE (a.x > 1 OR b.y <= 3) AND a.x != 4;",
            "SELECT name FROM dogs GROUP BY name, age HAVING count(*) >= 2 ORDER BY name LIMIT 10;",
            "CREATE TABLE t AS SELECT 10 - 3 - 2 AS v FROM u WHERE name = 'rex';",
        ];
        for input in inputs {
            let first = parse(input).unwrap();
            let second = parse(&first.to_string()).unwrap();
            assert_eq!(first, second, "round trip of {}", input);
        }
    }
}
