//! Expression parser.
//!
//! An expression is read as a flat alternating sequence of operands and
//! operators, then folded into a tree by [`hierarchize`]. The fold splits at the
//! *first* occurrence of the lowest-precedence operator present, so chains of one
//! operator group to the right: `10 - 3 - 2` is `10 - (3 - 2)`.

use once_cell::sync::Lazy;
use regex::Regex;

use super::ast::{BinaryOperator, Expr};
use super::errors::{Result, syntax};
use super::parser::TokenBuffer;
use super::tokenizer::is_quote;

static NUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").expect("valid numeric pattern"));

pub(crate) fn is_numeric(token: &str) -> bool {
    NUMERIC.is_match(token)
}

pub fn parse_expr(buf: &mut TokenBuffer<'_>) -> Result<Expr> {
    let mut operands = Vec::new();
    let mut ops = Vec::new();
    loop {
        operands.push(parse_operand(buf)?);
        match parse_operator(buf)? {
            Some(op) => ops.push(op),
            None => break,
        }
    }
    hierarchize(operands, &ops)
}

fn parse_operand(buf: &mut TokenBuffer<'_>) -> Result<Expr> {
    if buf.peek_is("(") {
        buf.pop()?;
        let inner = parse_expr(buf)?;
        buf.expect(")", "Parens not closed correctly")?;
        return Ok(inner);
    }

    let first = buf.pop()?;
    if is_quote(first) {
        let content = buf.pop()?;
        buf.expect(first, "Quotation marks must be matched")?;
        return Ok(Expr::string(content));
    }
    // `3.14` arrives as `3` `.` `14`
    if is_numeric(first) && buf.peek_is(".") && buf.peek_nth(1).is_some_and(is_numeric) {
        buf.pop()?;
        let fraction = buf.pop()?;
        return Ok(Expr::number(format!("{}.{}", first, fraction)));
    }
    if buf.peek_is(".") {
        buf.pop()?;
        let column = buf.pop()?;
        return Ok(Expr::Qualified { table: first.to_string(), column: column.to_string() });
    }
    if buf.peek_is("(") {
        buf.pop()?;
        let inner = parse_expr(buf)?;
        buf.expect(")", "Aggregates should only take one expression")?;
        return Ok(Expr::Aggregate { function: first.to_string(), inner: Box::new(inner) });
    }
    if is_numeric(first) {
        return Ok(Expr::number(first));
    }
    Ok(Expr::column(first))
}

/// Consume the operator following an operand, if any, folding the two-token
/// spellings `! =`, `< >`, `< =` and `> =`.
fn parse_operator(buf: &mut TokenBuffer<'_>) -> Result<Option<BinaryOperator>> {
    let Some(token) = buf.peek() else { return Ok(None) };
    let op = match token.to_ascii_uppercase().as_str() {
        "OR" => BinaryOperator::Or,
        "AND" => BinaryOperator::And,
        "=" => BinaryOperator::Eq,
        "!=" | "<>" => BinaryOperator::NotEq,
        ">=" => BinaryOperator::GtEq,
        "<=" => BinaryOperator::LtEq,
        "+" => BinaryOperator::Plus,
        "-" => BinaryOperator::Minus,
        "*" => BinaryOperator::Multiply,
        "/" => BinaryOperator::Divide,
        "!" => {
            buf.pop()?;
            buf.expect("=", "Unknown operator: !")?;
            return Ok(Some(BinaryOperator::NotEq));
        }
        "<" => {
            buf.pop()?;
            let op = if buf.peek_is(">") {
                BinaryOperator::NotEq
            } else if buf.peek_is("=") {
                BinaryOperator::LtEq
            } else {
                return Ok(Some(BinaryOperator::Lt));
            };
            buf.pop()?;
            return Ok(Some(op));
        }
        ">" => {
            buf.pop()?;
            if buf.peek_is("=") {
                buf.pop()?;
                return Ok(Some(BinaryOperator::GtEq));
            }
            return Ok(Some(BinaryOperator::Gt));
        }
        _ => return Ok(None),
    };
    buf.pop()?;
    Ok(Some(op))
}

/// Fold `operands[0] ops[0] operands[1] ...` into a tree, splitting at the
/// first occurrence of the earliest operator in [`BinaryOperator::PRECEDENCE`].
pub(crate) fn hierarchize(mut operands: Vec<Expr>, ops: &[BinaryOperator]) -> Result<Expr> {
    if operands.len() != ops.len() + 1 {
        return Err(syntax("operands and operators do not alternate"));
    }
    let split = BinaryOperator::PRECEDENCE
        .iter()
        .find_map(|op| ops.iter().position(|o| o == op).map(|idx| (idx, *op)));
    match split {
        Some((idx, op)) => {
            let right = operands.split_off(idx + 1);
            let left = hierarchize(operands, &ops[..idx])?;
            let right = hierarchize(right, &ops[idx + 1..])?;
            Ok(Expr::binary(op, left, right))
        }
        None => operands.pop().ok_or_else(|| syntax("empty expression")),
    }
}
