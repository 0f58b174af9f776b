//! SQL subset front end and relational step simulator
//!
//! text -> tokens -> statement AST -> table snapshots from a store -> steps.
//! The simulator is illustrative only; the store's own execution of the raw
//! statement is the authoritative result.

pub mod ast;
pub mod errors;
pub mod evaluator;
pub mod executor;
pub mod executors;
pub mod expression;
pub mod parser;
pub mod simulator;
pub mod tokenizer;

pub use ast::{Aliased, BinaryOperator, Expr, Literal, SelectStatement, Statement};
pub use errors::*;
pub use evaluator::evaluate;
pub use executor::{RelationalStore, split_statements};
pub use executors::SqliteStore;
pub use parser::parse;
pub use simulator::{Simulator, simulate};
pub use tokenizer::tokenize;

/// Parse a standalone expression. Trailing tokens are an error.
pub fn parse_expression(text: &str) -> Result<Expr> {
    let mut buf = parser::TokenBuffer::new(tokenize(text));
    let expr = expression::parse_expr(&mut buf)?;
    match buf.peek() {
        None => Ok(expr),
        Some(token) => Err(errors::syntax(format!("Unexpected token after expression: {}", token))),
    }
}
