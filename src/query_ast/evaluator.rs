//! Row and group evaluation of expression trees.
//!
//! Column references resolve in three passes: exact name, then the part of each
//! column name after its first `.`, then the SELECT clause aliases (evaluating
//! the aliased expression against the same row). Aggregates need the rows of a
//! group; the aggregate context is threaded through operators and aliases.

use super::ast::{Aliased, BinaryOperator, Expr, Literal};
use super::errors::{Result, evaluation};
use crate::models::Value;
use crate::models::structs::Row;

/// Evaluate `expr` for one row of a table with the given column names.
pub fn evaluate(
    expr: &Expr,
    columns: &[String],
    row: &[Value],
    select_clause: &[Aliased<Expr>],
    group_rows: Option<&[Row]>,
) -> Result<Value> {
    Evaluator { columns, select_clause, group_rows }.eval(expr, row, 0)
}

struct Evaluator<'a> {
    columns: &'a [String],
    select_clause: &'a [Aliased<Expr>],
    group_rows: Option<&'a [Row]>,
}

impl Evaluator<'_> {
    fn eval(&self, expr: &Expr, row: &[Value], depth: usize) -> Result<Value> {
        match expr {
            Expr::Literal(Literal::Numeric(raw)) => raw
                .parse::<f64>()
                .map(Value::Real)
                .map_err(|_| evaluation(format!("Invalid numeric literal: {}", raw))),
            Expr::Literal(Literal::String(s)) => Ok(Value::Text(s.clone())),
            Expr::Column(name) => self.resolve(name, row, depth),
            Expr::Qualified { table, column } => self.resolve(&format!("{}.{}", table, column), row, depth),
            Expr::Aggregate { function, inner } => self.aggregate(function, inner, depth),
            Expr::BinaryOp { op, left, right } => {
                let left = self.eval(left, row, depth)?;
                let right = self.eval(right, row, depth)?;
                Ok(apply(*op, &left, &right))
            }
        }
    }

    fn resolve(&self, target: &str, row: &[Value], depth: usize) -> Result<Value> {
        let position = self
            .columns
            .iter()
            .position(|c| c == target)
            .or_else(|| {
                self.columns
                    .iter()
                    .position(|c| c.split_once('.').is_some_and(|(_, suffix)| suffix == target))
            });
        if let Some(idx) = position {
            return row
                .get(idx)
                .cloned()
                .ok_or_else(|| evaluation(format!("Row is missing column: {}", target)));
        }

        if let Some(clause) = self.select_clause.iter().find(|c| c.alias.as_deref() == Some(target)) {
            if depth >= self.select_clause.len() {
                return Err(evaluation(format!("Alias refers to itself: {}", target)));
            }
            return self.eval(&clause.item, row, depth + 1);
        }

        Err(evaluation(format!("Unable to evaluate column name: {}", target)))
    }

    fn aggregate(&self, function: &str, inner: &Expr, depth: usize) -> Result<Value> {
        let rows = self
            .group_rows
            .ok_or_else(|| evaluation("aggregates can't be used outside a grouped context"))?;
        let function = function.to_ascii_lowercase();

        if function == "count" && matches!(inner, Expr::Column(c) if c == "*") {
            return Ok(Value::Integer(rows.len() as i64));
        }

        let values = rows
            .iter()
            .map(|r| self.eval(inner, r, depth))
            .collect::<Result<Vec<_>>>()?;

        match function.as_str() {
            "count" => Ok(Value::Integer(values.len() as i64)),
            "sum" => Ok(values.iter().skip(1).fold(
                values.first().cloned().unwrap_or(Value::Null),
                |acc, v| acc.add(v),
            )),
            "max" => Ok(extreme(values, std::cmp::Ordering::Greater)),
            "min" => Ok(extreme(values, std::cmp::Ordering::Less)),
            other => Err(evaluation(format!("Unknown aggregate function: {}", other))),
        }
    }
}

/// Largest (or smallest) value, skipping values incomparable to the current best.
fn extreme(values: Vec<Value>, want: std::cmp::Ordering) -> Value {
    values.into_iter().fold(Value::Null, |best, v| {
        if best.is_null() || v.compare(&best) == Some(want) { v } else { best }
    })
}

pub(crate) fn apply(op: BinaryOperator, left: &Value, right: &Value) -> Value {
    use std::cmp::Ordering::*;
    let ord = || left.compare(right);
    match op {
        BinaryOperator::Or => Value::Boolean(left.is_truthy() || right.is_truthy()),
        BinaryOperator::And => Value::Boolean(left.is_truthy() && right.is_truthy()),
        BinaryOperator::NotEq => Value::Boolean(!left.loose_eq(right)),
        BinaryOperator::Eq => Value::Boolean(left.loose_eq(right)),
        BinaryOperator::Gt => Value::Boolean(ord() == Some(Greater)),
        BinaryOperator::GtEq => Value::Boolean(matches!(ord(), Some(Greater | Equal))),
        BinaryOperator::Lt => Value::Boolean(ord() == Some(Less)),
        BinaryOperator::LtEq => Value::Boolean(matches!(ord(), Some(Less | Equal))),
        BinaryOperator::Plus => left.add(right),
        BinaryOperator::Minus => left.sub(right),
        BinaryOperator::Multiply => left.mul(right),
        BinaryOperator::Divide => left.div(right),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_ast::errors::QueryAstError;
    use crate::query_ast::parse_expression;

    fn eval_const(sql: &str) -> Value {
        evaluate(&parse_expression(sql).unwrap(), &[], &[], &[], None).unwrap()
    }

    fn columns() -> Vec<String> {
        vec!["d.name".into(), "d.weight".into(), "p.name".into()]
    }

    fn row() -> Vec<Value> {
        vec![Value::from("rex"), Value::Integer(40), Value::from("ann")]
    }

    #[test]
    fn precedence_evaluates_to_seven() {
        assert_eq!(eval_const("1 + 2 * 3"), Value::Real(7.0));
    }

    #[test]
    fn same_operator_chain_evaluates_right_grouped() {
        assert_eq!(eval_const("10 - 3 - 2"), Value::Real(9.0));
    }

    #[test]
    fn comparisons_and_logic() {
        assert_eq!(eval_const("2 > 1 AND 1 >= 1"), Value::Boolean(true));
        assert_eq!(eval_const("'a' < 'b' OR 1 = 2"), Value::Boolean(true));
        assert_eq!(eval_const("1 != 1"), Value::Boolean(false));
        assert_eq!(eval_const("'1' = 1"), Value::Boolean(false));
    }

    #[test]
    fn exact_name_wins_over_suffix() {
        let e = parse_expression("p.name").unwrap();
        assert_eq!(evaluate(&e, &columns(), &row(), &[], None).unwrap(), Value::from("ann"));
        let e = parse_expression("name").unwrap();
        assert_eq!(evaluate(&e, &columns(), &row(), &[], None).unwrap(), Value::from("rex"));
    }

    #[test]
    fn select_alias_is_the_last_resort() {
        let select = vec![Aliased::named(parse_expression("weight * 2").unwrap(), "double")];
        let e = parse_expression("double > 50").unwrap();
        assert_eq!(evaluate(&e, &columns(), &row(), &select, None).unwrap(), Value::Boolean(true));
    }

    #[test]
    fn self_referential_alias_fails() {
        let select = vec![Aliased::named(parse_expression("loop + 1").unwrap(), "loop")];
        let e = parse_expression("loop").unwrap();
        assert!(matches!(evaluate(&e, &columns(), &row(), &select, None), Err(QueryAstError::Evaluation(_))));
    }

    #[test]
    fn unknown_column_fails() {
        let e = parse_expression("height").unwrap();
        assert_eq!(
            evaluate(&e, &columns(), &row(), &[], None),
            Err(QueryAstError::Evaluation("Unable to evaluate column name: height".into()))
        );
    }

    #[test]
    fn aggregates_need_a_group() {
        let e = parse_expression("max(weight)").unwrap();
        assert!(matches!(evaluate(&e, &columns(), &row(), &[], None), Err(QueryAstError::Evaluation(_))));
    }

    #[test]
    fn aggregates_reduce_the_group() {
        let rows = vec![
            vec![Value::from("rex"), Value::Integer(40), Value::from("ann")],
            vec![Value::from("fido"), Value::Integer(25), Value::from("bob")],
            vec![Value::from("max"), Value::Integer(70), Value::from("ann")],
        ];
        let check = |sql: &str, expected: Value| {
            let e = parse_expression(sql).unwrap();
            assert_eq!(evaluate(&e, &columns(), &rows[2], &[], Some(rows.as_slice())).unwrap(), expected, "{}", sql);
        };
        check("max(weight)", Value::Integer(70));
        check("MIN(d.weight)", Value::Integer(25));
        check("sum(weight)", Value::Integer(135));
        check("count(*)", Value::Integer(3));
        check("count(name)", Value::Integer(3));
        check("count(*) > 2 AND max(weight) = 70", Value::Boolean(true));
        check("min(name)", Value::from("fido"));
    }

    #[test]
    fn aggregate_through_alias() {
        let select = vec![Aliased::named(parse_expression("count(*)").unwrap(), "c")];
        let rows = vec![row(), row()];
        let e = parse_expression("c > 1").unwrap();
        assert_eq!(evaluate(&e, &columns(), &rows[1], &select, Some(rows.as_slice())).unwrap(), Value::Boolean(true));
    }

    #[test]
    fn empty_group_aggregates() {
        let rows: Vec<Row> = Vec::new();
        let e = parse_expression("sum(weight)").unwrap();
        assert_eq!(evaluate(&e, &columns(), &row(), &[], Some(rows.as_slice())).unwrap(), Value::Null);
        let e = parse_expression("count(weight)").unwrap();
        assert_eq!(evaluate(&e, &columns(), &row(), &[], Some(rows.as_slice())).unwrap(), Value::Integer(0));
    }

    #[test]
    fn unknown_aggregate_fails() {
        let rows = vec![row()];
        let e = parse_expression("median(weight)").unwrap();
        assert!(matches!(evaluate(&e, &columns(), &row(), &[], Some(rows.as_slice())), Err(QueryAstError::Evaluation(_))));
    }
}
