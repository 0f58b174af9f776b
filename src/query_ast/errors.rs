#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum QueryAstError {
    /// Malformed token stream: unterminated statement, unmatched parens or
    /// quotes, unknown operator, missing keyword.
    #[error("syntax error: {0}")] Syntax(String),
    /// Unresolved column, aggregate outside a group, unknown aggregate.
    #[error("evaluation error: {0}")] Evaluation(String),
    /// Cartesian product over the configured cap, or deadline exceeded.
    #[error("resource error: {0}")] Resource(String),
    /// Message raised by the relational store, passed through verbatim.
    #[error("{0}")] Store(String),
}

pub type Result<T> = std::result::Result<T, QueryAstError>;

pub(crate) fn syntax(msg: impl Into<String>) -> QueryAstError { QueryAstError::Syntax(msg.into()) }

pub(crate) fn evaluation(msg: impl Into<String>) -> QueryAstError { QueryAstError::Evaluation(msg.into()) }

impl From<sqlx::Error> for QueryAstError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Database(db) => QueryAstError::Store(db.message().to_string()),
            other => QueryAstError::Store(other.to_string()),
        }
    }
}
