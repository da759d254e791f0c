use thiserror::Error;

/// Errors that can occur when parsing filter edit terms
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterParseError {
    #[error(
        "Unknown filter operator: '{0}'. Valid operators are: eq, not_eq, lt, lte, gt, gte, nil, not_nil, contains, not_contains, starts_with, not_starts_with, ends_with, not_ends_with, search"
    )]
    UnknownOperator(String),

    #[error("Operator '{0}' takes no values")]
    UnexpectedValues(String),

    #[error("Invalid filter key: '{0}'")]
    InvalidKey(String),

    #[error("Empty filter value for key '{0}'")]
    EmptyValue(String),

    #[error("Invalid filter term: {0}")]
    InvalidExpression(String),
}
