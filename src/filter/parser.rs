use super::error::FilterParseError;
use super::group::FilterOperator;
use super::store::FilterGroupStore;
use regex::Regex;
use std::sync::LazyLock;

static KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\-]*$").expect("valid filter key regex"));

/// One edit applied to a filter group store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterEdit {
    /// `key=v1,v2`, `key:operator=v1,v2` or `key:nil`
    Add {
        key: String,
        operator: FilterOperator,
        values: Vec<String>,
    },
    /// `!key`
    Remove { key: String },
}

impl FilterEdit {
    /// Parse a single edit term
    pub fn parse(s: &str) -> Result<Self, FilterParseError> {
        let term = s.trim();
        if term.is_empty() {
            return Err(FilterParseError::InvalidExpression(
                "empty filter term".to_string(),
            ));
        }

        if let Some(key) = term.strip_prefix('!') {
            let key = validate_key(key.trim())?;
            return Ok(FilterEdit::Remove { key });
        }

        let (head, raw_values) = match term.split_once('=') {
            Some((head, rest)) => (head.trim(), Some(rest)),
            None => (term, None),
        };

        let (key, operator) = match head.split_once(':') {
            Some((key, op)) => (validate_key(key.trim())?, op.trim().parse()?),
            None => (validate_key(head)?, FilterOperator::Eq),
        };

        let values = match raw_values {
            Some(raw) if operator.is_value_less() => {
                if split_values(raw).is_empty() {
                    Vec::new()
                } else {
                    return Err(FilterParseError::UnexpectedValues(
                        operator.as_str().to_string(),
                    ));
                }
            }
            Some(raw) => split_values(raw),
            None if operator.is_value_less() => Vec::new(),
            None => {
                return Err(FilterParseError::InvalidExpression(format!(
                    "Expected 'key=value' or 'key:operator=value' format, got: {}",
                    s
                )));
            }
        };

        if values.is_empty() && !operator.is_value_less() {
            return Err(FilterParseError::EmptyValue(key));
        }

        Ok(FilterEdit::Add {
            key,
            operator,
            values,
        })
    }

    /// Apply this edit to a store; returns whether the store changed
    pub fn apply(&self, store: &FilterGroupStore) -> bool {
        match self {
            FilterEdit::Add {
                key,
                operator,
                values,
            } => store.add_filter(key.as_str(), *operator, values.iter().map(String::as_str)),
            FilterEdit::Remove { key } => store.remove_filter(key),
        }
    }
}

/// Parse every term, failing on the first invalid one
pub fn parse_edits<S: AsRef<str>>(terms: &[S]) -> Result<Vec<FilterEdit>, FilterParseError> {
    terms.iter().map(|t| FilterEdit::parse(t.as_ref())).collect()
}

fn validate_key(key: &str) -> Result<String, FilterParseError> {
    if KEY_RE.is_match(key) {
        Ok(key.to_string())
    } else {
        Err(FilterParseError::InvalidKey(key.to_string()))
    }
}

/// Split a comma separated value list while preserving quoted segments
fn split_values(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut current = String::new();

    for c in s.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                push_value(&mut parts, &current);
                current.clear();
            }
            _ => current.push(c),
        }
    }
    push_value(&mut parts, &current);

    parts
}

fn push_value(parts: &mut Vec<String>, raw: &str) {
    let value = raw.trim();
    if !value.is_empty() {
        parts.push(value.to_string());
    }
}
