use super::error::FilterParseError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// How sibling conditions (or the values of one condition) combine
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    #[default]
    And,
    Or,
}

impl FilterMode {
    pub fn toggled(self) -> Self {
        match self {
            FilterMode::And => FilterMode::Or,
            FilterMode::Or => FilterMode::And,
        }
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterMode::And => write!(f, "AND"),
            FilterMode::Or => write!(f, "OR"),
        }
    }
}

/// Comparison applied between an attribute and the condition values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    #[default]
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    Nil,
    NotNil,
    Contains,
    NotContains,
    StartsWith,
    NotStartsWith,
    EndsWith,
    NotEndsWith,
    Search,
}

impl FilterOperator {
    pub const ALL: [FilterOperator; 15] = [
        FilterOperator::Eq,
        FilterOperator::NotEq,
        FilterOperator::Lt,
        FilterOperator::Lte,
        FilterOperator::Gt,
        FilterOperator::Gte,
        FilterOperator::Nil,
        FilterOperator::NotNil,
        FilterOperator::Contains,
        FilterOperator::NotContains,
        FilterOperator::StartsWith,
        FilterOperator::NotStartsWith,
        FilterOperator::EndsWith,
        FilterOperator::NotEndsWith,
        FilterOperator::Search,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::NotEq => "not_eq",
            FilterOperator::Lt => "lt",
            FilterOperator::Lte => "lte",
            FilterOperator::Gt => "gt",
            FilterOperator::Gte => "gte",
            FilterOperator::Nil => "nil",
            FilterOperator::NotNil => "not_nil",
            FilterOperator::Contains => "contains",
            FilterOperator::NotContains => "not_contains",
            FilterOperator::StartsWith => "starts_with",
            FilterOperator::NotStartsWith => "not_starts_with",
            FilterOperator::EndsWith => "ends_with",
            FilterOperator::NotEndsWith => "not_ends_with",
            FilterOperator::Search => "search",
        }
    }

    /// Operators that test presence only and carry no values
    pub fn is_value_less(&self) -> bool {
        matches!(self, FilterOperator::Nil | FilterOperator::NotNil)
    }

    /// Short symbol used when rendering chips
    pub fn symbol(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "=",
            FilterOperator::NotEq => "!=",
            FilterOperator::Lt => "<",
            FilterOperator::Lte => "<=",
            FilterOperator::Gt => ">",
            FilterOperator::Gte => ">=",
            FilterOperator::Nil => "is empty",
            FilterOperator::NotNil => "is not empty",
            FilterOperator::Contains => "contains",
            FilterOperator::NotContains => "not contains",
            FilterOperator::StartsWith => "starts with",
            FilterOperator::NotStartsWith => "not starts with",
            FilterOperator::EndsWith => "ends with",
            FilterOperator::NotEndsWith => "not ends with",
            FilterOperator::Search => "search",
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterOperator {
    type Err = FilterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        FilterOperator::ALL
            .into_iter()
            .find(|op| op.as_str() == lower)
            .ok_or_else(|| FilterParseError::UnknownOperator(s.to_string()))
    }
}

/// A single condition: `key operator values`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub key: String,
    #[serde(default)]
    pub operator: FilterOperator,
    #[serde(default)]
    pub values: Vec<String>,
    /// How multiple values of this condition combine
    #[serde(default = "default_value_mode")]
    pub mode: FilterMode,
}

fn default_value_mode() -> FilterMode {
    FilterMode::Or
}

impl Filter {
    pub fn new(
        key: impl Into<String>,
        operator: FilterOperator,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            key: key.into(),
            operator,
            values: dedup_values(values.into_iter().map(Into::into)),
            mode: default_value_mode(),
        }
    }
}

/// A boolean tree of filters and nested groups
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterGroup {
    #[serde(default)]
    pub mode: FilterMode,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub filter_groups: Vec<FilterGroup>,
}

impl FilterGroup {
    pub fn new(mode: FilterMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// True when the group has no conditions, counting nested empty groups as nothing
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty() && self.filter_groups.iter().all(FilterGroup::is_empty)
    }

    pub fn is_not_empty(&self) -> bool {
        !self.is_empty()
    }

    /// Build a group from arbitrary JSON, falling back to an empty group on malformed input
    pub fn from_value(value: &Value) -> Self {
        if value.is_null() {
            return Self::default();
        }
        match serde_json::from_value::<FilterGroup>(value.clone()) {
            Ok(group) => group,
            Err(err) => {
                warn!(error = %err, "malformed filter group, treating as empty");
                Self::default()
            }
        }
    }

    /// Whether the key appears anywhere in the tree
    pub fn contains_key(&self, key: &str) -> bool {
        self.filters.iter().any(|f| f.key == key)
            || self.filter_groups.iter().any(|g| g.contains_key(key))
    }

    /// Remove every condition with this key at any depth; returns whether anything changed
    pub fn remove_key(&mut self, key: &str) -> bool {
        let before = self.filters.len();
        self.filters.retain(|f| f.key != key);
        let mut changed = self.filters.len() != before;
        for group in &mut self.filter_groups {
            changed |= group.remove_key(key);
        }
        changed
    }

    /// Number of conditions in the whole tree
    pub fn condition_count(&self) -> usize {
        self.filters.len()
            + self
                .filter_groups
                .iter()
                .map(FilterGroup::condition_count)
                .sum::<usize>()
    }
}

/// Serde helper: null, missing or malformed groups all become an empty group
pub fn deserialize_lenient<'de, D>(deserializer: D) -> Result<FilterGroup, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .map(|value| FilterGroup::from_value(&value))
        .unwrap_or_default())
}

pub(crate) fn dedup_values(values: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values {
        if !out.contains(&value) {
            out.push(value);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_empty_groups_are_empty() {
        let group = FilterGroup {
            mode: FilterMode::Or,
            filters: vec![],
            filter_groups: vec![FilterGroup {
                filter_groups: vec![FilterGroup::default()],
                ..FilterGroup::default()
            }],
        };
        assert!(group.is_empty());
    }

    #[test]
    fn test_nested_condition_counts_as_content() {
        let group = FilterGroup {
            filter_groups: vec![FilterGroup {
                filters: vec![Filter::new("x_opencti_score", FilterOperator::Gt, ["50"])],
                ..FilterGroup::default()
            }],
            ..FilterGroup::default()
        };
        assert!(group.is_not_empty());
        assert_eq!(group.condition_count(), 1);
    }

    #[test]
    fn test_deserialize_camel_case_wire_format() {
        let group: FilterGroup = serde_json::from_value(json!({
            "mode": "or",
            "filters": [{"key": "entity_type", "values": ["Malware"], "operator": "eq", "mode": "or"}],
            "filterGroups": []
        }))
        .unwrap();
        assert_eq!(group.mode, FilterMode::Or);
        assert_eq!(group.filters[0].key, "entity_type");
        assert_eq!(group.filters[0].values, vec!["Malware"]);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let group: FilterGroup = serde_json::from_value(json!({
            "filters": [{"key": "creator_id"}]
        }))
        .unwrap();
        assert_eq!(group.mode, FilterMode::And);
        assert_eq!(group.filters[0].operator, FilterOperator::Eq);
        assert_eq!(group.filters[0].mode, FilterMode::Or);
        assert!(group.filter_groups.is_empty());
    }

    #[test]
    fn test_malformed_value_becomes_empty_group() {
        assert_eq!(FilterGroup::from_value(&json!(42)), FilterGroup::default());
        assert_eq!(
            FilterGroup::from_value(&json!({"filters": "nope"})),
            FilterGroup::default()
        );
        assert_eq!(FilterGroup::from_value(&Value::Null), FilterGroup::default());
    }

    #[test]
    fn test_remove_key_reaches_nested_groups() {
        let mut group = FilterGroup {
            filters: vec![
                Filter::new("entity_type", FilterOperator::Eq, ["Report"]),
                Filter::new("objectLabel", FilterOperator::Eq, ["apt"]),
            ],
            filter_groups: vec![FilterGroup {
                filters: vec![Filter::new("entity_type", FilterOperator::NotEq, ["Note"])],
                ..FilterGroup::default()
            }],
            ..FilterGroup::default()
        };
        assert!(group.remove_key("entity_type"));
        assert!(!group.contains_key("entity_type"));
        assert_eq!(group.filters.len(), 1);
        assert_eq!(group.filters[0].key, "objectLabel");
        assert!(!group.remove_key("entity_type"));
    }

    #[test]
    fn test_operator_parsing() {
        assert_eq!("not_eq".parse::<FilterOperator>(), Ok(FilterOperator::NotEq));
        assert_eq!("GTE".parse::<FilterOperator>(), Ok(FilterOperator::Gte));
        assert!("between".parse::<FilterOperator>().is_err());
        assert!(FilterOperator::Nil.is_value_less());
        assert!(!FilterOperator::Search.is_value_less());
    }

    #[test]
    fn test_filter_new_dedups_values() {
        let filter = Filter::new("objectLabel", FilterOperator::Eq, ["a", "b", "a"]);
        assert_eq!(filter.values, vec!["a", "b"]);
    }
}
