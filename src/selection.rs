use crate::filter::{FilterGroup, deserialize_lenient};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Data selection of a dashboard widget.
///
/// Only the three filter groups are managed here; every other field is passed
/// through untouched, including fields this type does not know about.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataSelection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_attribute: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perspective: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient")]
    pub filters: FilterGroup,
    #[serde(
        default,
        rename = "dynamicFrom",
        deserialize_with = "deserialize_lenient"
    )]
    pub dynamic_from: FilterGroup,
    #[serde(default, rename = "dynamicTo", deserialize_with = "deserialize_lenient")]
    pub dynamic_to: FilterGroup,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DataSelection {
    /// Parse a selection from JSON5 (plain JSON is valid JSON5)
    pub fn from_json5(text: &str) -> Result<Self, json5::Error> {
        json5::from_str(text)
    }

    /// Copy of this selection carrying the given filter groups
    pub fn with_groups(
        &self,
        filters: FilterGroup,
        dynamic_from: FilterGroup,
        dynamic_to: FilterGroup,
    ) -> Self {
        Self {
            filters,
            dynamic_from,
            dynamic_to,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterMode;
    use serde_json::json;

    #[test]
    fn test_pass_through_fields_survive_round_trip() {
        let raw = json!({
            "label": "Top malware",
            "attribute": "entity_type",
            "date_attribute": "created_at",
            "perspective": "entities",
            "number": 10,
            "filters": {"mode": "or", "filters": [], "filterGroups": []}
        });
        let selection: DataSelection = serde_json::from_value(raw).unwrap();
        assert_eq!(selection.label.as_deref(), Some("Top malware"));
        assert_eq!(selection.filters.mode, FilterMode::Or);
        assert_eq!(selection.extra.get("number"), Some(&json!(10)));

        let back = serde_json::to_value(&selection).unwrap();
        assert_eq!(back["number"], json!(10));
        assert_eq!(back["date_attribute"], json!("created_at"));
        assert!(back.get("dynamicFrom").is_some());
    }

    #[test]
    fn test_null_and_malformed_groups_become_empty() {
        let selection: DataSelection = serde_json::from_value(json!({
            "filters": null,
            "dynamicFrom": {"filters": 3},
        }))
        .unwrap();
        assert!(selection.filters.is_empty());
        assert!(selection.dynamic_from.is_empty());
        assert!(selection.dynamic_to.is_empty());
        assert!(selection.extra.is_empty());
    }

    #[test]
    fn test_json5_input() {
        let selection = DataSelection::from_json5(
            "{ perspective: 'relationships', dynamicTo: { mode: 'and', filters: [{ key: 'entity_type', values: ['Report'] }] }, }",
        )
        .unwrap();
        assert_eq!(selection.perspective.as_deref(), Some("relationships"));
        assert_eq!(selection.dynamic_to.filters.len(), 1);
    }
}
