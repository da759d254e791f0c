use serde::{Deserialize, Serialize};
use std::fmt;

pub const STIX_CORE_OBJECT: &str = "Stix-Core-Object";
pub const STIX_DOMAIN_OBJECT: &str = "Stix-Domain-Object";
pub const STIX_CYBER_OBSERVABLE: &str = "Stix-Cyber-Observable";
pub const STIX_CORE_RELATIONSHIP: &str = "stix-core-relationship";
pub const HISTORY: &str = "History";
pub const ACTIVITY: &str = "Activity";

/// Synthetic key every non-bookmark widget can filter on
pub const ENTITY_TYPE_KEY: &str = "entity_type";

/// Data-shape mode of a dashboard widget
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Perspective {
    #[default]
    Entities,
    Relationships,
    Audits,
}

impl Perspective {
    pub const ALL: [Perspective; 3] = [
        Perspective::Entities,
        Perspective::Relationships,
        Perspective::Audits,
    ];

    /// Exact label match; anything else falls back to entities
    pub fn from_label(label: &str) -> Self {
        match label {
            "relationships" => Perspective::Relationships,
            "audits" => Perspective::Audits,
            _ => Perspective::Entities,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Perspective::Entities => "entities",
            Perspective::Relationships => "relationships",
            Perspective::Audits => "audits",
        }
    }

    /// Relationship widgets carry source/target pre-query filters
    pub fn has_dynamic_filters(&self) -> bool {
        matches!(self, Perspective::Relationships)
    }
}

impl fmt::Display for Perspective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visualization kind of the widget; only bookmarks change filtering
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WidgetType {
    Bookmark,
    Other(String),
}

impl WidgetType {
    pub fn is_bookmark(&self) -> bool {
        matches!(self, WidgetType::Bookmark)
    }

    pub fn as_str(&self) -> &str {
        match self {
            WidgetType::Bookmark => "bookmark",
            WidgetType::Other(name) => name,
        }
    }
}

impl Default for WidgetType {
    fn default() -> Self {
        WidgetType::Other("default".to_string())
    }
}

impl From<&str> for WidgetType {
    fn from(value: &str) -> Self {
        match value {
            "bookmark" => WidgetType::Bookmark,
            other => WidgetType::Other(other.to_string()),
        }
    }
}

/// Entity types against which available filter keys are resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchContext {
    pub entity_types: Vec<String>,
}

impl SearchContext {
    pub fn new<S: AsRef<str>>(entity_types: &[S]) -> Self {
        Self {
            entity_types: entity_types.iter().map(|t| t.as_ref().to_string()).collect(),
        }
    }
}

/// Entity types offered by a filter widget and the search context it resolves keys in
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterContext {
    pub available_entity_types: Vec<String>,
    pub search_context: SearchContext,
}

impl FilterContext {
    pub fn for_perspective(perspective: Perspective) -> Self {
        match perspective {
            Perspective::Entities => Self::build(
                &[STIX_DOMAIN_OBJECT, STIX_CYBER_OBSERVABLE],
                &[STIX_CORE_OBJECT],
            ),
            Perspective::Relationships => Self::build(
                &[STIX_DOMAIN_OBJECT, STIX_CYBER_OBSERVABLE],
                &[STIX_CORE_RELATIONSHIP],
            ),
            Perspective::Audits => Self::build(&[HISTORY, ACTIVITY], &[HISTORY]),
        }
    }

    /// Context of the source/target pre-query widgets
    pub fn dynamic() -> Self {
        Self::build(
            &[STIX_DOMAIN_OBJECT, STIX_CYBER_OBSERVABLE],
            &[STIX_CORE_OBJECT],
        )
    }

    fn build(available: &[&str], search: &[&str]) -> Self {
        Self {
            available_entity_types: available.iter().map(|t| t.to_string()).collect(),
            search_context: SearchContext::new(search),
        }
    }
}
