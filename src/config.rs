use crate::catalog::{EntityTypeRules, FilterKeyCatalog, FilterKeyType, KeyDescriptor};
use crate::perspective::{
    ACTIVITY, HISTORY, STIX_CORE_OBJECT, STIX_CORE_RELATIONSHIP, STIX_CYBER_OBSERVABLE,
    STIX_DOMAIN_OBJECT,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FiltersConfig {
    /// Free-form label for the loaded profile.
    pub profile_name: String,
    /// When false, built-in entity types missing from `catalog` are kept.
    pub replace_builtin_catalog: bool,
    pub catalog: BTreeMap<String, EntityTypeRules>,
    pub notices: NoticeRules,
}

impl Default for FiltersConfig {
    fn default() -> Self {
        Self {
            profile_name: "base".to_string(),
            replace_builtin_catalog: false,
            catalog: builtin_catalog(),
            notices: NoticeRules::default(),
        }
    }
}

impl FiltersConfig {
    pub fn build_catalog(&self) -> FilterKeyCatalog {
        FilterKeyCatalog::new(self.catalog.clone())
    }
}

/// Explanatory texts shown above the filter summaries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoticeRules {
    pub dynamic_from: String,
    pub dynamic_to: String,
    pub relationships_result: String,
    /// Substituted for `{limit}` in the pre-query notices
    pub pre_query_limit: usize,
}

impl Default for NoticeRules {
    fn default() -> Self {
        Self {
            dynamic_from: "Pre-query to get data to be used as source entity of the relationship (limited to {limit})".to_string(),
            dynamic_to: "Pre-query to get data to be used as target entity of the relationship (limited to {limit})".to_string(),
            relationships_result: "Result: the relationships with source respecting the source pre-query, target respecting the target pre-query, and matching:".to_string(),
            pre_query_limit: 5000,
        }
    }
}

impl NoticeRules {
    pub fn dynamic_from_text(&self) -> String {
        self.with_limit(&self.dynamic_from)
    }

    pub fn dynamic_to_text(&self) -> String {
        self.with_limit(&self.dynamic_to)
    }

    fn with_limit(&self, template: &str) -> String {
        template.replace("{limit}", &self.pre_query_limit.to_string())
    }
}

pub fn load_config(path: Option<&Path>) -> Result<FiltersConfig, ConfigError> {
    if let Some(path) = path {
        load_config_from_path(path)
    } else {
        Ok(default_config().clone())
    }
}

pub fn load_config_from_path(path: &Path) -> Result<FiltersConfig, ConfigError> {
    let path_display = path.display().to_string();
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path_display.clone(),
        source,
    })?;

    let config = parse_config(&raw).map_err(|source| ConfigError::Parse {
        path: path_display,
        source,
    })?;
    debug!(
        profile = %config.profile_name,
        entity_types = config.catalog.len(),
        "loaded filters config"
    );
    Ok(config)
}

/// Parse TOML config text, layering the catalog over the built-in one unless replaced
pub fn parse_config(raw: &str) -> Result<FiltersConfig, toml::de::Error> {
    let mut config = toml::from_str::<FiltersConfig>(raw)?;
    if !config.replace_builtin_catalog {
        for (entity_type, rules) in builtin_catalog() {
            config.catalog.entry(entity_type).or_insert(rules);
        }
    }
    Ok(config)
}

pub fn default_config() -> &'static FiltersConfig {
    static DEFAULT_CONFIG: LazyLock<FiltersConfig> = LazyLock::new(FiltersConfig::default);
    &DEFAULT_CONFIG
}

fn key(filter_key: &str, label: &str, key_type: FilterKeyType, multiple: bool) -> KeyDescriptor {
    KeyDescriptor::new(filter_key, label, key_type, multiple)
}

fn entity(inherits: &[&str], keys: Vec<KeyDescriptor>) -> EntityTypeRules {
    EntityTypeRules {
        inherits: inherits.iter().map(|s| s.to_string()).collect(),
        keys,
    }
}

/// Filter keys of the platform's core entity types
pub fn builtin_catalog() -> BTreeMap<String, EntityTypeRules> {
    use FilterKeyType::{Boolean, Date, Enum, Id, Integer, String as Str, Text, Vocabulary};

    let mut catalog = BTreeMap::new();
    catalog.insert(
        STIX_CORE_OBJECT.to_string(),
        entity(
            &[],
            vec![
                key("entity_type", "Entity type", Str, false),
                key("created_at", "Platform creation date", Date, false),
                key("updated_at", "Modification date", Date, false),
                key("creator_id", "Creator", Id, true),
                key("createdBy", "Author", Id, false),
                key("objectLabel", "Label", Id, true),
                key("objectMarking", "Marking", Id, true),
                key("objectAssignee", "Assignee", Id, true),
                key("objectParticipant", "Participant", Id, true),
                key("confidence", "Confidence level", Integer, false),
                key("x_opencti_workflow_id", "Status", Id, false),
                key("regardingOf", "In regards of", Id, true),
            ],
        ),
    );
    catalog.insert(
        STIX_DOMAIN_OBJECT.to_string(),
        entity(
            &[STIX_CORE_OBJECT],
            vec![
                key("name", "Name", Text, false),
                key("description", "Description", Text, false),
                key("revoked", "Revoked", Boolean, false),
                key("killChainPhases", "Kill chain phase", Id, true),
                key("x_opencti_reliability", "Reliability", Vocabulary, false),
            ],
        ),
    );
    catalog.insert(
        STIX_CYBER_OBSERVABLE.to_string(),
        entity(
            &[STIX_CORE_OBJECT],
            vec![
                key("x_opencti_score", "Score", Integer, false),
                key("x_opencti_description", "Description", Text, false),
                key("observable_value", "Value", Text, false),
            ],
        ),
    );
    catalog.insert(
        STIX_CORE_RELATIONSHIP.to_string(),
        entity(
            &[],
            vec![
                key("entity_type", "Entity type", Str, false),
                key("relationship_type", "Relationship type", Str, true),
                key("fromId", "Source entity", Id, true),
                key("toId", "Target entity", Id, true),
                key("fromTypes", "Source type", Str, true),
                key("toTypes", "Target type", Str, true),
                key("start_time", "Start time", Date, false),
                key("stop_time", "Stop time", Date, false),
                key("created_at", "Platform creation date", Date, false),
                key("creator_id", "Creator", Id, true),
                key("createdBy", "Author", Id, false),
                key("objectLabel", "Label", Id, true),
                key("objectMarking", "Marking", Id, true),
                key("confidence", "Confidence level", Integer, false),
            ],
        ),
    );
    catalog.insert(
        HISTORY.to_string(),
        entity(
            &[],
            vec![
                key("entity_type", "Entity type", Str, false),
                key("event_type", "Event type", Enum, true),
                key("event_scope", "Event scope", Enum, true),
                key("timestamp", "Date", Date, false),
                key("user_id", "User", Id, true),
                key("group_ids", "Group", Id, true),
                key("organization_ids", "Organization", Id, true),
                key("context_data.id", "Related entity", Id, true),
                key("context_data.entity_type", "Related entity type", Str, true),
            ],
        ),
    );
    catalog.insert(
        ACTIVITY.to_string(),
        entity(
            &[HISTORY],
            vec![key("members_user", "Members", Id, true)],
        ),
    );
    catalog
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_notices_carry_limit() {
        let notices = NoticeRules::default();
        assert!(notices.dynamic_from_text().ends_with("(limited to 5000)"));
        assert!(notices.dynamic_to_text().contains("target entity"));
    }

    #[test]
    fn test_builtin_catalog_inheritance() {
        let catalog = default_config().build_catalog();
        let keys = catalog.entity_filter_keys(&[STIX_DOMAIN_OBJECT]);
        assert!(keys.contains(&"name".to_string()));
        assert!(keys.contains(&"objectLabel".to_string()));
        assert!(!keys.contains(&"x_opencti_score".to_string()));
    }
}
