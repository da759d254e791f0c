use crate::perspective::{ENTITY_TYPE_KEY, SearchContext};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// Value type of a filterable attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKeyType {
    #[default]
    String,
    Text,
    Id,
    Enum,
    Date,
    Integer,
    Float,
    Boolean,
    Vocabulary,
}

/// Description of one filterable attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDescriptor {
    pub filter_key: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, rename = "type")]
    pub key_type: FilterKeyType,
    /// Whether the attribute holds several values
    #[serde(default)]
    pub multiple: bool,
}

impl KeyDescriptor {
    pub fn new(filter_key: &str, label: &str, key_type: FilterKeyType, multiple: bool) -> Self {
        Self {
            filter_key: filter_key.to_string(),
            label: label.to_string(),
            key_type,
            multiple,
        }
    }
}

/// Keys declared by one entity type
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityTypeRules {
    /// Types whose keys this type also exposes
    pub inherits: Vec<String>,
    pub keys: Vec<KeyDescriptor>,
}

/// Filterable keys per entity type, with memoized lookups.
///
/// The catalog is immutable once built, so cached results never go stale.
#[derive(Debug, Default)]
pub struct FilterKeyCatalog {
    types: BTreeMap<String, EntityTypeRules>,
    cache: RefCell<HashMap<Vec<String>, Vec<String>>>,
}

impl FilterKeyCatalog {
    pub fn new(types: BTreeMap<String, EntityTypeRules>) -> Self {
        Self {
            types,
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn knows(&self, entity_type: &str) -> bool {
        self.types.contains_key(entity_type)
    }

    /// Union of the keys of every given type; unknown types contribute nothing
    pub fn keys_for<S: AsRef<str>>(&self, entity_types: &[S]) -> BTreeMap<String, KeyDescriptor> {
        let mut out = BTreeMap::new();
        let mut visited = HashSet::new();
        for entity_type in entity_types {
            self.collect(entity_type.as_ref(), &mut visited, &mut out);
        }
        out
    }

    /// Sorted key names for the given types, without the synthetic `entity_type`
    pub fn entity_filter_keys<S: AsRef<str>>(&self, entity_types: &[S]) -> Vec<String> {
        self.keys_for(entity_types).into_keys().collect()
    }

    /// Sorted, deduplicated keys for a search context, always including `entity_type`
    pub fn available_filter_keys(&self, context: &SearchContext) -> Vec<String> {
        let mut cache_key: Vec<String> = context.entity_types.clone();
        cache_key.sort();
        cache_key.dedup();

        if let Some(hit) = self.cache.borrow().get(&cache_key) {
            return hit.clone();
        }

        let mut keys = self.entity_filter_keys(&cache_key);
        if !keys.iter().any(|k| k == ENTITY_TYPE_KEY) {
            keys.push(ENTITY_TYPE_KEY.to_string());
            keys.sort();
        }
        debug!(entity_types = ?cache_key, keys = keys.len(), "resolved filter keys");
        self.cache.borrow_mut().insert(cache_key, keys.clone());
        keys
    }

    pub fn cached_lookups(&self) -> usize {
        self.cache.borrow().len()
    }

    fn collect(
        &self,
        entity_type: &str,
        visited: &mut HashSet<String>,
        out: &mut BTreeMap<String, KeyDescriptor>,
    ) {
        if !visited.insert(entity_type.to_string()) {
            return;
        }
        let Some(rules) = self.types.get(entity_type) else {
            debug!(entity_type, "entity type not in filter key catalog");
            return;
        };
        // Own keys first so they win over inherited descriptors.
        for key in &rules.keys {
            out.entry(key.filter_key.clone())
                .or_insert_with(|| key.clone());
        }
        for parent in &rules.inherits {
            self.collect(parent, visited, out);
        }
    }
}
