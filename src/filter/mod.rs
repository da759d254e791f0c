//! Filter groups and their state container
//!
//! A [`FilterGroup`] is a boolean tree: top-level conditions and nested groups
//! combined with the group's mode. A [`FilterGroupStore`] owns one group,
//! exposes the edit operations used by filter widgets and chips, and notifies
//! subscribers synchronously after every effective change.
//!
//! # Edit term syntax
//!
//! ```text
//! key=v1,v2                 Add (or merge into) an `eq` condition
//! key:operator=v1,v2        Add a condition with an explicit operator
//! key:nil                   Add a value-less condition
//! !key                      Remove every condition on key
//! ```
//!
//! # Examples
//!
//! ```text
//! entity_type=Malware,Report
//! confidence:gte=75
//! name:contains="APT, group"
//! !objectLabel
//! ```

pub mod error;
pub mod group;
pub mod parser;
pub mod store;

pub use error::FilterParseError;
pub use group::{Filter, FilterGroup, FilterMode, FilterOperator, deserialize_lenient};
pub use parser::{FilterEdit, parse_edits};
pub use store::{FilterGroupStore, SubscriptionId};
