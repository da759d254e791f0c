//! Composition of the three filter stores of a widget configuration screen
//!
//! [`WidgetFilters`] owns the main, source pre-query and target pre-query
//! stores. One sync observer is attached to each store at construction; after
//! any effective change it rebuilds the [`DataSelection`] from the latest
//! snapshots of all three stores and hands it to the caller.

use crate::catalog::FilterKeyCatalog;
use crate::config::NoticeRules;
use crate::filter::{Filter, FilterGroup, FilterGroupStore, FilterMode, FilterOperator};
use crate::perspective::{ENTITY_TYPE_KEY, FilterContext, Perspective, SearchContext, WidgetType};
use crate::selection::DataSelection;
use serde::Serialize;
use std::rc::{Rc, Weak};
use tracing::{debug, trace};

/// Which of the three stores a panel or summary belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelRole {
    Main,
    DynamicFrom,
    DynamicTo,
}

impl PanelRole {
    pub const ALL: [PanelRole; 3] = [PanelRole::Main, PanelRole::DynamicFrom, PanelRole::DynamicTo];

    pub fn as_str(&self) -> &'static str {
        match self {
            PanelRole::Main => "main",
            PanelRole::DynamicFrom => "from",
            PanelRole::DynamicTo => "to",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChipColor {
    Default,
    Warning,
    Success,
}

/// Inputs of one filter selection widget
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterPanel {
    pub role: PanelRole,
    pub available_filter_keys: Vec<String>,
    pub available_entity_types: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_context: Option<SearchContext>,
}

/// One top-level condition as shown in a summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterChip {
    pub key: String,
    pub operator: FilterOperator,
    pub values: Vec<String>,
    pub mode: FilterMode,
}

impl From<&Filter> for FilterChip {
    fn from(filter: &Filter) -> Self {
        Self {
            key: filter.key.clone(),
            operator: filter.operator,
            values: filter.values.clone(),
            mode: filter.mode,
        }
    }
}

/// A non-empty nested group, shown as one chip
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupChip {
    pub mode: FilterMode,
    pub chips: Vec<FilterChip>,
    pub groups: Vec<GroupChip>,
}

impl GroupChip {
    fn nested(group: &FilterGroup) -> Vec<Self> {
        group
            .filter_groups
            .iter()
            .filter(|g| g.is_not_empty())
            .map(|g| GroupChip {
                mode: g.mode,
                chips: g.filters.iter().map(FilterChip::from).collect(),
                groups: GroupChip::nested(g),
            })
            .collect()
    }
}

/// Read-only summary of a non-empty filter group
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSummary {
    pub role: PanelRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
    pub chip_color: ChipColor,
    pub entity_types: Vec<String>,
    pub mode: FilterMode,
    pub chips: Vec<FilterChip>,
    pub groups: Vec<GroupChip>,
}

impl FilterSummary {
    fn from_group(
        role: PanelRole,
        group: &FilterGroup,
        notice: Option<String>,
        chip_color: ChipColor,
        entity_types: Vec<String>,
    ) -> Self {
        Self {
            role,
            notice,
            chip_color,
            entity_types,
            mode: group.mode,
            chips: group.filters.iter().map(FilterChip::from).collect(),
            groups: GroupChip::nested(group),
        }
    }
}

pub struct WidgetFilters {
    perspective: Perspective,
    widget_type: WidgetType,
    catalog: Rc<FilterKeyCatalog>,
    notices: NoticeRules,
    base: Rc<DataSelection>,
    main: Rc<FilterGroupStore>,
    dynamic_from: Rc<FilterGroupStore>,
    dynamic_to: Rc<FilterGroupStore>,
}

impl WidgetFilters {
    pub fn new(
        perspective: Perspective,
        widget_type: WidgetType,
        selection: DataSelection,
        catalog: Rc<FilterKeyCatalog>,
        on_change: impl Fn(&DataSelection) + 'static,
    ) -> Self {
        let main = Rc::new(FilterGroupStore::new(
            PanelRole::Main.as_str(),
            selection.filters.clone(),
        ));
        let dynamic_from = Rc::new(FilterGroupStore::new(
            PanelRole::DynamicFrom.as_str(),
            selection.dynamic_from.clone(),
        ));
        let dynamic_to = Rc::new(FilterGroupStore::new(
            PanelRole::DynamicTo.as_str(),
            selection.dynamic_to.clone(),
        ));
        let base = Rc::new(selection);

        let on_change: Rc<dyn Fn(&DataSelection)> = Rc::new(on_change);
        // Weak handles keep the observers from owning the stores they watch.
        let stores: [Weak<FilterGroupStore>; 3] = [
            Rc::downgrade(&main),
            Rc::downgrade(&dynamic_from),
            Rc::downgrade(&dynamic_to),
        ];
        for store in [&main, &dynamic_from, &dynamic_to] {
            let stores = stores.clone();
            let base = Rc::clone(&base);
            let on_change = Rc::clone(&on_change);
            let origin = store.name().to_string();
            store.subscribe(move |_| {
                let [main, from, to] = &stores;
                let (Some(main), Some(from), Some(to)) =
                    (main.upgrade(), from.upgrade(), to.upgrade())
                else {
                    return;
                };
                let selection = base.with_groups(main.snapshot(), from.snapshot(), to.snapshot());
                trace!(store = %origin, "syncing data selection");
                on_change(&selection);
            });
        }

        debug!(
            perspective = %perspective,
            widget_type = widget_type.as_str(),
            "widget filters initialised"
        );

        Self {
            perspective,
            widget_type,
            catalog,
            notices: NoticeRules::default(),
            base,
            main,
            dynamic_from,
            dynamic_to,
        }
    }

    pub fn with_notices(mut self, notices: NoticeRules) -> Self {
        self.notices = notices;
        self
    }

    pub fn perspective(&self) -> Perspective {
        self.perspective
    }

    pub fn store(&self, role: PanelRole) -> &FilterGroupStore {
        match role {
            PanelRole::Main => &self.main,
            PanelRole::DynamicFrom => &self.dynamic_from,
            PanelRole::DynamicTo => &self.dynamic_to,
        }
    }

    /// Whether the store of this role is shown at all
    pub fn is_active(&self, role: PanelRole) -> bool {
        role == PanelRole::Main || self.perspective.has_dynamic_filters()
    }

    /// Filter widgets to render, main first
    pub fn panels(&self) -> Vec<FilterPanel> {
        let context = FilterContext::for_perspective(self.perspective);
        let main = if self.widget_type.is_bookmark() {
            FilterPanel {
                role: PanelRole::Main,
                available_filter_keys: vec![ENTITY_TYPE_KEY.to_string()],
                available_entity_types: context.available_entity_types,
                search_context: None,
            }
        } else {
            FilterPanel {
                role: PanelRole::Main,
                available_filter_keys: self
                    .catalog
                    .available_filter_keys(&context.search_context),
                available_entity_types: context.available_entity_types,
                search_context: Some(context.search_context),
            }
        };

        let mut panels = vec![main];
        if self.perspective.has_dynamic_filters() {
            let dynamic = FilterContext::dynamic();
            let keys = self
                .catalog
                .entity_filter_keys(&dynamic.search_context.entity_types);
            for role in [PanelRole::DynamicFrom, PanelRole::DynamicTo] {
                panels.push(FilterPanel {
                    role,
                    available_filter_keys: keys.clone(),
                    available_entity_types: dynamic.available_entity_types.clone(),
                    search_context: Some(dynamic.search_context.clone()),
                });
            }
        }
        panels
    }

    /// Summaries of the non-empty active groups in render order: from, to, main
    pub fn summaries(&self) -> Vec<FilterSummary> {
        let mut summaries = Vec::new();

        if self.perspective.has_dynamic_filters() {
            let dynamic_types = FilterContext::dynamic().search_context.entity_types;
            let from = self.dynamic_from.snapshot();
            if from.is_not_empty() {
                summaries.push(FilterSummary::from_group(
                    PanelRole::DynamicFrom,
                    &from,
                    Some(self.notices.dynamic_from_text()),
                    ChipColor::Warning,
                    dynamic_types.clone(),
                ));
            }
            let to = self.dynamic_to.snapshot();
            if to.is_not_empty() {
                summaries.push(FilterSummary::from_group(
                    PanelRole::DynamicTo,
                    &to,
                    Some(self.notices.dynamic_to_text()),
                    ChipColor::Success,
                    dynamic_types,
                ));
            }
        }

        let main = self.main.snapshot();
        if main.is_not_empty() {
            let notice = self
                .perspective
                .has_dynamic_filters()
                .then(|| self.notices.relationships_result.clone());
            summaries.push(FilterSummary::from_group(
                PanelRole::Main,
                &main,
                notice,
                ChipColor::Default,
                FilterContext::for_perspective(self.perspective)
                    .search_context
                    .entity_types,
            ));
        }

        summaries
    }

    /// Chip delete action of a summary
    pub fn remove_chip(&self, role: PanelRole, key: &str) -> bool {
        self.store(role).remove_filter(key)
    }

    pub fn remove_chip_value(&self, role: PanelRole, key: &str, value: &str) -> bool {
        self.store(role).remove_filter_value(key, value)
    }

    /// Selection rebuilt from the current state of all three stores
    pub fn data_selection(&self) -> DataSelection {
        self.base.with_groups(
            self.main.snapshot(),
            self.dynamic_from.snapshot(),
            self.dynamic_to.snapshot(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;
    use std::cell::RefCell;

    fn widget(perspective: Perspective) -> (WidgetFilters, Rc<RefCell<Vec<DataSelection>>>) {
        let synced = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&synced);
        let widget = WidgetFilters::new(
            perspective,
            WidgetType::default(),
            DataSelection::default(),
            Rc::new(default_config().build_catalog()),
            move |selection| sink.borrow_mut().push(selection.clone()),
        );
        (widget, synced)
    }

    #[test]
    fn test_stores_are_not_owned_by_their_observers() {
        let (widget, _) = widget(Perspective::Entities);
        let weak = Rc::downgrade(&widget.main);
        drop(widget);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_chip_removal_syncs_once() {
        let (widget, synced) = widget(Perspective::Relationships);
        widget
            .store(PanelRole::DynamicTo)
            .add_filter("entity_type", FilterOperator::Eq, ["Report"]);
        assert!(widget.remove_chip(PanelRole::DynamicTo, "entity_type"));
        assert!(!widget.remove_chip(PanelRole::DynamicTo, "entity_type"));
        assert_eq!(synced.borrow().len(), 2);
        assert!(synced.borrow()[1].dynamic_to.is_empty());
    }

    #[test]
    fn test_nested_groups_become_grouped_chips() {
        let (widget, _) = widget(Perspective::Entities);
        widget.store(PanelRole::Main).replace(FilterGroup {
            filter_groups: vec![
                FilterGroup::default(),
                FilterGroup {
                    filters: vec![crate::filter::Filter::new(
                        "confidence",
                        FilterOperator::Gt,
                        ["50"],
                    )],
                    ..FilterGroup::default()
                },
            ],
            ..FilterGroup::default()
        });
        let summaries = widget.summaries();
        assert_eq!(summaries.len(), 1);
        assert!(summaries[0].chips.is_empty());
        assert_eq!(summaries[0].groups.len(), 1);
        let grouped = &summaries[0].groups[0];
        assert_eq!(grouped.chips.len(), 1);
        assert_eq!(grouped.chips[0].key, "confidence");
        assert_eq!(grouped.chips[0].values, vec!["50"]);
    }
}
