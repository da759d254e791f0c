use crate::catalog::KeyDescriptor;
use crate::filter::FilterMode;
use crate::perspective::{FilterContext, Perspective};
use crate::selection::DataSelection;
use crate::widget::{ChipColor, FilterChip, FilterPanel, FilterSummary, GroupChip, PanelRole};
use colored::Colorize;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt::Write;

/// Plain text of a chip, e.g. `entity_type = Malware OR Report`
pub fn format_chip(chip: &FilterChip) -> String {
    if chip.operator.is_value_less() || chip.values.is_empty() {
        return format!("{} {}", chip.key, chip.operator.symbol());
    }
    let joiner = match chip.mode {
        FilterMode::And => " AND ",
        FilterMode::Or => " OR ",
    };
    format!(
        "{} {} {}",
        chip.key,
        chip.operator.symbol(),
        chip.values.join(joiner)
    )
}

/// Plain text of a nested group, e.g. `(confidence > 50 OR objectLabel = apt)`
pub fn format_group_chip(group: &GroupChip) -> String {
    let parts: Vec<String> = group
        .chips
        .iter()
        .map(format_chip)
        .chain(group.groups.iter().map(format_group_chip))
        .collect();
    format!("({})", parts.join(format!(" {} ", group.mode).as_str()))
}

fn paint_chip(chip: &FilterChip, color: ChipColor) -> String {
    paint(format!("[{}]", format_chip(chip)), color)
}

fn paint(text: String, color: ChipColor) -> String {
    match color {
        ChipColor::Default => text.cyan().to_string(),
        ChipColor::Warning => text.yellow().to_string(),
        ChipColor::Success => text.green().to_string(),
    }
}

fn role_title(role: PanelRole) -> &'static str {
    match role {
        PanelRole::Main => "Filters",
        PanelRole::DynamicFrom => "Source pre-query",
        PanelRole::DynamicTo => "Target pre-query",
    }
}

pub fn format_panels_text(panels: &[FilterPanel]) -> String {
    let mut out = String::new();
    for panel in panels {
        let _ = writeln!(out, "{} ({})", role_title(panel.role).bold(), panel.role.as_str());
        let _ = writeln!(
            out,
            "  entity types: {}",
            panel.available_entity_types.join(", ")
        );
        match &panel.search_context {
            Some(context) => {
                let _ = writeln!(
                    out,
                    "  search context: {}",
                    context.entity_types.join(", ")
                );
            }
            None => {
                let _ = writeln!(out, "  search context: none");
            }
        }
        if panel.available_filter_keys.is_empty() {
            let _ = writeln!(out, "  no filters available");
        } else {
            let _ = writeln!(
                out,
                "  filter keys ({}): {}",
                panel.available_filter_keys.len(),
                panel.available_filter_keys.join(", ")
            );
        }
    }
    out
}

pub fn format_summaries_text(summaries: &[FilterSummary]) -> String {
    let mut out = String::new();
    if summaries.is_empty() {
        let _ = writeln!(out, "No active filters.");
        return out;
    }

    for summary in summaries {
        if let Some(notice) = &summary.notice {
            let _ = match summary.chip_color {
                ChipColor::Warning => writeln!(out, "{}", notice.yellow()),
                ChipColor::Success => writeln!(out, "{}", notice.green()),
                ChipColor::Default => writeln!(out, "{}", notice),
            };
        }

        let mut parts: Vec<String> = summary
            .chips
            .iter()
            .map(|chip| paint_chip(chip, summary.chip_color))
            .collect();
        parts.extend(
            summary
                .groups
                .iter()
                .map(|group| paint(format!("[{}]", format_group_chip(group)), summary.chip_color)),
        );
        let _ = writeln!(out, "  {}", parts.join(format!(" {} ", summary.mode).as_str()));
    }
    out
}

pub fn format_inspection_json(
    perspective: Perspective,
    panels: &[FilterPanel],
    summaries: &[FilterSummary],
    selection: &DataSelection,
    sync_count: usize,
) -> String {
    let value = json!({
        "perspective": perspective,
        "panels": panels,
        "summaries": summaries,
        "syncs": sync_count,
        "selection": selection,
    });
    serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string())
}

pub fn format_keys_table(keys: &BTreeMap<String, KeyDescriptor>) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Key", "Label", "Type", "Multiple"]);
    for descriptor in keys.values() {
        let key_type = serde_json::to_value(descriptor.key_type)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        table.add_row(vec![
            descriptor.filter_key.clone(),
            descriptor.label.clone(),
            key_type,
            if descriptor.multiple { "yes" } else { "no" }.to_string(),
        ]);
    }
    table.to_string()
}

pub fn format_perspectives_table() -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            "Perspective",
            "Available entity types",
            "Search context",
            "Dynamic filters",
        ]);
    for perspective in Perspective::ALL {
        let context = FilterContext::for_perspective(perspective);
        table.add_row(vec![
            perspective.as_str().to_string(),
            context.available_entity_types.join(", "),
            context.search_context.entity_types.join(", "),
            if perspective.has_dynamic_filters() { "yes" } else { "no" }.to_string(),
        ]);
    }
    table.to_string()
}

pub fn format_perspectives_json() -> String {
    let rows: Vec<_> = Perspective::ALL
        .into_iter()
        .map(|perspective| {
            json!({
                "perspective": perspective,
                "context": FilterContext::for_perspective(perspective),
                "dynamicFilters": perspective.has_dynamic_filters(),
            })
        })
        .collect();
    serde_json::to_string_pretty(&rows).unwrap_or_else(|_| "[]".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterOperator;

    fn chip(operator: FilterOperator, values: &[&str], mode: FilterMode) -> FilterChip {
        FilterChip {
            key: "entity_type".to_string(),
            operator,
            values: values.iter().map(|v| v.to_string()).collect(),
            mode,
        }
    }

    #[test]
    fn test_format_chip() {
        assert_eq!(
            format_chip(&chip(FilterOperator::Eq, &["Malware", "Report"], FilterMode::Or)),
            "entity_type = Malware OR Report"
        );
        assert_eq!(
            format_chip(&chip(FilterOperator::NotNil, &[], FilterMode::Or)),
            "entity_type is not empty"
        );
    }

    #[test]
    fn test_format_group_chip_keeps_nested_conditions() {
        let group = GroupChip {
            mode: FilterMode::Or,
            chips: vec![chip(FilterOperator::Eq, &["Malware"], FilterMode::Or)],
            groups: vec![GroupChip {
                mode: FilterMode::And,
                chips: vec![
                    chip(FilterOperator::Eq, &["Report"], FilterMode::Or),
                    chip(FilterOperator::Nil, &[], FilterMode::Or),
                ],
                groups: Vec::new(),
            }],
        };
        assert_eq!(
            format_group_chip(&group),
            "(entity_type = Malware OR (entity_type = Report AND entity_type is empty))"
        );
    }

    #[test]
    fn test_empty_summaries_text() {
        assert_eq!(format_summaries_text(&[]), "No active filters.\n");
    }

    #[test]
    fn test_keys_table_lists_every_key() {
        let mut keys = BTreeMap::new();
        keys.insert(
            "created_at".to_string(),
            KeyDescriptor::new(
                "created_at",
                "Creation date",
                crate::catalog::FilterKeyType::Date,
                false,
            ),
        );
        let table = format_keys_table(&keys);
        assert!(table.contains("created_at"));
        assert!(table.contains("date"));
    }
}
