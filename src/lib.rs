pub mod catalog;
pub mod cli;
pub mod config;
pub mod display;
pub mod filter;
pub mod perspective;
pub mod selection;
pub mod widget;

use crate::filter::{FilterEdit, parse_edits};
use anyhow::Context;
pub use catalog::{FilterKeyCatalog, KeyDescriptor};
pub use cli::{ColorMode, Commands, OutputFormat, cli_parse};
pub use filter::{Filter, FilterGroup, FilterGroupStore, FilterMode, FilterOperator};
pub use perspective::{FilterContext, Perspective, SearchContext, WidgetType};
pub use selection::DataSelection;
use serde_json::json;
use std::cell::Cell;
use std::path::Path;
use std::rc::Rc;
use tracing::{info, warn};
pub use widget::{FilterPanel, FilterSummary, GroupChip, PanelRole, WidgetFilters};

fn write_output_file(path: &Path, content: &str) -> anyhow::Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write output file '{}'", path.display()))
}

fn load_selection(path: Option<&Path>) -> anyhow::Result<DataSelection> {
    let Some(path) = path else {
        return Ok(DataSelection::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read selection file '{}'", path.display()))?;
    DataSelection::from_json5(&raw)
        .with_context(|| format!("Failed to parse selection file '{}'", path.display()))
}

fn apply_edits(widget: &WidgetFilters, role: PanelRole, edits: &[FilterEdit]) -> usize {
    if !edits.is_empty() && !widget.is_active(role) {
        warn!(
            role = role.as_str(),
            perspective = %widget.perspective(),
            "pre-query filters only apply to the relationships perspective"
        );
    }
    edits
        .iter()
        .filter(|edit| edit.apply(widget.store(role)))
        .count()
}

fn emit(text: &str, output: Option<&Path>) -> anyhow::Result<()> {
    print!("{text}");
    if !text.ends_with('\n') {
        println!();
    }
    if let Some(path) = output {
        write_output_file(path, text)?;
    }
    Ok(())
}

pub fn run() -> anyhow::Result<()> {
    let cli = cli_parse();
    cli::init_tracing(cli.verbose, cli.quiet)?;

    match cli.color {
        ColorMode::Always => colored::control::set_override(true),
        ColorMode::Never => colored::control::set_override(false),
        ColorMode::Auto => {}
    }
    // Files never get escape codes.
    if cli.output.is_some() && cli.color != ColorMode::Always {
        colored::control::set_override(false);
    }

    let config = config::load_config(cli.config.as_deref()).context("Failed to load config")?;
    let catalog = Rc::new(config.build_catalog());
    let output = cli.output.as_deref();

    match &cli.command {
        Commands::Inspect {
            selection,
            perspective,
            widget_type,
            filters,
            from,
            to,
            mode,
        } => {
            let main_edits = parse_edits(filters).context("Invalid --filter term")?;
            let from_edits = parse_edits(from).context("Invalid --from term")?;
            let to_edits = parse_edits(to).context("Invalid --to term")?;

            let selection = load_selection(selection.as_deref())?;
            let perspective = perspective.unwrap_or_else(|| {
                Perspective::from_label(selection.perspective.as_deref().unwrap_or_default())
            });

            let syncs = Rc::new(Cell::new(0usize));
            let sync_counter = Rc::clone(&syncs);
            let widget = WidgetFilters::new(
                perspective,
                WidgetType::from(widget_type.as_str()),
                selection,
                Rc::clone(&catalog),
                move |_| sync_counter.set(sync_counter.get() + 1),
            )
            .with_notices(config.notices.clone());

            if let Some(mode) = mode {
                widget.store(PanelRole::Main).set_mode(*mode);
            }
            let changed = apply_edits(&widget, PanelRole::Main, &main_edits)
                + apply_edits(&widget, PanelRole::DynamicFrom, &from_edits)
                + apply_edits(&widget, PanelRole::DynamicTo, &to_edits);
            info!(changed, syncs = syncs.get(), "applied filter edits");

            let panels = widget.panels();
            let summaries = widget.summaries();
            let result = widget.data_selection();

            let text = match cli.format {
                OutputFormat::Text => {
                    let selection_json = serde_json::to_string_pretty(&result)
                        .context("Failed to serialize data selection")?;
                    format!(
                        "{}\n{}\nSelection:\n{}\n",
                        display::format_panels_text(&panels),
                        display::format_summaries_text(&summaries),
                        selection_json
                    )
                }
                OutputFormat::Json => display::format_inspection_json(
                    perspective,
                    &panels,
                    &summaries,
                    &result,
                    syncs.get(),
                ),
            };
            emit(&text, output)?;
        }
        Commands::Keys { entity_types } => {
            for unknown in entity_types.iter().filter(|t| !catalog.knows(t)) {
                warn!(entity_type = %unknown, "entity type not in filter key catalog");
            }
            let keys = catalog.keys_for(entity_types);
            let text = match cli.format {
                OutputFormat::Text => {
                    if keys.is_empty() {
                        "No filters available.\n".to_string()
                    } else {
                        display::format_keys_table(&keys)
                    }
                }
                OutputFormat::Json => {
                    let available =
                        catalog.available_filter_keys(&SearchContext::new(entity_types));
                    serde_json::to_string_pretty(&json!({
                        "entityTypes": entity_types,
                        "availableFilterKeys": available,
                        "keys": keys,
                    }))
                    .context("Failed to serialize filter keys")?
                }
            };
            emit(&text, output)?;
        }
        Commands::Perspectives => {
            let text = match cli.format {
                OutputFormat::Text => display::format_perspectives_table(),
                OutputFormat::Json => display::format_perspectives_json(),
            };
            emit(&text, output)?;
        }
    }

    Ok(())
}
