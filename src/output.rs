use anyhow::{Context, Result};
use clap::ValueEnum;
use comfy_table::{ContentArrangement, presets};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::model::{Cell, Table};

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Yaml,
}

/// Renders the visible part of `table`; hidden rows and columns never leave
/// this module.
pub fn render(table: &Table, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Table => Ok(render_table(table)),
        OutputFormat::Json => {
            serde_json::to_string_pretty(&records(table)).context("failed to encode rows as JSON")
        }
        OutputFormat::Yaml => {
            serde_yaml::to_string(&records(table)).context("failed to encode rows as YAML")
        }
    }
}

fn render_table(table: &Table) -> String {
    let rows = table
        .visible_rows()
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|cell| cell.display().into_owned())
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    comfy_table::Table::new()
        .load_preset(presets::NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(table.visible_header())
        .add_rows(rows)
        .to_string()
}

fn records(table: &Table) -> Vec<Map<String, Value>> {
    let header = table.visible_header();
    table
        .visible_rows()
        .into_iter()
        .map(|row| {
            header
                .iter()
                .zip(row)
                .map(|(name, cell)| (name.to_string(), cell_value(cell)))
                .collect()
        })
        .collect()
}

fn cell_value(cell: &Cell) -> Value {
    match cell {
        Cell::Text(value) => Value::String(value.clone()),
        Cell::Number(value) => Value::from(*value),
    }
}
