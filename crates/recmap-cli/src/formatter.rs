//! Output formatters for entities.

use clap::ValueEnum;
use comfy_table::{Cell, Table};
use recmap_core::Entity;

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format
    Table,
    /// JSON format
    Json,
}

/// Association resolved for `show`.
pub enum Related {
    /// A belongs-to parent, if any.
    One(Option<Entity>),
    /// An owns-many or many-through sequence.
    Many(Vec<Entity>),
}

/// Trait for formatting output.
pub trait Formatter {
    /// Format rows of one entity type.
    fn format_entities(&self, columns: &[String], rows: &[Entity]) -> String;

    /// Format one entity and its resolved associations.
    fn format_entity(&self, columns: &[String], entity: &Entity, related: &[(String, Related)]) -> String;

    /// Format a simple message.
    fn format_message(&self, message: &str) -> String;
}

/// Create a formatter for the given output format.
pub fn create_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Table => Box::new(TableFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}

/// Table formatter using comfy-table.
pub struct TableFormatter;

impl Formatter for TableFormatter {
    fn format_entities(&self, columns: &[String], rows: &[Entity]) -> String {
        if rows.is_empty() {
            return "No results".to_string();
        }
        format!("{}\n{} row(s)", rows_table(columns, rows), rows.len())
    }

    fn format_entity(&self, columns: &[String], entity: &Entity, related: &[(String, Related)]) -> String {
        let mut table = Table::new();
        table.set_header(vec!["Attribute", "Value"]);
        table.add_row(vec![Cell::new("id"), Cell::new(entity.field("id"))]);
        for column in columns {
            table.add_row(vec![
                Cell::new(column),
                Cell::new(entity.field(column)),
            ]);
        }
        let mut output = table.to_string();

        for (name, related) in related {
            output.push_str(&format!("\n\n{}:\n", name));
            match related {
                Related::One(Some(parent)) => output.push_str(&summary(parent)),
                Related::One(None) => output.push_str("NULL"),
                Related::Many(rows) if rows.is_empty() => output.push_str("(none)"),
                Related::Many(rows) => {
                    let lines: Vec<String> = rows.iter().map(summary).collect();
                    output.push_str(&lines.join("\n"));
                }
            }
        }
        output
    }

    fn format_message(&self, message: &str) -> String {
        message.to_string()
    }
}

/// JSON formatter.
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format_entities(&self, _columns: &[String], rows: &[Entity]) -> String {
        let rows: Vec<serde_json::Value> = rows.iter().map(entity_to_json).collect();
        serde_json::to_string_pretty(&rows).unwrap_or_else(|_| "[]".to_string())
    }

    fn format_entity(&self, _columns: &[String], entity: &Entity, related: &[(String, Related)]) -> String {
        let mut obj = match entity_to_json(entity) {
            serde_json::Value::Object(obj) => obj,
            _ => serde_json::Map::new(),
        };
        for (name, related) in related {
            let value = match related {
                Related::One(parent) => parent
                    .as_ref()
                    .map(entity_to_json)
                    .unwrap_or(serde_json::Value::Null),
                Related::Many(rows) => {
                    serde_json::Value::Array(rows.iter().map(entity_to_json).collect())
                }
            };
            obj.insert(name.clone(), value);
        }
        serde_json::to_string_pretty(&serde_json::Value::Object(obj))
            .unwrap_or_else(|_| "{}".to_string())
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({
            "message": message
        })
        .to_string()
    }
}

fn rows_table(columns: &[String], rows: &[Entity]) -> Table {
    let mut table = Table::new();

    let mut headers: Vec<Cell> = vec![Cell::new("id")];
    for column in columns {
        headers.push(Cell::new(column));
    }
    table.set_header(headers);

    for row in rows {
        let mut cells: Vec<Cell> = vec![Cell::new(row.field("id"))];
        for column in columns {
            cells.push(Cell::new(row.field(column)));
        }
        table.add_row(cells);
    }
    table
}

/// One-line description: type, id and attributes.
fn summary(entity: &Entity) -> String {
    let attributes: Vec<String> = entity
        .attributes()
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(name, value)| format!("{}={}", name, value))
        .collect();
    format!(
        "{} #{} {}",
        entity.entity_type(),
        entity.field("id"),
        attributes.join(" ")
    )
}

fn entity_to_json(entity: &Entity) -> serde_json::Value {
    let mut obj = serde_json::Map::new();
    obj.insert("id".to_string(), serde_json::json!(entity.id()));
    for (name, value) in entity.attributes() {
        obj.insert(
            name.clone(),
            serde_json::to_value(value).unwrap_or(serde_json::Value::Null),
        );
    }
    obj.insert("created_at".to_string(), serde_json::json!(entity.created_at()));
    obj.insert("updated_at".to_string(), serde_json::json!(entity.updated_at()));
    serde_json::Value::Object(obj)
}
