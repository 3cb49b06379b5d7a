//! Command execution.

use recmap_core::{AssociationKind, Database, OrderBy, Query};

use crate::error::CliError;
use crate::formatter::{Formatter, Related};
use crate::schema;
use crate::Command;

/// Execute a command and return formatted output.
pub fn execute(db: &Database, command: Command, formatter: &dyn Formatter) -> Result<String, CliError> {
    match command {
        Command::Seed => {
            let written = schema::seed(db)?;
            Ok(formatter.format_message(&format!("{} row(s) inserted", written)))
        }
        Command::List { entity, order } => {
            let mut query = Query::all();
            if let Some(order) = order {
                query = query.order_by(parse_order(&order)?);
            }
            let rows = db.mapper().query(&entity, &query)?;
            Ok(formatter.format_entities(&column_names(db, &entity)?, &rows))
        }
        Command::Show { entity, id } => {
            let mut row = db.mapper().load(&entity, id)?;
            let resolver = db.resolver();

            let mut related = Vec::new();
            for association in db.registry().associations(&entity)? {
                let resolved = match association.kind {
                    AssociationKind::BelongsTo { .. } => {
                        Related::One(resolver.one(&mut row, &association.name)?.cloned())
                    }
                    _ => Related::Many(resolver.many(&mut row, &association.name)?.to_vec()),
                };
                related.push((association.name, resolved));
            }

            Ok(formatter.format_entity(&column_names(db, &entity)?, &row, &related))
        }
        Command::Delete { entity, id } => {
            let mapper = db.mapper();
            let mut row = mapper.load(&entity, id)?;
            mapper.delete(&mut row)?;
            Ok(formatter.format_message(&format!("Deleted {} {}", entity, id)))
        }
    }
}

fn column_names(db: &Database, entity: &str) -> Result<Vec<String>, CliError> {
    Ok(db
        .registry()
        .columns(entity)?
        .into_iter()
        .map(|c| c.name)
        .collect())
}

/// Parse `attribute[:asc|:desc]`.
fn parse_order(order: &str) -> Result<OrderBy, CliError> {
    let (field, direction) = order.split_once(':').unwrap_or((order, "asc"));
    if field.is_empty() {
        return Err(CliError::InvalidOrder(order.to_string()));
    }
    match direction {
        "asc" => Ok(OrderBy::asc(field)),
        "desc" => Ok(OrderBy::desc(field)),
        _ => Err(CliError::InvalidOrder(order.to_string())),
    }
}
