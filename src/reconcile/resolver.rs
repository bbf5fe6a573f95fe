//! Existing-State Resolver.
//!
//! Matching is exact equality on every supplied criterion; a `None`
//! criterion matches NULL. Pattern attributes such as `match_pattern` are
//! compared verbatim, never interpreted.

use crate::channel::{AdminChannel, Statement};
use crate::error::{Error, Result};
use crate::propagation::Layer;
use crate::schema::{Attributes, ClassSchema, ObjectRecord};

/// `WHERE` clause and its bound values. Empty criteria select every row.
pub fn where_clause(criteria: &Attributes) -> (String, Vec<Option<String>>) {
    if criteria.is_empty() {
        return (String::new(), Vec::new());
    }

    let mut conditions = Vec::with_capacity(criteria.len());
    let mut params = Vec::with_capacity(criteria.len());
    for (name, value) in criteria {
        match value {
            Some(value) => {
                conditions.push(format!("`{name}` = ?"));
                params.push(Some(value.clone()));
            }
            None => conditions.push(format!("`{name}` IS NULL")),
        }
    }
    (format!(" WHERE {}", conditions.join(" AND ")), params)
}

/// `SELECT` of every class column from `table`, in class order.
pub fn select_statement(schema: &ClassSchema, table: &str, criteria: &Attributes) -> Statement {
    let columns: Vec<String> = schema.columns().map(|name| format!("`{name}`")).collect();
    let order: Vec<String> = schema.order_by().iter().map(|name| format!("`{name}`")).collect();
    let (filter, params) = where_clause(criteria);

    Statement::with_params(
        format!(
            "SELECT {} FROM {table}{filter} ORDER BY {}",
            columns.join(", "),
            order.join(", ")
        ),
        params,
    )
}

/// Records in MEMORY matching `criteria`.
pub fn resolve<C>(channel: &mut C, schema: &ClassSchema, criteria: &Attributes) -> Result<Vec<ObjectRecord>>
where
    C: AdminChannel + ?Sized,
{
    resolve_in(channel, schema, criteria, Layer::Memory)
}

/// Records in `layer` matching `criteria`. CONFIG is not readable.
pub fn resolve_in<C>(
    channel: &mut C,
    schema: &ClassSchema,
    criteria: &Attributes,
    layer: Layer,
) -> Result<Vec<ObjectRecord>>
where
    C: AdminChannel + ?Sized,
{
    if let Some(unknown) = criteria.keys().find(|name| schema.attr(name).is_none()) {
        return Err(Error::schema(format!(
            "unknown attribute \"{unknown}\" for {}",
            schema.class
        )));
    }
    let table = layer
        .table_name(schema.table)
        .ok_or_else(|| Error::invalid_layer(format!("the {layer} layer cannot be read")))?;

    let rows = channel.query(&select_statement(schema, &table, criteria))?;
    tracing::debug!(table = %table, matched = rows.len(), "Resolved existing records");

    Ok(rows.into_iter().map(ObjectRecord::from).collect())
}
