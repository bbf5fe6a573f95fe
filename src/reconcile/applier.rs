//! Transactional Applier.
//!
//! # Responsibilities
//! - Execute a plan inside one transaction against MEMORY
//! - Check every UPDATE/DELETE touched exactly one row
//! - Read the persisted record back so results show class defaults
//!
//! # Design Decisions
//! - Any failure drops the transaction guard, which rolls back
//! - `NoOp` never opens a transaction

use std::time::Instant;

use crate::channel::{AdminChannel, ChannelError, ChannelResult, Statement, Transaction};
use crate::error::{Error, Result};
use crate::observability::metrics;
use crate::reconcile::planner::MutationPlan;
use crate::reconcile::resolver::{select_statement, where_clause};
use crate::schema::{Attributes, ClassSchema, ObjectRecord};

/// What a plan did (or, for a dry run, would do).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppliedResult {
    pub changed: bool,
    pub before: Option<ObjectRecord>,
    pub after: Option<ObjectRecord>,
    /// Every record a delete removed.
    pub deleted: Vec<ObjectRecord>,
}

impl AppliedResult {
    /// The result a plan would produce, without touching the store.
    pub fn preview(plan: &MutationPlan) -> Self {
        match plan {
            MutationPlan::NoOp { existing } => Self {
                changed: false,
                before: existing.first().cloned(),
                after: existing.first().cloned(),
                deleted: Vec::new(),
            },
            MutationPlan::Create { attributes } => Self {
                changed: true,
                before: None,
                after: Some(ObjectRecord::new(attributes.clone())),
                deleted: Vec::new(),
            },
            MutationPlan::Update { changes, before, .. } => {
                let mut after = before.clone();
                for (name, value) in changes {
                    after.set(name.clone(), value.clone());
                }
                Self {
                    changed: true,
                    before: Some(before.clone()),
                    after: Some(after),
                    deleted: Vec::new(),
                }
            }
            MutationPlan::Delete { before, .. } => Self {
                changed: true,
                before: before.first().cloned(),
                after: None,
                deleted: before.clone(),
            },
        }
    }
}

/// Apply `plan` to MEMORY as one all-or-nothing transaction.
pub fn apply<C>(channel: &mut C, schema: &ClassSchema, plan: MutationPlan) -> Result<AppliedResult>
where
    C: AdminChannel + ?Sized,
{
    let started = Instant::now();

    let result = match plan {
        MutationPlan::NoOp { existing } => {
            return Ok(AppliedResult {
                changed: false,
                before: existing.first().cloned(),
                after: existing.into_iter().next(),
                deleted: Vec::new(),
            });
        }
        MutationPlan::Create { attributes } => {
            let failed = apply_error(schema, "insert into");
            let mut tx = Transaction::begin(channel).map_err(failed)?;
            let outcome = tx.execute(&insert_statement(schema, &attributes)).map_err(failed)?;
            let key = schema.inserted_key(&attributes, outcome.last_insert_id)?;
            let after = read_back(&mut tx, schema, &key).map_err(failed)?;
            tx.commit().map_err(failed)?;

            tracing::info!(table = schema.table, key = ?key, "Inserted record");
            AppliedResult {
                changed: true,
                before: None,
                after: Some(after),
                deleted: Vec::new(),
            }
        }
        MutationPlan::Update { key, changes, before } => {
            let failed = apply_error(schema, "update");
            let mut tx = Transaction::begin(channel).map_err(failed)?;
            let outcome = tx.execute(&update_statement(schema, &key, &changes)).map_err(failed)?;
            expect_one(outcome.affected_rows).map_err(failed)?;

            let mut new_key = key;
            for (name, value) in &changes {
                if let Some(slot) = new_key.get_mut(name) {
                    *slot = value.clone();
                }
            }
            let after = read_back(&mut tx, schema, &new_key).map_err(failed)?;
            tx.commit().map_err(failed)?;

            tracing::info!(table = schema.table, key = ?new_key, changed = ?changes.keys(), "Updated record");
            AppliedResult {
                changed: true,
                before: Some(before),
                after: Some(after),
                deleted: Vec::new(),
            }
        }
        MutationPlan::Delete { keys, before } => {
            let failed = apply_error(schema, "delete from");
            let mut tx = Transaction::begin(channel).map_err(failed)?;
            for key in &keys {
                let (filter, params) = where_clause(key);
                let stmt = Statement::with_params(format!("DELETE FROM {}{filter}", schema.table), params);
                let outcome = tx.execute(&stmt).map_err(failed)?;
                expect_one(outcome.affected_rows).map_err(failed)?;
            }
            tx.commit().map_err(failed)?;

            tracing::info!(table = schema.table, count = keys.len(), "Deleted records");
            AppliedResult {
                changed: true,
                before: before.first().cloned(),
                after: None,
                deleted: before,
            }
        }
    };

    metrics::record_apply_duration(schema.class, started.elapsed());
    Ok(result)
}

/// Wraps a channel failure of `action` on the class table.
fn apply_error<'a>(schema: &'a ClassSchema, action: &'static str) -> impl Fn(ChannelError) -> Error + Copy + 'a {
    move |source| Error::Apply {
        action,
        table: schema.table,
        source,
    }
}

fn insert_statement(schema: &ClassSchema, attributes: &Attributes) -> Statement {
    if attributes.is_empty() {
        return Statement::new(format!("INSERT INTO {} DEFAULT VALUES", schema.table));
    }
    let columns: Vec<String> = attributes.keys().map(|name| format!("`{name}`")).collect();
    let placeholders = vec!["?"; columns.len()].join(", ");
    Statement::with_params(
        format!(
            "INSERT INTO {} ({}) VALUES ({placeholders})",
            schema.table,
            columns.join(", ")
        ),
        attributes.values().cloned().collect(),
    )
}

fn update_statement(schema: &ClassSchema, key: &Attributes, changes: &Attributes) -> Statement {
    let assignments: Vec<String> = changes.keys().map(|name| format!("`{name}` = ?")).collect();
    let (filter, key_params) = where_clause(key);
    let mut params: Vec<Option<String>> = changes.values().cloned().collect();
    params.extend(key_params);
    Statement::with_params(
        format!("UPDATE {} SET {}{filter}", schema.table, assignments.join(", ")),
        params,
    )
}

fn read_back<C>(tx: &mut Transaction<'_, C>, schema: &ClassSchema, key: &Attributes) -> ChannelResult<ObjectRecord>
where
    C: AdminChannel + ?Sized,
{
    let mut rows = tx.query(&select_statement(schema, schema.table, key))?;
    if rows.len() != 1 {
        return Err(ChannelError::RowCount {
            expected: 1,
            actual: rows.len() as u64,
        });
    }
    Ok(ObjectRecord::from(rows.remove(0)))
}

fn expect_one(affected: u64) -> ChannelResult<()> {
    if affected == 1 {
        Ok(())
    } else {
        Err(ChannelError::RowCount {
            expected: 1,
            actual: affected,
        })
    }
}
