//! Diff & Mutation Planner.
//!
//! A pure function of the desired state and the resolved records. Updates
//! carry only supplied attributes that differ, so unsupplied attributes are
//! never overwritten.

use crate::error::{Error, Result};
use crate::reconcile::request::State;
use crate::schema::{Attributes, ClassSchema, ObjectRecord};

/// The mutation needed to reach the desired state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationPlan {
    /// Nothing to write. Carries the matched records for reporting.
    NoOp { existing: Vec<ObjectRecord> },
    /// Insert a record with defaults already merged in.
    Create { attributes: Attributes },
    /// Write `changes` to the record addressed by `key`.
    Update {
        key: Attributes,
        changes: Attributes,
        before: ObjectRecord,
    },
    /// Remove every record addressed by `keys`.
    Delete {
        keys: Vec<Attributes>,
        before: Vec<ObjectRecord>,
    },
}

impl MutationPlan {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            MutationPlan::NoOp { .. } => "noop",
            MutationPlan::Create { .. } => "create",
            MutationPlan::Update { .. } => "update",
            MutationPlan::Delete { .. } => "delete",
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, MutationPlan::NoOp { .. })
    }
}

/// Plan the mutation taking `existing` to `desired`.
pub fn plan(
    schema: &ClassSchema,
    desired: &Attributes,
    state: State,
    force_multi_delete: bool,
    mut existing: Vec<ObjectRecord>,
) -> Result<MutationPlan> {
    match (state, existing.len()) {
        (State::Present, 0) => {
            if !schema.creatable {
                return Err(Error::schema(format!(
                    "unknown {} {}; {} rows cannot be created",
                    schema.noun,
                    describe(desired, schema.primary_key),
                    schema.table
                )));
            }
            Ok(MutationPlan::Create {
                attributes: schema.with_defaults(desired)?,
            })
        }
        (State::Present, 1) => {
            let record = existing.remove(0);
            let changes = diff(desired, &record);
            if changes.is_empty() {
                Ok(MutationPlan::NoOp { existing: vec![record] })
            } else {
                Ok(MutationPlan::Update {
                    key: schema.row_key(&record),
                    changes,
                    before: record,
                })
            }
        }
        (State::Present, count) => Err(Error::ambiguous_update(count, schema.noun)),
        (State::Absent, 0) => Ok(MutationPlan::NoOp { existing }),
        (State::Absent, count) if count == 1 || force_multi_delete => Ok(MutationPlan::Delete {
            keys: existing.iter().map(|record| schema.row_key(record)).collect(),
            before: existing,
        }),
        (State::Absent, count) => Err(Error::ambiguous_delete(count, schema.noun)),
    }
}

/// Supplied attributes whose value differs from the record.
fn diff(desired: &Attributes, record: &ObjectRecord) -> Attributes {
    desired
        .iter()
        .filter(|(name, value)| record.fields().get(name.as_str()) != Some(*value))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

fn describe(desired: &Attributes, keys: &[&str]) -> String {
    let parts: Vec<String> = keys
        .iter()
        .filter_map(|key| {
            desired
                .get(*key)
                .map(|value| format!("{key}={}", value.as_deref().unwrap_or("NULL")))
        })
        .collect();
    parts.join(", ")
}
