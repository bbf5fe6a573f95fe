//! Result documents.
//!
//! Shapes outcomes into the JSON a host automation layer consumes:
//! `{changed, state, <result_key>, msg}` plus `propagated` and `dry_run`
//! when they apply. Secret attributes are masked.

use serde_json::{json, Map, Value};

use crate::error::Error;
use crate::propagation::PropagationOutcome;
use crate::reconcile::engine::{ReconcileOutcome, READ};
use crate::reconcile::request::State;
use crate::schema::{ClassSchema, ObjectClass, ObjectRecord};

const MASK: &str = "********";

/// Document for a reconcile or variable outcome.
pub fn reconcile_document(schema: &ClassSchema, outcome: &ReconcileOutcome) -> Value {
    let records: Vec<&ObjectRecord> = if outcome.plan == "delete" {
        outcome.applied.deleted.iter().collect()
    } else {
        outcome.applied.after.iter().collect()
    };

    let mut doc = Map::new();
    doc.insert("changed".into(), Value::Bool(outcome.applied.changed));
    doc.insert("state".into(), Value::String(outcome.state.to_string()));
    doc.insert(schema.result_key.into(), shape(schema, &records));
    doc.insert("msg".into(), Value::String(message(schema, outcome)));
    if !outcome.propagated.is_empty() {
        let statements: Vec<Value> = outcome
            .propagated
            .iter()
            .map(|p| Value::String(p.statement.clone()))
            .collect();
        doc.insert("propagated".into(), Value::Array(statements));
    }
    if outcome.dry_run {
        doc.insert("dry_run".into(), Value::Bool(true));
    }
    Value::Object(doc)
}

/// Document for a read-out of records.
pub fn records_document(schema: &ClassSchema, records: &[ObjectRecord]) -> Value {
    let masked: Vec<Value> = records.iter().map(|record| mask(schema, record)).collect();
    json!({
        "changed": false,
        "count": records.len(),
        schema.table: masked,
    })
}

/// Propagation is always reported as changed.
pub fn propagation_document(outcome: &PropagationOutcome) -> Value {
    json!({
        "changed": outcome.changed,
        "statement": outcome.statement,
        "source": outcome.source,
        "target": outcome.target,
        "msg": format!("Executed {}", outcome.statement),
    })
}

pub fn failure(err: &Error) -> Value {
    let mut doc = json!({
        "failed": true,
        "msg": err.to_string(),
    });
    if let Error::AmbiguousTarget { count, .. } = err {
        doc["matches"] = json!(count);
    }
    doc
}

/// Human summary of what happened.
pub fn message(schema: &ClassSchema, outcome: &ReconcileOutcome) -> String {
    if schema.class == ObjectClass::GlobalVariables {
        return variable_message(outcome);
    }

    let noun = schema.noun;
    let table = schema.table;
    let deleted = outcome.applied.deleted.len();

    match (outcome.plan, outcome.dry_run) {
        ("create", false) => format!("Added {noun} to {table}"),
        ("create", true) => format!(
            "{} would have been added to {table}, however dry_run is enabled",
            capitalize(noun)
        ),
        ("update", false) => format!("Updated {noun} in {table}"),
        ("update", true) => format!(
            "{} would have been updated in {table}, however dry_run is enabled",
            capitalize(noun)
        ),
        ("delete", false) if deleted > 1 => format!("Removed {deleted} {noun}s from {table}"),
        ("delete", false) => format!("Removed {noun} from {table}"),
        ("delete", true) if deleted > 1 => format!(
            "{deleted} {noun}s would have been removed from {table}, however dry_run is enabled"
        ),
        ("delete", true) => format!(
            "{} would have been removed from {table}, however dry_run is enabled",
            capitalize(noun)
        ),
        _ if outcome.state == State::Absent => {
            format!("The {noun} is already absent from the {table} memory configuration")
        }
        _ => format!("The {noun} already exists in {table} and doesn't need to be updated."),
    }
}

fn variable_message(outcome: &ReconcileOutcome) -> String {
    match (outcome.plan, outcome.dry_run) {
        (READ, _) => "Returned the variable and its current value".to_string(),
        ("update", true) => {
            "The variable would have been set to the supplied value, however dry_run is enabled".to_string()
        }
        ("update", false) => "Set the variable to the supplied value".to_string(),
        _ => "The variable is already set to the supplied value".to_string(),
    }
}

fn shape(schema: &ClassSchema, records: &[&ObjectRecord]) -> Value {
    if schema.list_result {
        Value::Array(records.iter().map(|record| mask(schema, record)).collect())
    } else {
        records
            .first()
            .map(|record| mask(schema, record))
            .unwrap_or(Value::Null)
    }
}

fn mask(schema: &ClassSchema, record: &ObjectRecord) -> Value {
    let fields = record
        .fields()
        .iter()
        .map(|(name, value)| {
            let secret = schema.attr(name).is_some_and(|attr| attr.secret);
            let value = match value {
                Some(_) if secret => Value::String(MASK.into()),
                Some(text) => Value::String(text.clone()),
                None => Value::Null,
            };
            (name.clone(), value)
        })
        .collect();
    Value::Object(fields)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::applier::AppliedResult;
    use crate::schema::{Attributes, Registry};

    fn outcome(class: ObjectClass, plan: &'static str, applied: AppliedResult) -> ReconcileOutcome {
        ReconcileOutcome {
            class,
            state: State::Present,
            plan,
            applied,
            propagated: Vec::new(),
            dry_run: false,
        }
    }

    fn user() -> ObjectRecord {
        ObjectRecord::new(Attributes::from([
            ("username".to_string(), Some("app".to_string())),
            ("password".to_string(), Some("s3cret".to_string())),
            ("default_schema".to_string(), None),
        ]))
    }

    #[test]
    fn test_secrets_are_masked() {
        let schema = Registry::builtin().get(ObjectClass::MysqlUsers);
        let applied = AppliedResult {
            changed: true,
            after: Some(user()),
            ..Default::default()
        };
        let doc = reconcile_document(schema, &outcome(ObjectClass::MysqlUsers, "create", applied));

        assert_eq!(doc["user"]["password"], json!(MASK));
        assert_eq!(doc["user"]["username"], json!("app"));
        assert_eq!(doc["user"]["default_schema"], Value::Null);
        assert_eq!(doc["msg"], json!("Added user to mysql_users"));
        assert!(doc.get("dry_run").is_none());
    }

    #[test]
    fn test_list_classes_report_arrays() {
        let schema = Registry::builtin().get(ObjectClass::QueryRules);
        let rules: Vec<ObjectRecord> = (1..=3)
            .map(|id| ObjectRecord::new(Attributes::from([("rule_id".to_string(), Some(id.to_string()))])))
            .collect();
        let mut result = outcome(
            ObjectClass::QueryRules,
            "delete",
            AppliedResult {
                changed: true,
                deleted: rules,
                ..Default::default()
            },
        );
        result.state = State::Absent;

        let doc = reconcile_document(schema, &result);
        assert_eq!(doc["rules"].as_array().map(Vec::len), Some(3));
        assert_eq!(doc["msg"], json!("Removed 3 rules from mysql_query_rules"));
        assert_eq!(doc["state"], json!("absent"));
    }

    #[test]
    fn test_noop_messages() {
        let schema = Registry::builtin().get(ObjectClass::BackendServers);
        let mut result = outcome(ObjectClass::BackendServers, "noop", AppliedResult::default());
        assert_eq!(
            message(schema, &result),
            "The server already exists in mysql_servers and doesn't need to be updated."
        );

        result.state = State::Absent;
        assert_eq!(
            message(schema, &result),
            "The server is already absent from the mysql_servers memory configuration"
        );
    }

    #[test]
    fn test_dry_run_wording() {
        let schema = Registry::builtin().get(ObjectClass::Scheduler);
        let mut result = outcome(ObjectClass::Scheduler, "create", AppliedResult::default());
        result.dry_run = true;
        assert_eq!(
            message(schema, &result),
            "Schedule would have been added to scheduler, however dry_run is enabled"
        );
    }

    #[test]
    fn test_failure_names_match_count() {
        let doc = failure(&Error::ambiguous_delete(3, "rule"));
        assert_eq!(doc["failed"], json!(true));
        assert_eq!(doc["matches"], json!(3));
        assert!(doc["msg"].as_str().unwrap().contains("3 rules"));
    }
}
