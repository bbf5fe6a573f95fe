//! End-to-end reconciliation against the embedded admin store.

use proxysql_admin::channel::{ChannelError, ChannelResult, ExecOutcome, Row, Statement};
use proxysql_admin::config::PropagationConfig;
use proxysql_admin::propagation::Layer;
use proxysql_admin::reconcile::report;
use proxysql_admin::schema::{Attributes, ObjectClass, Registry};
use proxysql_admin::{AdminChannel, Engine, Error, ReconcileRequest, SqliteAdmin, State, VariableRequest};
use serde_json::json;

mod common;

fn quiet(engine: Engine<SqliteAdmin>) -> Engine<SqliteAdmin> {
    engine.with_propagation_defaults(PropagationConfig {
        save_to_disk: false,
        load_to_runtime: false,
    })
}

fn guest_rule(pattern: &str) -> ReconcileRequest {
    ReconcileRequest::new(ObjectClass::QueryRules)
        .param("username", "guest_ro")
        .param("match_pattern", pattern)
        .param("destination_hostgroup", 2)
        .param("active", true)
}

#[test]
fn test_backend_server_create_materializes_defaults() {
    let mut engine = quiet(common::memory_engine());
    let request = ReconcileRequest::new(ObjectClass::BackendServers)
        .param("hostgroup_id", 1)
        .param("hostname", "db1")
        .param("port", 3306);

    let outcome = engine.reconcile(&request).unwrap();
    assert!(outcome.applied.changed);
    assert_eq!(outcome.plan, "create");

    let record = outcome.applied.after.clone().unwrap();
    for (name, expected) in [
        ("status", "ONLINE"),
        ("weight", "1"),
        ("compression", "0"),
        ("max_connections", "1000"),
        ("max_replication_lag", "0"),
        ("use_ssl", "0"),
        ("max_latency_ms", "0"),
    ] {
        assert_eq!(record.get(name), Some(expected), "{name}");
    }

    let schema = Registry::builtin().get(ObjectClass::BackendServers);
    let doc = report::reconcile_document(schema, &outcome);
    assert_eq!(doc["changed"], json!(true));
    assert_eq!(doc["state"], json!("present"));
    assert_eq!(doc["server"]["hostname"], json!("db1"));
    assert_eq!(doc["msg"], json!("Added server to mysql_servers"));
}

#[test]
fn test_reconcile_is_idempotent() {
    let mut engine = quiet(common::memory_engine());
    let request = ReconcileRequest::new(ObjectClass::BackendServers)
        .param("hostgroup_id", 1)
        .param("hostname", "db1")
        .param("port", 3306);

    let first = engine.reconcile(&request).unwrap();
    let second = engine.reconcile(&request).unwrap();

    assert!(first.applied.changed);
    assert!(!second.applied.changed);
    assert_eq!(second.plan, "noop");
    assert_eq!(first.applied.after, second.applied.after);
    assert_eq!(common::rows(&mut engine, "mysql_servers", "hostname").len(), 1);
}

#[test]
fn test_partial_update_leaves_other_attributes() {
    let mut engine = quiet(common::memory_engine());
    engine
        .reconcile(
            &ReconcileRequest::new(ObjectClass::MysqlUsers)
                .param("username", "app")
                .param("password", "s3cret")
                .param("default_hostgroup", 5)
                .param("max_connections", 200),
        )
        .unwrap();

    let outcome = engine
        .reconcile(
            &ReconcileRequest::new(ObjectClass::MysqlUsers)
                .param("username", "app")
                .param("max_connections", 300),
        )
        .unwrap();

    assert_eq!(outcome.plan, "update");
    let before = outcome.applied.before.unwrap();
    let after = outcome.applied.after.unwrap();
    assert_eq!(after.get("max_connections"), Some("300"));
    for name in ["password", "default_hostgroup", "active", "fast_forward", "default_schema"] {
        assert_eq!(before.value(name), after.value(name), "{name}");
    }
    assert_eq!(after.get("default_hostgroup"), Some("5"));
}

#[test]
fn test_multi_delete_guard() {
    let mut engine = quiet(common::memory_engine());
    for pattern in ["^SELECT .* FOR UPDATE", "^SELECT", "^SHOW"] {
        assert!(engine.reconcile(&guest_rule(pattern)).unwrap().applied.changed);
    }
    engine
        .reconcile(&ReconcileRequest::new(ObjectClass::QueryRules).param("username", "writer"))
        .unwrap();

    let delete = ReconcileRequest::new(ObjectClass::QueryRules)
        .param("username", "guest_ro")
        .state(State::Absent);
    let err = engine.reconcile(&delete).unwrap_err();
    assert!(matches!(err, Error::AmbiguousTarget { count: 3, .. }));
    assert!(err.to_string().contains("force_multi_delete"));
    assert_eq!(common::rows(&mut engine, "mysql_query_rules", "rule_id").len(), 4);

    let outcome = engine.reconcile(&delete.force_multi_delete(true)).unwrap();
    assert!(outcome.applied.changed);
    assert_eq!(outcome.applied.deleted.len(), 3);

    let remaining = common::rows(&mut engine, "mysql_query_rules", "rule_id");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].get("username"), Some("writer"));
}

#[test]
fn test_query_rule_ids_and_chain_fields_round_trip() {
    let mut engine = quiet(common::memory_engine());
    let created = engine
        .reconcile(
            &ReconcileRequest::new(ObjectClass::QueryRules)
                .param("match_digest", "^SELECT")
                .param("flagIN", 0)
                .param("flagOUT", 10)
                .param("apply", false),
        )
        .unwrap();
    let rule = created.applied.after.unwrap();
    let rule_id = rule.value("rule_id").unwrap();
    assert_eq!(rule.get("flagOUT"), Some("10"));

    let updated = engine
        .reconcile(
            &ReconcileRequest::new(ObjectClass::QueryRules)
                .param("rule_id", rule_id.as_str())
                .param("retries", 3),
        )
        .unwrap();
    let after = updated.applied.after.unwrap();
    assert_eq!(after.get("retries"), Some("3"));
    assert_eq!(after.get("flagOUT"), Some("10"));
    assert_eq!(after.get("match_digest"), Some("^SELECT"));
}

#[test]
fn test_schedules_are_told_apart_by_args() {
    let mut engine = quiet(common::memory_engine());
    let job = |arg: &str| {
        ReconcileRequest::new(ObjectClass::Scheduler)
            .param("filename", "/opt/checks/galera.sh")
            .param("arg1", arg)
    };

    let first = engine.reconcile(&job("--node=1")).unwrap().applied.after.unwrap();
    let second = engine.reconcile(&job("--node=2")).unwrap().applied.after.unwrap();
    assert_ne!(first.get("id"), second.get("id"));

    let outcome = engine.reconcile(&job("--node=2").param("interval_ms", 2000)).unwrap();
    assert_eq!(outcome.plan, "update");
    assert_eq!(outcome.applied.after.unwrap().get("interval_ms"), Some("2000"));

    let err = engine
        .reconcile(
            &ReconcileRequest::new(ObjectClass::Scheduler)
                .param("filename", "/opt/checks/galera.sh")
                .state(State::Absent),
        )
        .unwrap_err();
    assert!(matches!(err, Error::AmbiguousTarget { count: 2, .. }));
}

#[test]
fn test_dry_run_writes_nothing() {
    let mut engine = common::memory_engine();
    let request = ReconcileRequest::new(ObjectClass::ReplicationHostgroups)
        .param("writer_hostgroup", 1)
        .param("reader_hostgroup", 2)
        .dry_run(true);

    let outcome = engine.reconcile(&request).unwrap();
    assert!(outcome.applied.changed);
    assert!(outcome.dry_run);
    assert!(outcome.propagated.is_empty());
    assert_eq!(outcome.applied.after.unwrap().get("comment"), Some(""));
    assert!(common::rows(&mut engine, "mysql_replication_hostgroups", "writer_hostgroup").is_empty());
}

#[test]
fn test_delete_absent_record_is_noop() {
    let mut engine = common::memory_engine();
    let request = ReconcileRequest::new(ObjectClass::ReplicationHostgroups)
        .param("writer_hostgroup", 1)
        .param("reader_hostgroup", 2)
        .state(State::Absent);

    let outcome = engine.reconcile(&request).unwrap();
    assert!(!outcome.applied.changed);
    let schema = Registry::builtin().get(ObjectClass::ReplicationHostgroups);
    let doc = report::reconcile_document(schema, &outcome);
    assert_eq!(doc["repl_group"], serde_json::Value::Null);
    assert_eq!(
        doc["msg"],
        json!("The replication hostgroup is already absent from the mysql_replication_hostgroups memory configuration")
    );
}

#[test]
fn test_global_variables() {
    let mut engine = quiet(common::memory_engine());

    let set = VariableRequest::new("mysql-max_connections").value("4096");
    let outcome = engine.variable(&set).unwrap();
    assert!(outcome.applied.changed);
    assert_eq!(outcome.applied.after.unwrap().get("variable_value"), Some("4096"));
    assert!(!engine.variable(&set).unwrap().applied.changed);

    let err = engine
        .variable(&VariableRequest::new("mysql-not_a_variable").value("1"))
        .unwrap_err();
    assert!(matches!(err, Error::Schema(_)));

    let err = engine.variable(&VariableRequest::new("mysql-not_a_variable")).unwrap_err();
    assert!(matches!(err, Error::Schema(_)));
}

#[test]
fn test_variable_change_propagates_its_own_group() {
    let mut engine = common::memory_engine();
    let outcome = engine
        .variable(&VariableRequest::new("admin-refresh_interval").value(5000))
        .unwrap();
    let statements: Vec<_> = outcome.propagated.iter().map(|p| p.statement.as_str()).collect();
    assert_eq!(statements, vec!["SAVE ADMIN VARIABLES TO DISK", "LOAD ADMIN VARIABLES TO RUNTIME"]);

    let criteria = Attributes::from([("variable_name".to_string(), Some("admin-refresh_interval".to_string()))]);
    let runtime = engine.show(ObjectClass::GlobalVariables, &criteria, Layer::Runtime).unwrap();
    assert_eq!(runtime[0].get("variable_value"), Some("5000"));
}

/// Delegates to the embedded store, failing the `fail_on`-th DELETE.
struct FlakyDeletes {
    inner: SqliteAdmin,
    deletes: u32,
    fail_on: u32,
}

impl AdminChannel for FlakyDeletes {
    fn query(&mut self, statement: &Statement) -> ChannelResult<Vec<Row>> {
        self.inner.query(statement)
    }

    fn execute(&mut self, statement: &Statement) -> ChannelResult<ExecOutcome> {
        if statement.sql.starts_with("DELETE") {
            self.deletes += 1;
            if self.deletes == self.fail_on {
                return Err(ChannelError::statement(statement.sql.clone(), "disk I/O error"));
            }
        }
        self.inner.execute(statement)
    }

    fn begin(&mut self) -> ChannelResult<()> {
        self.inner.begin()
    }

    fn commit(&mut self) -> ChannelResult<()> {
        self.inner.commit()
    }

    fn rollback(&mut self) -> ChannelResult<()> {
        self.inner.rollback()
    }
}

#[test]
fn test_failed_statement_rolls_back_whole_plan() {
    let mut seed = quiet(common::memory_engine());
    for pattern in ["^SELECT", "^SHOW", "^SET"] {
        seed.reconcile(&guest_rule(pattern)).unwrap();
    }

    let flaky = FlakyDeletes {
        inner: seed.into_inner(),
        deletes: 0,
        fail_on: 2,
    };
    let mut engine = Engine::new(flaky);
    let delete = ReconcileRequest::new(ObjectClass::QueryRules)
        .param("username", "guest_ro")
        .state(State::Absent)
        .force_multi_delete(true);

    let err = engine.reconcile(&delete).unwrap_err();
    assert!(matches!(err, Error::Apply { action: "delete from", .. }));
    assert!(err.to_string().contains("disk I/O error"));

    let rules = engine
        .show(ObjectClass::QueryRules, &Attributes::new(), Layer::Memory)
        .unwrap();
    assert_eq!(rules.len(), 3);
}
