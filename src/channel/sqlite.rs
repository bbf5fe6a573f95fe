//! Embedded admin interface backed by SQLite.
//!
//! # Responsibilities
//! - Hold MEMORY (`t`), RUNTIME (`runtime_t`) and DISK (`disk.t`) copies of
//!   every registry table
//! - Execute `LOAD`/`SAVE` statements as whole-group copies
//! - Read the CONFIG layer from a TOML file of table rows
//!
//! # Design Decisions
//! - Table definitions are derived from the schema registry
//! - The DISK layer is an attached database so it can live in its own file
//! - Propagation runs under a savepoint: a group moves completely or not at all
//! - CONFIG rows pass through the same attribute normalization as requests

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection};
use serde_json::{Map, Value};

use crate::channel::client::{AdminChannel, ChannelError, ChannelResult, ExecOutcome, Row, Statement};
use crate::config::StoreConfig;
use crate::error::Error;
use crate::propagation::{ConfigSettings, Layer, PropagationRequest};
use crate::schema::{AttrKind, ClassSchema, Registry};

/// Variables present in a fresh admin store.
const SEED_VARIABLES: &[(&str, &str)] = &[
    ("admin-admin_credentials", "admin:admin"),
    ("admin-mysql_ifaces", "0.0.0.0:6032"),
    ("admin-refresh_interval", "2000"),
    ("mysql-default_query_delay", "0"),
    ("mysql-default_query_timeout", "36000000"),
    ("mysql-max_connections", "2048"),
    ("mysql-poll_timeout", "2000"),
    ("mysql-query_retries_on_failure", "1"),
    ("mysql-threads", "4"),
];

/// CONFIG layer file: table name to rows.
type ConfigFile = BTreeMap<String, Vec<Map<String, Value>>>;

/// An admin session on an embedded store.
pub struct SqliteAdmin {
    conn: Connection,
    config_path: Option<PathBuf>,
}

impl SqliteAdmin {
    /// Fully in-memory store with no CONFIG file.
    pub fn open_in_memory() -> ChannelResult<Self> {
        Self::open(None, None, None)
    }

    pub fn from_store_config(config: &StoreConfig) -> ChannelResult<Self> {
        Self::open(
            config.memory_path.as_deref(),
            config.disk_path.as_deref(),
            config.config_path.as_deref(),
        )
    }

    /// Open a store. Unset paths stay in memory.
    pub fn open(memory: Option<&Path>, disk: Option<&Path>, config: Option<&Path>) -> ChannelResult<Self> {
        let conn = match memory {
            Some(path) => Connection::open(path),
            None => Connection::open_in_memory(),
        }
        .map_err(|e| ChannelError::Connection(format!("failed to open admin store: {e}")))?;

        let disk_target = disk
            .map(|path| path.to_string_lossy().into_owned())
            .unwrap_or_else(|| ":memory:".to_string());
        conn.execute("ATTACH DATABASE ?1 AS disk", [&disk_target])
            .map_err(|e| ChannelError::Connection(format!("failed to attach disk store {disk_target}: {e}")))?;

        let admin = Self {
            conn,
            config_path: config.map(Path::to_path_buf),
        };
        admin.init_schema()?;

        tracing::debug!(
            memory = ?memory,
            disk = %disk_target,
            config = ?admin.config_path,
            "Admin store opened"
        );
        Ok(admin)
    }

    fn init_schema(&self) -> ChannelResult<()> {
        let mut ddl = String::new();
        for schema in Registry::builtin().all() {
            for layer in [Layer::Memory, Layer::Runtime, Layer::Disk] {
                if let Some(name) = layer.table_name(schema.table) {
                    ddl.push_str(&create_table(schema, &name));
                }
            }
        }
        self.conn
            .execute_batch(&ddl)
            .map_err(|e| ChannelError::statement("CREATE TABLE", e))?;

        for layer in [Layer::Memory, Layer::Runtime, Layer::Disk] {
            let Some(table) = layer.table_name("global_variables") else {
                continue;
            };
            let sql = format!("INSERT OR IGNORE INTO {table} (variable_name, variable_value) VALUES (?1, ?2)");
            for (name, value) in SEED_VARIABLES {
                self.conn
                    .execute(&sql, [name, value])
                    .map_err(|e| ChannelError::statement(sql.clone(), e))?;
            }
        }
        Ok(())
    }

    /// Copy one settings group between layers.
    fn propagate(&mut self, request: &PropagationRequest) -> ChannelResult<u64> {
        let sql = request.to_string();
        let transition = request
            .transition()
            .map_err(|e| ChannelError::statement(sql.clone(), e))?;

        if transition.source == Layer::Config {
            return self.load_config_file(request.settings);
        }

        let filter = variable_filter(request.settings);
        let savepoint = self
            .conn
            .savepoint()
            .map_err(|e| ChannelError::statement(sql.clone(), e))?;

        let mut copied = 0u64;
        for table in request.settings.tables() {
            let (Some(source), Some(target)) =
                (transition.source.table_name(table), transition.target.table_name(table))
            else {
                continue;
            };
            savepoint
                .execute(&format!("DELETE FROM {target}{filter}"), [])
                .map_err(|e| ChannelError::statement(sql.clone(), e))?;
            copied += savepoint
                .execute(&format!("INSERT INTO {target} SELECT * FROM {source}{filter}"), [])
                .map_err(|e| ChannelError::statement(sql.clone(), e))? as u64;
        }
        savepoint
            .commit()
            .map_err(|e| ChannelError::statement(sql.clone(), e))?;

        tracing::debug!(statement = %sql, rows = copied, "Settings group copied");
        Ok(copied)
    }

    /// Upsert the CONFIG file rows of `settings` into MEMORY.
    fn load_config_file(&mut self, settings: ConfigSettings) -> ChannelResult<u64> {
        let sql = format!("LOAD {settings} FROM CONFIG");
        let path = self
            .config_path
            .clone()
            .ok_or_else(|| ChannelError::statement(sql.clone(), "no config file is configured"))?;
        let content = fs::read_to_string(&path)
            .map_err(|e| ChannelError::statement(sql.clone(), format!("{}: {e}", path.display())))?;
        let file: ConfigFile = toml::from_str(&content)
            .map_err(|e| ChannelError::statement(sql.clone(), format!("{}: {e}", path.display())))?;

        let prefix = settings.variable_prefix();
        let savepoint = self
            .conn
            .savepoint()
            .map_err(|e| ChannelError::statement(sql.clone(), e))?;

        let registry = Registry::builtin();
        let mut loaded = 0u64;
        for table in settings.tables() {
            let schema = registry
                .by_table(table)
                .ok_or_else(|| ChannelError::statement(sql.clone(), format!("no schema for table {table}")))?;
            for row in file.get(*table).into_iter().flatten() {
                if let Some(prefix) = prefix {
                    let name = row.get("variable_name").and_then(Value::as_str).unwrap_or_default();
                    if !name.starts_with(prefix) {
                        continue;
                    }
                }
                let fields = schema.normalize(row).map_err(|e| match e {
                    Error::Schema(message) => ChannelError::Schema(format!("{} [{table}]: {message}", path.display())),
                    other => ChannelError::statement(sql.clone(), other),
                })?;
                let columns: Vec<String> = fields.keys().map(|name| format!("`{name}`")).collect();
                let placeholders = vec!["?"; columns.len()].join(", ");
                let insert = format!(
                    "INSERT OR REPLACE INTO {table} ({}) VALUES ({placeholders})",
                    columns.join(", ")
                );
                loaded += savepoint
                    .execute(&insert, params_from_iter(fields.values()))
                    .map_err(|e| ChannelError::statement(insert.clone(), e))? as u64;
            }
        }
        savepoint
            .commit()
            .map_err(|e| ChannelError::statement(sql.clone(), e))?;

        tracing::debug!(path = %path.display(), rows = loaded, "Config file loaded into memory");
        Ok(loaded)
    }
}

impl AdminChannel for SqliteAdmin {
    fn query(&mut self, statement: &Statement) -> ChannelResult<Vec<Row>> {
        let err = |e: rusqlite::Error| ChannelError::statement(statement.sql.clone(), e);

        let mut stmt = self.conn.prepare(&statement.sql).map_err(err)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query(params_from_iter(statement.params.iter())).map_err(err)?;

        let mut result = Vec::new();
        while let Some(row) = rows.next().map_err(err)? {
            let mut fields = Row::new();
            for (i, name) in columns.iter().enumerate() {
                fields.insert(name.clone(), column_text(row.get_ref(i).map_err(err)?));
            }
            result.push(fields);
        }
        Ok(result)
    }

    fn execute(&mut self, statement: &Statement) -> ChannelResult<ExecOutcome> {
        let verb = statement
            .sql
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();

        if verb == "LOAD" || verb == "SAVE" {
            let request: PropagationRequest = statement
                .sql
                .parse()
                .map_err(|e| ChannelError::statement(statement.sql.clone(), e))?;
            let affected_rows = self.propagate(&request)?;
            return Ok(ExecOutcome {
                affected_rows,
                last_insert_id: None,
            });
        }

        let affected = self
            .conn
            .execute(&statement.sql, params_from_iter(statement.params.iter()))
            .map_err(|e| ChannelError::statement(statement.sql.clone(), e))?;

        Ok(ExecOutcome {
            affected_rows: affected as u64,
            last_insert_id: (verb == "INSERT").then(|| self.conn.last_insert_rowid()),
        })
    }

    fn begin(&mut self) -> ChannelResult<()> {
        if !self.conn.is_autocommit() {
            return Err(ChannelError::Transaction("a transaction is already open".into()));
        }
        self.conn
            .execute_batch("BEGIN")
            .map_err(|e| ChannelError::Transaction(e.to_string()))
    }

    fn commit(&mut self) -> ChannelResult<()> {
        if self.conn.is_autocommit() {
            return Err(ChannelError::Transaction("no open transaction to commit".into()));
        }
        self.conn
            .execute_batch("COMMIT")
            .map_err(|e| ChannelError::Transaction(e.to_string()))
    }

    fn rollback(&mut self) -> ChannelResult<()> {
        if self.conn.is_autocommit() {
            return Ok(());
        }
        self.conn
            .execute_batch("ROLLBACK")
            .map_err(|e| ChannelError::Transaction(e.to_string()))
    }
}

fn create_table(schema: &ClassSchema, name: &str) -> String {
    let mut columns: Vec<String> = schema
        .attributes
        .iter()
        .map(|attr| {
            if attr.auto {
                return format!("`{}` INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL", attr.name);
            }
            let sql_type = match attr.kind {
                AttrKind::Int | AttrKind::Bool => "INT",
                AttrKind::Text | AttrKind::Choice(_) => "VARCHAR",
            };
            let mut column = format!("`{}` {sql_type}", attr.name);
            if !attr.nullable {
                column.push_str(" NOT NULL");
            }
            if let Some(default) = attr.default {
                column.push_str(&format!(" DEFAULT '{default}'"));
            }
            if let AttrKind::Choice(choices) = attr.kind {
                let allowed: Vec<String> = choices.iter().map(|choice| format!("'{choice}'")).collect();
                column.push_str(&format!(" CHECK (`{}` IN ({}))", attr.name, allowed.join(",")));
            }
            column
        })
        .collect();

    let has_auto_key = schema.attributes.iter().any(|attr| attr.auto);
    if !has_auto_key {
        let keys: Vec<String> = schema.primary_key.iter().map(|key| format!("`{key}`")).collect();
        columns.push(format!("PRIMARY KEY ({})", keys.join(", ")));
    }

    format!("CREATE TABLE IF NOT EXISTS {name} (\n    {}\n);\n", columns.join(",\n    "))
}

fn variable_filter(settings: ConfigSettings) -> String {
    settings
        .variable_prefix()
        .map(|prefix| format!(" WHERE variable_name LIKE '{prefix}%'"))
        .unwrap_or_default()
}

fn column_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(admin: &mut SqliteAdmin, table: &str) -> usize {
        admin
            .query(&Statement::new(format!("SELECT * FROM {table}")))
            .unwrap()
            .len()
    }

    #[test]
    fn test_tables_exist_in_every_readable_layer() {
        let mut admin = SqliteAdmin::open_in_memory().unwrap();
        for table in ["mysql_servers", "runtime_mysql_servers", "disk.mysql_servers"] {
            assert_eq!(count(&mut admin, table), 0, "{table}");
        }
        assert_eq!(count(&mut admin, "global_variables"), SEED_VARIABLES.len());
    }

    #[test]
    fn test_insert_reports_assigned_id() {
        let mut admin = SqliteAdmin::open_in_memory().unwrap();
        let insert = Statement::with_params(
            "INSERT INTO scheduler (`filename`) VALUES (?)",
            vec![Some("/opt/a.sh".into())],
        );
        let first = admin.execute(&insert).unwrap();
        let second = admin.execute(&insert).unwrap();
        assert_eq!(first.last_insert_id, Some(1));
        assert_eq!(second.last_insert_id, Some(2));
        assert_eq!(second.affected_rows, 1);
    }

    #[test]
    fn test_rows_come_back_as_text() {
        let mut admin = SqliteAdmin::open_in_memory().unwrap();
        admin
            .execute(&Statement::with_params(
                "INSERT INTO mysql_servers (`hostname`, `port`) VALUES (?, ?)",
                vec![Some("db1".into()), Some("3307".into())],
            ))
            .unwrap();

        let rows = admin
            .query(&Statement::new("SELECT `port`, `status`, `weight` FROM mysql_servers"))
            .unwrap();
        assert_eq!(rows[0]["port"].as_deref(), Some("3307"));
        assert_eq!(rows[0]["status"].as_deref(), Some("ONLINE"));
        assert_eq!(rows[0]["weight"].as_deref(), Some("1"));
    }

    #[test]
    fn test_check_constraint_rejects_bad_status() {
        let mut admin = SqliteAdmin::open_in_memory().unwrap();
        let err = admin
            .execute(&Statement::with_params(
                "INSERT INTO mysql_servers (`hostname`, `status`) VALUES (?, ?)",
                vec![Some("db1".into()), Some("SHUNNED".into())],
            ))
            .unwrap_err();
        assert!(matches!(err, ChannelError::Statement { .. }));
    }

    #[test]
    fn test_rollback_discards_writes() {
        let mut admin = SqliteAdmin::open_in_memory().unwrap();
        admin.begin().unwrap();
        admin
            .execute(&Statement::with_params(
                "INSERT INTO mysql_users (`username`) VALUES (?)",
                vec![Some("app".into())],
            ))
            .unwrap();
        admin.rollback().unwrap();
        assert_eq!(count(&mut admin, "mysql_users"), 0);
    }

    #[test]
    fn test_nested_begin_is_rejected() {
        let mut admin = SqliteAdmin::open_in_memory().unwrap();
        admin.begin().unwrap();
        assert!(matches!(admin.begin(), Err(ChannelError::Transaction(_))));
        admin.rollback().unwrap();
        assert!(matches!(admin.commit(), Err(ChannelError::Transaction(_))));
    }

    #[test]
    fn test_variable_groups_copy_only_their_prefix() {
        let mut admin = SqliteAdmin::open_in_memory().unwrap();
        admin
            .execute(&Statement::new(
                "UPDATE global_variables SET variable_value = '9' WHERE variable_name IN ('mysql-threads', 'admin-refresh_interval')",
            ))
            .unwrap();
        admin.execute(&Statement::new("LOAD MYSQL VARIABLES TO RUNTIME")).unwrap();

        let rows = admin
            .query(&Statement::new(
                "SELECT variable_name, variable_value FROM runtime_global_variables WHERE variable_value = '9'",
            ))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["variable_name"].as_deref(), Some("mysql-threads"));
    }

    #[test]
    fn test_unknown_propagation_statement_fails() {
        let mut admin = SqliteAdmin::open_in_memory().unwrap();
        let err = admin.execute(&Statement::new("SAVE MYSQL SERVERS TO CONFIG")).unwrap_err();
        assert!(err.to_string().contains("read-only"));
    }
}
