//! Shared utilities for integration tests.

use std::fs;
use std::path::PathBuf;

use proxysql_admin::channel::Statement;
use proxysql_admin::schema::ObjectRecord;
use proxysql_admin::{AdminChannel, Engine, SqliteAdmin};
use tempfile::TempDir;

/// An engine over a fully in-memory admin store.
pub fn memory_engine() -> Engine<SqliteAdmin> {
    Engine::new(SqliteAdmin::open_in_memory().unwrap())
}

/// An engine whose MEMORY and DISK layers live in files under `dir`.
#[allow(dead_code)]
pub fn file_engine(dir: &TempDir) -> Engine<SqliteAdmin> {
    let admin = SqliteAdmin::open(
        Some(&dir.path().join("memory.db")),
        Some(&dir.path().join("disk.db")),
        Some(&dir.path().join("proxysql.toml")),
    )
    .unwrap();
    Engine::new(admin)
}

/// Write the CONFIG layer file for a store opened by [`file_engine`].
#[allow(dead_code)]
pub fn write_config_file(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("proxysql.toml");
    fs::write(&path, content).unwrap();
    path
}

/// Every row of `table`, ordered by `order_by`.
#[allow(dead_code)]
pub fn rows(engine: &mut Engine<SqliteAdmin>, table: &str, order_by: &str) -> Vec<ObjectRecord> {
    engine
        .channel_mut()
        .query(&Statement::new(format!("SELECT * FROM {table} ORDER BY {order_by}")))
        .unwrap()
        .into_iter()
        .map(ObjectRecord::from)
        .collect()
}
