//! Control-channel interface.
//!
//! # Responsibilities
//! - Carry parameterized statements to the admin interface
//! - Return row sets (every column as text or NULL) or affected-row counts
//! - Expose an explicit begin/commit/rollback boundary

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// One result row: column name to text value, `None` for NULL.
pub type Row = BTreeMap<String, Option<String>>;

/// A parameterized statement. Placeholders are `?`, bound in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Option<String>>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params(sql: impl Into<String>, params: Vec<Option<String>>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Result of a write statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecOutcome {
    pub affected_rows: u64,
    /// Id assigned by the store to the last inserted row, if any.
    pub last_insert_id: Option<i64>,
}

/// Errors raised by the control channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Connectivity failure; the text is the original diagnostic.
    #[error("{0}")]
    Connection(String),

    /// The store rejected a statement.
    #[error("statement `{sql}` failed: {message}")]
    Statement { sql: String, message: String },

    /// A write touched a different number of rows than planned.
    #[error("expected {expected} row(s) affected, got {actual}")]
    RowCount { expected: u64, actual: u64 },

    /// Store content that does not fit its class schema.
    #[error("{0}")]
    Schema(String),

    /// Transaction boundary misuse (commit without begin, nested begin).
    #[error("transaction error: {0}")]
    Transaction(String),
}

impl ChannelError {
    pub fn statement(sql: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Statement {
            sql: sql.into(),
            message: message.to_string(),
        }
    }
}

/// Result type for channel operations.
pub type ChannelResult<T> = Result<T, ChannelError>;

/// A synchronous session on the admin interface.
///
/// One statement at a time. Implementations release the session on drop.
pub trait AdminChannel {
    /// Run a read statement.
    fn query(&mut self, statement: &Statement) -> ChannelResult<Vec<Row>>;

    /// Run a write statement, including `LOAD`/`SAVE` propagation statements.
    fn execute(&mut self, statement: &Statement) -> ChannelResult<ExecOutcome>;

    fn begin(&mut self) -> ChannelResult<()>;

    fn commit(&mut self) -> ChannelResult<()>;

    fn rollback(&mut self) -> ChannelResult<()>;
}

impl<C: AdminChannel + ?Sized> AdminChannel for &mut C {
    fn query(&mut self, statement: &Statement) -> ChannelResult<Vec<Row>> {
        (**self).query(statement)
    }

    fn execute(&mut self, statement: &Statement) -> ChannelResult<ExecOutcome> {
        (**self).execute(statement)
    }

    fn begin(&mut self) -> ChannelResult<()> {
        (**self).begin()
    }

    fn commit(&mut self) -> ChannelResult<()> {
        (**self).commit()
    }

    fn rollback(&mut self) -> ChannelResult<()> {
        (**self).rollback()
    }
}

impl<C: AdminChannel + ?Sized> AdminChannel for Box<C> {
    fn query(&mut self, statement: &Statement) -> ChannelResult<Vec<Row>> {
        (**self).query(statement)
    }

    fn execute(&mut self, statement: &Statement) -> ChannelResult<ExecOutcome> {
        (**self).execute(statement)
    }

    fn begin(&mut self) -> ChannelResult<()> {
        (**self).begin()
    }

    fn commit(&mut self) -> ChannelResult<()> {
        (**self).commit()
    }

    fn rollback(&mut self) -> ChannelResult<()> {
        (**self).rollback()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_binds_in_order() {
        let stmt = Statement::with_params("SELECT 1 WHERE a = ? AND b = ?", vec![Some("x".into()), None]);
        assert_eq!(stmt.params, vec![Some("x".to_string()), None]);
        assert_eq!(stmt.to_string(), "SELECT 1 WHERE a = ? AND b = ?");
    }

    #[test]
    fn test_error_display() {
        let err = ChannelError::statement("DELETE FROM scheduler", "database is locked");
        assert_eq!(err.to_string(), "statement `DELETE FROM scheduler` failed: database is locked");

        let err = ChannelError::RowCount { expected: 1, actual: 0 };
        assert!(err.to_string().contains("got 0"));
    }
}
