//! Scoped transaction boundary.

use crate::channel::client::{AdminChannel, ChannelResult, ExecOutcome, Row, Statement};

/// A RAII guard over an open transaction.
///
/// Dropping the guard without calling [`Transaction::commit`] rolls the
/// transaction back, so every early return leaves the store untouched.
pub struct Transaction<'a, C: AdminChannel + ?Sized> {
    channel: &'a mut C,
    finished: bool,
}

impl<'a, C: AdminChannel + ?Sized> Transaction<'a, C> {
    /// Open a transaction on `channel`.
    pub fn begin(channel: &'a mut C) -> ChannelResult<Self> {
        channel.begin()?;
        tracing::debug!("Transaction started");
        Ok(Self {
            channel,
            finished: false,
        })
    }

    pub fn query(&mut self, statement: &Statement) -> ChannelResult<Vec<Row>> {
        tracing::debug!(sql = %statement, params = ?statement.params, "query");
        self.channel.query(statement)
    }

    pub fn execute(&mut self, statement: &Statement) -> ChannelResult<ExecOutcome> {
        tracing::debug!(sql = %statement, params = ?statement.params, "execute");
        self.channel.execute(statement)
    }

    /// Make every write visible at once.
    ///
    /// A failed commit leaves the guard unfinished, so drop still rolls back.
    pub fn commit(mut self) -> ChannelResult<()> {
        self.channel.commit()?;
        self.finished = true;
        tracing::debug!("Transaction committed");
        Ok(())
    }
}

impl<C: AdminChannel + ?Sized> Drop for Transaction<'_, C> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        match self.channel.rollback() {
            Ok(()) => tracing::debug!("Transaction rolled back"),
            Err(e) => tracing::error!(error = %e, "Rollback failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelError;

    /// Records boundary calls; fails any write when `fail_writes` is set.
    #[derive(Default)]
    struct Recorder {
        calls: Vec<&'static str>,
        fail_writes: bool,
    }

    impl AdminChannel for Recorder {
        fn query(&mut self, _: &Statement) -> ChannelResult<Vec<Row>> {
            self.calls.push("query");
            Ok(Vec::new())
        }

        fn execute(&mut self, stmt: &Statement) -> ChannelResult<ExecOutcome> {
            self.calls.push("execute");
            if self.fail_writes {
                return Err(ChannelError::statement(stmt.sql.clone(), "read-only"));
            }
            Ok(ExecOutcome::default())
        }

        fn begin(&mut self) -> ChannelResult<()> {
            self.calls.push("begin");
            Ok(())
        }

        fn commit(&mut self) -> ChannelResult<()> {
            self.calls.push("commit");
            Ok(())
        }

        fn rollback(&mut self) -> ChannelResult<()> {
            self.calls.push("rollback");
            Ok(())
        }
    }

    #[test]
    fn test_commit_does_not_roll_back() {
        let mut recorder = Recorder::default();
        {
            let mut tx = Transaction::begin(&mut recorder).unwrap();
            tx.execute(&Statement::new("INSERT")).unwrap();
            tx.commit().unwrap();
        }
        assert_eq!(recorder.calls, vec!["begin", "execute", "commit"]);
    }

    #[test]
    fn test_drop_rolls_back_on_error_path() {
        let mut recorder = Recorder {
            fail_writes: true,
            ..Default::default()
        };

        fn run(channel: &mut Recorder) -> ChannelResult<()> {
            let mut tx = Transaction::begin(channel)?;
            tx.execute(&Statement::new("UPDATE"))?;
            tx.commit()
        }

        assert!(run(&mut recorder).is_err());
        assert_eq!(recorder.calls, vec!["begin", "execute", "rollback"]);
    }
}
