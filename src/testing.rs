//! Test double for the database boundary

use crate::db::{Connection, DbError, Dialect};
use crate::types::SqlValue;
use std::time::Instant;

/// Records every call and fails on request
#[derive(Debug, Default)]
pub struct ScriptedConnection {
    pub log: Vec<String>,
    pub fail_begin: bool,
    pub fail_commit: bool,
    pub fail_rollback: bool,
    /// Zero-based index of the execute call that should fail
    pub fail_execute: Option<usize>,
    /// Every deadline the transaction handed over, in order
    pub deadlines: Vec<Option<Instant>>,
    pub(crate) executed: usize,
}

impl ScriptedConnection {
    pub fn statements(&self) -> usize {
        self.log.iter().filter(|l| l.starts_with("INSERT")).count()
    }
}

impl Connection for ScriptedConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn begin(&mut self) -> Result<(), DbError> {
        self.log.push("BEGIN".to_string());
        if self.fail_begin {
            return Err(DbError::Other("cannot begin".to_string()));
        }
        Ok(())
    }

    fn execute(&mut self, sql: &str, _params: &[&SqlValue]) -> Result<u64, DbError> {
        self.log.push(sql.to_string());
        let call = self.executed;
        self.executed += 1;
        if self.fail_execute == Some(call) {
            return Err(DbError::Other(format!("execute #{} rejected", call)));
        }
        Ok(1)
    }

    fn commit(&mut self) -> Result<(), DbError> {
        self.log.push("COMMIT".to_string());
        if self.fail_commit {
            return Err(DbError::Other("commit failed".to_string()));
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DbError> {
        self.log.push("ROLLBACK".to_string());
        if self.fail_rollback {
            return Err(DbError::Other("rollback failed".to_string()));
        }
        Ok(())
    }

    fn set_deadline(&mut self, deadline: Option<Instant>) -> Result<(), DbError> {
        self.deadlines.push(deadline);
        Ok(())
    }
}
