use crate::db::{Connection, DbError};
use crate::error::ImportError;
use crate::statement::InsertStatement;
use std::time::{Duration, Instant};

/// Lifecycle of the import transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Open,
    Committed,
    RolledBack,
}

/// The single transaction wrapping one import run
///
/// `commit` and `rollback` take the transaction by value, so once it has
/// ended no further statement can be issued through it. If it is dropped
/// while still open - an early return or a panic - it rolls back.
pub struct ImportTransaction<'c, C: Connection + ?Sized> {
    conn: &'c mut C,
    state: TransactionState,
    opened_at: Instant,
    limit: Option<Duration>,
}

impl<'c, C: Connection + ?Sized> ImportTransaction<'c, C> {
    /// Issue BEGIN; `limit` bounds how long the transaction may stay open
    pub fn begin(conn: &'c mut C, limit: Option<Duration>) -> Result<Self, ImportError> {
        conn.begin().map_err(|source| ImportError::Transaction {
            op: "begin",
            source,
        })?;
        log::info!("transaction opened");

        let mut tx = ImportTransaction {
            conn,
            state: TransactionState::Open,
            opened_at: Instant::now(),
            limit,
        };
        match limit {
            None => Ok(tx),
            Some(limit) => match tx.conn.set_deadline(Some(tx.opened_at + limit)) {
                Ok(()) => Ok(tx),
                Err(source) => Err(tx.rollback(ImportError::Transaction {
                    op: "begin",
                    source,
                })),
            },
        }
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn elapsed(&self) -> Duration {
        self.opened_at.elapsed()
    }

    fn check_limit(&self) -> Result<(), ImportError> {
        match self.limit {
            Some(limit) if self.elapsed() > limit => Err(ImportError::Timeout {
                elapsed_secs: self.elapsed().as_secs_f64(),
                limit_secs: limit.as_secs_f64(),
            }),
            _ => Ok(()),
        }
    }

    /// Execute one statement; `first_record` is the source index of its
    /// first row and is used to locate failures.
    pub fn execute(
        &mut self,
        statement: &InsertStatement,
        first_record: usize,
    ) -> Result<u64, ImportError> {
        self.check_limit()?;

        let sql = statement.sql(self.conn.dialect());
        self.conn
            .execute(&sql, &statement.params())
            .map_err(|source| ImportError::Statement {
                record: first_record,
                source,
            })
    }

    /// Issue COMMIT. A transaction past its time limit, or a failed commit,
    /// is rolled back instead and reported as a failure.
    pub fn commit(mut self) -> Result<(), ImportError> {
        if let Err(err) = self.check_limit() {
            return Err(self.rollback(err));
        }

        match self.conn.commit() {
            Ok(()) => {
                self.state = TransactionState::Committed;
                self.clear_deadline();
                log::info!("transaction committed after {:?}", self.elapsed());
                Ok(())
            }
            Err(source) => Err(self.rollback(ImportError::Transaction {
                op: "commit",
                source,
            })),
        }
    }

    /// Issue ROLLBACK because of `cause` and return the error to report.
    /// If the rollback fails too, both failures are returned together.
    pub fn rollback(mut self, cause: ImportError) -> ImportError {
        log::warn!("rolling back: {}", cause);

        match self.abandon() {
            Ok(()) => cause,
            Err(rollback) => ImportError::RollbackFailed {
                original: Box::new(cause),
                rollback,
            },
        }
    }

    fn abandon(&mut self) -> Result<(), DbError> {
        self.state = TransactionState::RolledBack;
        let result = self.conn.rollback();
        self.clear_deadline();
        result
    }

    fn clear_deadline(&mut self) {
        if self.limit.is_some() {
            if let Err(e) = self.conn.set_deadline(None) {
                log::debug!("could not lift the statement deadline: {}", e);
            }
        }
    }
}

impl<C: Connection + ?Sized> Drop for ImportTransaction<'_, C> {
    fn drop(&mut self) {
        if self.state == TransactionState::Open {
            log::warn!("transaction dropped while open; rolling back");
            if let Err(e) = self.abandon() {
                log::error!("rollback of abandoned transaction failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement;
    use crate::testing::ScriptedConnection;
    use crate::types::{ImportTarget, Record};
    use serde_json::json;

    fn statement() -> InsertStatement {
        let target: ImportTarget = "t".parse().unwrap();
        statement::build(&target, Record::try_from(json!({"id": 1})).unwrap()).unwrap()
    }

    #[test]
    fn test_commit_path() {
        let mut conn = ScriptedConnection::default();
        let mut tx = ImportTransaction::begin(&mut conn, None).unwrap();
        assert_eq!(tx.state(), TransactionState::Open);

        tx.execute(&statement(), 0).unwrap();
        tx.commit().unwrap();

        assert_eq!(
            conn.log,
            vec!["BEGIN", r#"INSERT INTO "t" ("id") VALUES ($1)"#, "COMMIT"]
        );
    }

    #[test]
    fn test_failed_begin_opens_nothing() {
        let mut conn = ScriptedConnection {
            fail_begin: true,
            ..Default::default()
        };
        let err = ImportTransaction::begin(&mut conn, None).err().unwrap();

        assert!(matches!(err, ImportError::Transaction { op: "begin", .. }));
        assert_eq!(conn.log, vec!["BEGIN"]);
    }

    #[test]
    fn test_failed_commit_still_rolls_back() {
        let mut conn = ScriptedConnection {
            fail_commit: true,
            ..Default::default()
        };
        let mut tx = ImportTransaction::begin(&mut conn, None).unwrap();
        tx.execute(&statement(), 0).unwrap();

        let err = tx.commit().unwrap_err();
        assert!(matches!(err, ImportError::Transaction { op: "commit", .. }));
        assert_eq!(conn.log.last().unwrap(), "ROLLBACK");
    }

    #[test]
    fn test_rollback_failure_keeps_original_error() {
        let mut conn = ScriptedConnection {
            fail_rollback: true,
            ..Default::default()
        };
        let tx = ImportTransaction::begin(&mut conn, None).unwrap();

        let err = tx.rollback(ImportError::SchemaMismatch("empty record".into()));
        match err {
            ImportError::RollbackFailed { original, .. } => {
                assert!(matches!(*original, ImportError::SchemaMismatch(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_drop_rolls_back_open_transaction() {
        let mut conn = ScriptedConnection::default();
        {
            let mut tx = ImportTransaction::begin(&mut conn, None).unwrap();
            tx.execute(&statement(), 0).unwrap();
        }
        assert_eq!(conn.log.last().unwrap(), "ROLLBACK");
    }

    #[test]
    fn test_time_limit() {
        let mut conn = ScriptedConnection::default();
        let mut tx = ImportTransaction::begin(&mut conn, Some(Duration::ZERO)).unwrap();
        std::thread::sleep(Duration::from_millis(2));

        let err = tx.execute(&statement(), 4).unwrap_err();
        assert!(matches!(err, ImportError::Timeout { .. }));
        drop(tx);

        assert_eq!(conn.log, vec!["BEGIN", "ROLLBACK"]);
    }

    #[test]
    fn test_commit_past_the_limit_rolls_back() {
        let mut conn = ScriptedConnection::default();
        let mut tx =
            ImportTransaction::begin(&mut conn, Some(Duration::from_millis(10))).unwrap();
        tx.execute(&statement(), 0).unwrap();
        std::thread::sleep(Duration::from_millis(30));

        let err = tx.commit().unwrap_err();
        assert!(matches!(err, ImportError::Timeout { .. }));
        assert_eq!(conn.log.last().unwrap(), "ROLLBACK");
        assert!(!conn.log.iter().any(|l| l == "COMMIT"));
    }

    #[test]
    fn test_deadline_is_handed_to_the_connection() {
        let mut conn = ScriptedConnection::default();
        let tx = ImportTransaction::begin(&mut conn, Some(Duration::from_secs(60))).unwrap();
        tx.commit().unwrap();

        assert_eq!(conn.deadlines.len(), 2);
        assert!(conn.deadlines[0].is_some());
        assert!(conn.deadlines[1].is_none());
    }

    #[test]
    fn test_no_limit_leaves_the_connection_alone() {
        let mut conn = ScriptedConnection::default();
        let tx = ImportTransaction::begin(&mut conn, None).unwrap();
        tx.commit().unwrap();

        assert!(conn.deadlines.is_empty());
    }
}
