use crate::db::DbError;
use std::path::PathBuf;
use thiserror::Error;

/// Everything that can end an import run.
///
/// Read, target, and connection errors happen before a transaction exists.
/// Parse errors do too for an eager source, but a streaming source can hit
/// one mid-run. Anything raised while the transaction is open is paired
/// with a rollback.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Failed to read {}: {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON input: {0}")]
    Parse(String),

    #[error("Invalid import target: {0}")]
    InvalidTarget(String),

    #[error("Connection error: {0}")]
    Connection(#[source] DbError),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Insert failed at record {record}: {source}")]
    Statement {
        record: usize,
        #[source]
        source: DbError,
    },

    #[error("Transaction {op} failed: {source}")]
    Transaction {
        op: &'static str,
        #[source]
        source: DbError,
    },

    #[error("Transaction exceeded its time limit of {limit_secs:.1}s ({elapsed_secs:.1}s elapsed)")]
    Timeout { elapsed_secs: f64, limit_secs: f64 },

    #[error("{original}; the rollback failed as well: {rollback}")]
    RollbackFailed {
        original: Box<ImportError>,
        rollback: DbError,
    },
}

impl ImportError {
    pub(crate) fn parse(message: impl Into<String>) -> Self {
        ImportError::Parse(message.into())
    }
}
