//! # pji - JSON to table importer
//!
//! Loads a file holding a JSON array of objects and inserts every object as a
//! row of one table, inside a single transaction. Either every row lands or
//! none does.
//!
//! ## Modules
//!
//! - **source**: read records from the file, eagerly or as a stream
//! - **statement**: build quoted, parameterized INSERT statements
//! - **import**: run the statements inside one transaction
//! - **report**: turn the outcome into a message
//! - **db**: the database boundary, with PostgreSQL and SQLite backends
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pji::{db, import_file, report, ImportConfig, ImportTarget};
//!
//! # fn main() -> anyhow::Result<()> {
//! let target: ImportTarget = "users".parse()?;
//! let mut conn = db::connect("postgresql://localhost:5432/app")?;
//!
//! let result = import_file("users.json", &mut conn, &target, &ImportConfig::default());
//! println!("{}", report(&result));
//! # Ok(())
//! # }
//! ```

use std::path::Path;

pub mod db;
pub mod error;
pub mod import;
pub mod report;
pub mod source;
pub mod statement;
pub mod types;

#[cfg(test)]
mod testing;

pub use db::{connect, Connection, Dialect};
pub use error::ImportError;
pub use import::{ImportTransaction, Importer};
pub use report::report;
pub use source::Records;
pub use statement::InsertStatement;
pub use types::{
    ImportConfig, ImportResult, ImportStatus, ImportTarget, Record, SourceStrategy, SqlValue,
};

/// Import a JSON file into `target` over an existing connection
pub fn import_file<P, C>(
    path: P,
    conn: &mut C,
    target: &ImportTarget,
    config: &ImportConfig,
) -> ImportResult
where
    P: AsRef<Path>,
    C: Connection + ?Sized,
{
    match source::open(path.as_ref(), config.strategy) {
        Ok(records) => import_records(records, conn, target, config),
        Err(err) => ImportResult::failure(target.to_string(), err),
    }
}

/// Import a JSON file, connecting to the database only once the file has
/// been opened (and, for the eager strategy, fully parsed)
pub fn import_url<P: AsRef<Path>>(
    path: P,
    url: &str,
    target: &ImportTarget,
    config: &ImportConfig,
) -> ImportResult {
    let records = match source::open(path.as_ref(), config.strategy) {
        Ok(records) => records,
        Err(err) => return ImportResult::failure(target.to_string(), err),
    };
    let mut conn = match db::connect(url) {
        Ok(conn) => conn,
        Err(err) => return ImportResult::failure(target.to_string(), err),
    };
    import_records(records, &mut conn, target, config)
}

fn import_records<C: Connection + ?Sized>(
    records: Records,
    conn: &mut C,
    target: &ImportTarget,
    config: &ImportConfig,
) -> ImportResult {
    let records = if config.pipeline {
        match source::Pipeline::spawn(records, config.channel_capacity) {
            Ok(pipeline) => Box::new(pipeline) as Records,
            Err(e) => {
                log::error!("could not start the row source thread: {}", e);
                return ImportResult::failure(target.to_string(), ImportError::Io(e));
            }
        }
    } else {
        records
    };

    Importer::new(conn, config.clone()).import_all(target, records)
}
