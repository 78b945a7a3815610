use super::transaction::ImportTransaction;
use crate::db::Connection;
use crate::error::ImportError;
use crate::statement::{self, InsertStatement};
use crate::types::{ImportConfig, ImportResult, ImportTarget, Record};

/// Imports a sequence of records into one table inside a single transaction
///
/// The importer owns its connection for as long as it lives; pass `&mut conn`
/// to keep using the connection afterwards.
pub struct Importer<C: Connection> {
    conn: C,
    config: ImportConfig,
}

/// A statement still collecting rows, and the source index of its first row
struct Pending {
    first: usize,
    statement: InsertStatement,
}

#[derive(Debug, Clone, Copy)]
struct BatchLimits {
    rows: usize,
    params: usize,
}

impl BatchLimits {
    fn can_absorb(self, statement: &InsertStatement, record: &Record) -> bool {
        statement.row_count() < self.rows
            && statement.param_count() + statement.columns().len() <= self.params
            && statement.matches(record)
    }

    fn is_full(self, statement: &InsertStatement) -> bool {
        statement.row_count() >= self.rows
            || statement.param_count() + statement.columns().len() > self.params
    }
}

impl<C: Connection> Importer<C> {
    pub fn new(conn: C, config: ImportConfig) -> Self {
        Importer { conn, config }
    }

    /// Insert every record, committing only if all of them succeed
    ///
    /// Records are executed in source order. The first failure - a bad
    /// record from the source, a rejected insert, a failed commit - rolls
    /// the whole transaction back and is returned with a row count of 0.
    pub fn import_all<I>(&mut self, target: &ImportTarget, records: I) -> ImportResult
    where
        I: IntoIterator<Item = Result<Record, ImportError>>,
    {
        match run(&mut self.conn, &self.config, target, records.into_iter()) {
            Ok(rows) => {
                log::info!("imported {} rows into {}", rows, target);
                ImportResult::success(target.to_string(), rows)
            }
            Err(err) => {
                log::error!("import into {} failed: {}", target, err);
                ImportResult::failure(target.to_string(), err)
            }
        }
    }
}

fn run<C, I>(
    conn: &mut C,
    config: &ImportConfig,
    target: &ImportTarget,
    records: I,
) -> Result<usize, ImportError>
where
    C: Connection + ?Sized,
    I: Iterator<Item = Result<Record, ImportError>>,
{
    let limits = BatchLimits {
        rows: config.batch_size.max(1),
        params: conn.dialect().max_params(),
    };

    let mut tx = ImportTransaction::begin(conn, config.max_duration)?;
    let mut pending: Option<Pending> = None;
    let mut imported = 0;

    for (index, item) in records.enumerate() {
        let step = item.and_then(|record| {
            stage(&mut tx, &mut pending, limits, target, index, record)
        });
        match step {
            Ok(rows) => imported += rows,
            Err(err) => return Err(tx.rollback(err)),
        }
    }

    if let Some(last) = pending.take() {
        match flush(&mut tx, last) {
            Ok(rows) => imported += rows,
            Err(err) => return Err(tx.rollback(err)),
        }
    }

    tx.commit()?;
    Ok(imported)
}

/// Add a record to the pending statement, executing whatever is ready.
/// Returns the number of rows executed.
fn stage<C: Connection + ?Sized>(
    tx: &mut ImportTransaction<'_, C>,
    pending: &mut Option<Pending>,
    limits: BatchLimits,
    target: &ImportTarget,
    index: usize,
    record: Record,
) -> Result<usize, ImportError> {
    let mut executed = 0;

    let fits = pending
        .as_ref()
        .is_some_and(|p| limits.can_absorb(&p.statement, &record));
    if fits {
        if let Some(p) = pending.as_mut() {
            p.statement.push_record(record)?;
        }
    } else {
        if let Some(previous) = pending.take() {
            executed += flush(tx, previous)?;
        }
        *pending = Some(Pending {
            first: index,
            statement: statement::build(target, record)?,
        });
    }

    if pending.as_ref().is_some_and(|p| limits.is_full(&p.statement)) {
        if let Some(full) = pending.take() {
            executed += flush(tx, full)?;
        }
    }

    Ok(executed)
}

fn flush<C: Connection + ?Sized>(
    tx: &mut ImportTransaction<'_, C>,
    pending: Pending,
) -> Result<usize, ImportError> {
    let rows = pending.statement.row_count();
    let affected = tx.execute(&pending.statement, pending.first)?;
    log::debug!(
        "records {}..{} inserted ({} rows affected)",
        pending.first,
        pending.first + rows,
        affected
    );
    Ok(rows)
}
