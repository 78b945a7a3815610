use super::{Connection, DbError, Dialect};
use crate::types::SqlValue;
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::ToSql;
use std::path::Path;
use std::time::{Duration, Instant};

// rusqlite's own default
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite backend
pub struct SqliteConnection {
    conn: rusqlite::Connection,
}

impl SqliteConnection {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        Ok(Self::from_connection(rusqlite::Connection::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self, DbError> {
        Ok(Self::from_connection(rusqlite::Connection::open_in_memory()?))
    }

    pub fn from_connection(conn: rusqlite::Connection) -> Self {
        SqliteConnection { conn }
    }

    /// The underlying driver connection, e.g. to create or inspect tables
    pub fn inner(&self) -> &rusqlite::Connection {
        &self.conn
    }
}

impl Connection for SqliteConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn begin(&mut self) -> Result<(), DbError> {
        self.conn.execute_batch("BEGIN")?;
        Ok(())
    }

    fn execute(&mut self, sql: &str, params: &[&SqlValue]) -> Result<u64, DbError> {
        let mut statement = self.conn.prepare_cached(sql)?;
        let affected = statement.execute(rusqlite::params_from_iter(
            params.iter().map(|value| SqliteParam(*value)),
        ))?;
        Ok(affected as u64)
    }

    fn commit(&mut self) -> Result<(), DbError> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DbError> {
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    /// Waits on a locked database give up at the deadline
    fn set_deadline(&mut self, deadline: Option<Instant>) -> Result<(), DbError> {
        let timeout = match deadline {
            Some(deadline) => deadline
                .saturating_duration_since(Instant::now())
                .max(Duration::from_millis(1)),
            None => DEFAULT_BUSY_TIMEOUT,
        };
        self.conn.busy_timeout(timeout)?;
        Ok(())
    }
}

/// Binds a value using SQLite's storage classes. Booleans become 0/1 and
/// nested JSON is stored as text.
struct SqliteParam<'a>(&'a SqlValue);

impl ToSql for SqliteParam<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self.0 {
            SqlValue::Null => ToSqlOutput::Owned(Value::Null),
            SqlValue::Bool(b) => ToSqlOutput::Owned(Value::Integer(i64::from(*b))),
            SqlValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    ToSqlOutput::Owned(Value::Integer(i))
                } else if n.is_u64() {
                    // Past i64::MAX; REAL would lose digits
                    ToSqlOutput::Owned(Value::Text(n.to_string()))
                } else {
                    ToSqlOutput::Owned(Value::Real(n.as_f64().unwrap_or(f64::NAN)))
                }
            }
            SqlValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            SqlValue::Json(v) => ToSqlOutput::Owned(Value::Text(v.to_string())),
        })
    }
}
