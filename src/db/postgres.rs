use super::{Connection, DbError, Dialect};
use crate::types::SqlValue;
use bytes::BytesMut;
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;
use tokio_postgres::types::{to_sql_checked, Format, IsNull, ToSql, Type};
use tokio_postgres::{Client, NoTls};

// Sessions abandoned mid-transaction are terminated by the server after this.
const IDLE_IN_TRANSACTION_TIMEOUT: &str = "5min";

/// PostgreSQL backend
///
/// tokio-postgres is async; this wrapper owns a single-threaded runtime and
/// blocks on each call, which also drives the spawned connection task.
pub struct PostgresConnection {
    runtime: Runtime,
    client: Client,
    deadline: Option<Instant>,
}

impl PostgresConnection {
    pub fn connect(url: &str) -> Result<Self, DbError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let (client, connection) = runtime.block_on(tokio_postgres::connect(url, NoTls))?;
        runtime.spawn(async move {
            if let Err(e) = connection.await {
                log::error!("postgres connection closed: {}", e);
            }
        });

        let session = format!(
            "SET client_min_messages TO WARNING; \
             SET idle_in_transaction_session_timeout TO '{}'",
            IDLE_IN_TRANSACTION_TIMEOUT
        );
        runtime.block_on(client.batch_execute(&session))?;

        Ok(PostgresConnection {
            runtime,
            client,
            deadline: None,
        })
    }

    /// Let the server cancel the next statement once the deadline passes.
    /// A statement stuck on a lock would otherwise block indefinitely.
    fn bound_next_statement(&mut self) -> Result<(), DbError> {
        if let Some(deadline) = self.deadline {
            let sql = statement_timeout_sql(deadline.saturating_duration_since(Instant::now()));
            self.runtime.block_on(self.client.batch_execute(&sql))?;
        }
        Ok(())
    }
}

// Scoped to the current transaction; 0 would mean "no limit"
fn statement_timeout_sql(remaining: Duration) -> String {
    format!(
        "SET LOCAL statement_timeout = {}",
        remaining.as_millis().max(1)
    )
}

impl Connection for PostgresConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn begin(&mut self) -> Result<(), DbError> {
        self.runtime.block_on(self.client.batch_execute("BEGIN"))?;
        Ok(())
    }

    fn execute(&mut self, sql: &str, params: &[&SqlValue]) -> Result<u64, DbError> {
        self.bound_next_statement()?;
        let params: Vec<PgParam<'_>> = params.iter().map(|value| PgParam(*value)).collect();
        let refs: Vec<&(dyn ToSql + Sync)> = params
            .iter()
            .map(|param| param as &(dyn ToSql + Sync))
            .collect();
        Ok(self.runtime.block_on(self.client.execute(sql, &refs))?)
    }

    fn commit(&mut self) -> Result<(), DbError> {
        self.bound_next_statement()?;
        self.runtime.block_on(self.client.batch_execute("COMMIT"))?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DbError> {
        self.runtime.block_on(self.client.batch_execute("ROLLBACK"))?;
        Ok(())
    }

    fn set_deadline(&mut self, deadline: Option<Instant>) -> Result<(), DbError> {
        self.deadline = deadline;
        Ok(())
    }
}

/// Sends every value in the text wire format and lets the server convert it
/// to whatever type it inferred for the parameter, the same way untyped
/// literals are handled.
#[derive(Debug)]
struct PgParam<'a>(&'a SqlValue);

impl ToSql for PgParam<'_> {
    fn to_sql(
        &self,
        _ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self.0.to_text() {
            None => Ok(IsNull::Yes),
            Some(text) => {
                out.extend_from_slice(text.as_bytes());
                Ok(IsNull::No)
            }
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    fn encode_format(&self, _ty: &Type) -> Format {
        Format::Text
    }

    to_sql_checked!();
}
