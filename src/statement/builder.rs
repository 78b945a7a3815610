use super::quote::{check_column, quote_identifier};
use crate::db::Dialect;
use crate::error::ImportError;
use crate::types::{ImportTarget, Record, SqlValue};

/// A parameterized INSERT for one or more rows sharing the same columns
///
/// Every row holds exactly one value per column, in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    table: String,
    columns: Vec<String>,
    rows: Vec<Vec<SqlValue>>,
}

/// Build the INSERT for a single record
///
/// Columns are the record's keys in source order. Whether they exist in the
/// table is left to the database.
pub fn build(target: &ImportTarget, record: Record) -> Result<InsertStatement, ImportError> {
    if record.is_empty() {
        return Err(ImportError::SchemaMismatch(
            "record has no columns to insert".to_string(),
        ));
    }

    let (columns, values) = record.into_parts();
    for column in &columns {
        check_column(column).map_err(ImportError::SchemaMismatch)?;
    }

    Ok(InsertStatement {
        table: target.quoted(),
        columns,
        rows: vec![values],
    })
}

impl InsertStatement {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn param_count(&self) -> usize {
        self.rows.len() * self.columns.len()
    }

    /// True if the record has exactly this statement's columns, in order
    pub fn matches(&self, record: &Record) -> bool {
        record.len() == self.columns.len()
            && record
                .columns()
                .zip(&self.columns)
                .all(|(have, want)| have == want)
    }

    /// Append a record as another row of a multi-row insert
    pub fn push_record(&mut self, record: Record) -> Result<(), ImportError> {
        if !self.matches(&record) {
            return Err(ImportError::SchemaMismatch(format!(
                "record columns ({}) differ from statement columns ({})",
                record.columns().collect::<Vec<_>>().join(", "),
                self.columns.join(", ")
            )));
        }
        self.push_row(record.into_values())
    }

    pub fn push_row(&mut self, values: Vec<SqlValue>) -> Result<(), ImportError> {
        if values.len() != self.columns.len() {
            return Err(ImportError::SchemaMismatch(format!(
                "row has {} values for {} columns",
                values.len(),
                self.columns.len()
            )));
        }
        self.rows.push(values);
        Ok(())
    }

    /// Render the statement text with the dialect's placeholders
    pub fn sql(&self, dialect: Dialect) -> String {
        let width = self.columns.len();
        let columns = self
            .columns
            .iter()
            .map(|c| quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");
        let rows = (0..self.rows.len())
            .map(|row| {
                let placeholders = (1..=width)
                    .map(|i| dialect.placeholder(row * width + i))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("({})", placeholders)
            })
            .collect::<Vec<_>>()
            .join(", ");

        format!("INSERT INTO {} ({}) VALUES {}", self.table, columns, rows)
    }

    /// Bound values in placeholder order
    pub fn params(&self) -> Vec<&SqlValue> {
        self.rows.iter().flatten().collect()
    }
}
