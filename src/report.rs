use crate::types::{ImportResult, ImportStatus};

/// Summarize an import outcome for the user
pub fn report(result: &ImportResult) -> String {
    match &result.status {
        ImportStatus::Success => format!(
            "{} rows imported into the table {}.",
            result.rows, result.table
        ),
        ImportStatus::Failed(error) => format!(
            "There was an error importing into {}. The transaction was reversed. Details: \n\n{}",
            result.table, error
        ),
    }
}
