//! Transactional import
//!
//! [`Importer`] drives the run: it opens an [`ImportTransaction`], turns each
//! record into an INSERT (optionally batching records with identical columns
//! into one multi-row statement), and ends the transaction exactly once -
//! COMMIT if every statement succeeded, ROLLBACK otherwise.

pub mod importer;
pub mod transaction;

pub use importer::Importer;
pub use transaction::{ImportTransaction, TransactionState};
