//! INSERT statement generation
//!
//! Identifiers are always double-quoted and values are always bound as
//! parameters, so no part of a record ever reaches the SQL text unescaped.

pub mod builder;
pub mod quote;

pub use builder::{build, InsertStatement};
pub use quote::quote_identifier;
