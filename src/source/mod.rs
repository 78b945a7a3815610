//! Row sources - turn a JSON array file into an ordered sequence of records
//!
//! Two strategies are available:
//!
//! - **Eager** ([`eager`]): read the whole file and parse it in one pass with
//!   simd-json. Malformed input is reported before a single record is handed
//!   out, at the cost of holding the whole document in memory.
//! - **Streaming** ([`stream`]): parse one array element at a time from a
//!   buffered reader. Memory stays bounded by the largest record, but a
//!   malformed element is only discovered when the parser reaches it.
//!
//! Both yield records in array order, and a [`pipeline`] can move either one
//! onto a producer thread.

pub mod eager;
pub mod pipeline;
pub mod stream;

pub use pipeline::Pipeline;
pub use stream::JsonArrayStream;

use crate::error::ImportError;
use crate::types::{Record, SourceStrategy};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// A finite, non-restartable sequence of records
pub type Records = Box<dyn Iterator<Item = Result<Record, ImportError>> + Send>;

/// Open `path` with the given strategy
///
/// Fails with [`ImportError::FileRead`] if the file cannot be opened. The
/// eager strategy also fails here with [`ImportError::Parse`] on malformed
/// input. The streaming strategy only checks that the input opens an array;
/// later errors come through the iterator.
pub fn open(path: &Path, strategy: SourceStrategy) -> Result<Records, ImportError> {
    match strategy {
        SourceStrategy::Eager => {
            let records = eager::load(path)?;
            log::debug!("loaded {} records from {}", records.len(), path.display());
            Ok(Box::new(records.into_iter().map(Ok)))
        }
        SourceStrategy::Streaming => {
            let file = File::open(path).map_err(|source| ImportError::FileRead {
                path: path.to_path_buf(),
                source,
            })?;
            let mut stream = JsonArrayStream::new(BufReader::new(file)).with_origin(path);
            stream.start()?;
            Ok(Box::new(stream))
        }
    }
}
