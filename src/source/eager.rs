use crate::error::ImportError;
use crate::types::Record;
use std::path::Path;

/// Read the whole file and parse it as an array of records
pub fn load(path: &Path) -> Result<Vec<Record>, ImportError> {
    let mut content = std::fs::read(path).map_err(|source| ImportError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&mut content)
}

/// Parse a JSON array of objects held in memory
///
/// simd-json parses in place, so the buffer is clobbered.
pub fn parse(content: &mut [u8]) -> Result<Vec<Record>, ImportError> {
    simd_json::serde::from_slice::<Vec<Record>>(content)
        .map_err(|e| ImportError::parse(e.to_string()))
}
