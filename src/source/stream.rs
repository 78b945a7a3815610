use crate::error::ImportError;
use crate::types::Record;
use serde::Deserialize;
use std::io::BufRead;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Before the opening `[`
    Start,
    /// After `[`, expecting a record or `]`
    First,
    /// After a record, expecting `,` or `]`
    Rest,
    /// After `]`, only whitespace may follow
    Trailer,
    Done,
}

// JSON allows exactly these four; `is_ascii_whitespace` would also take form feed
fn is_json_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}

/// Incremental reader for a top-level JSON array of objects
///
/// The array punctuation is scanned by hand; each element is handed to
/// serde_json, which stops right after the closing `}` of the object, so
/// only one record is ever held in memory. The iterator is fused after the
/// first error.
pub struct JsonArrayStream<R> {
    reader: R,
    state: State,
    index: usize,
    origin: PathBuf,
}

impl<R: BufRead> JsonArrayStream<R> {
    pub fn new(reader: R) -> Self {
        JsonArrayStream {
            reader,
            state: State::Start,
            index: 0,
            origin: PathBuf::from("<input>"),
        }
    }

    /// Name the input in read errors
    pub fn with_origin(mut self, path: &Path) -> Self {
        self.origin = path.to_path_buf();
        self
    }

    /// Number of records yielded so far
    pub fn position(&self) -> usize {
        self.index
    }

    /// Skip whitespace and return the next byte without consuming it
    fn peek_byte(&mut self) -> Result<Option<u8>, ImportError> {
        loop {
            let buf = match self.reader.fill_buf() {
                Ok(buf) => buf,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(source) => {
                    return Err(ImportError::FileRead {
                        path: self.origin.clone(),
                        source,
                    })
                }
            };
            if buf.is_empty() {
                return Ok(None);
            }
            match buf.iter().position(|b| !is_json_whitespace(*b)) {
                Some(skip) => {
                    let byte = buf[skip];
                    self.reader.consume(skip);
                    return Ok(Some(byte));
                }
                None => {
                    let len = buf.len();
                    self.reader.consume(len);
                }
            }
        }
    }

    /// Consume the opening `[`
    ///
    /// Called implicitly by the first `next()`; calling it up front makes
    /// input that is not an array fail before any record is requested.
    pub fn start(&mut self) -> Result<(), ImportError> {
        if self.state != State::Start {
            return Ok(());
        }
        match self.peek_byte()? {
            Some(b'[') => {
                self.reader.consume(1);
                self.state = State::First;
                Ok(())
            }
            Some(_) => Err(ImportError::parse("expected a JSON array of objects")),
            None => Err(ImportError::parse("input is empty")),
        }
    }

    fn read_record(&mut self) -> Result<Record, ImportError> {
        let mut de = serde_json::Deserializer::from_reader(&mut self.reader);
        let record = Record::deserialize(&mut de)
            .map_err(|e| ImportError::parse(format!("record {}: {}", self.index, e)))?;
        self.index += 1;
        self.state = State::Rest;
        Ok(record)
    }

    fn next_record(&mut self) -> Result<Option<Record>, ImportError> {
        loop {
            match self.state {
                State::Start => self.start()?,
                State::First => match self.peek_byte()? {
                    Some(b']') => {
                        self.reader.consume(1);
                        self.state = State::Trailer;
                    }
                    Some(_) => return self.read_record().map(Some),
                    None => return Err(ImportError::parse("unterminated array")),
                },
                State::Rest => match self.peek_byte()? {
                    Some(b',') => {
                        self.reader.consume(1);
                        return self.read_record().map(Some);
                    }
                    Some(b']') => {
                        self.reader.consume(1);
                        self.state = State::Trailer;
                    }
                    Some(other) => {
                        return Err(ImportError::parse(format!(
                            "expected `,` or `]` after record {}, found `{}`",
                            self.index - 1,
                            other as char
                        )))
                    }
                    None => return Err(ImportError::parse("unterminated array")),
                },
                State::Trailer => match self.peek_byte()? {
                    None => {
                        self.state = State::Done;
                        return Ok(None);
                    }
                    Some(_) => {
                        return Err(ImportError::parse("trailing characters after the array"))
                    }
                },
                State::Done => return Ok(None),
            }
        }
    }
}

impl<R: BufRead> Iterator for JsonArrayStream<R> {
    type Item = Result<Record, ImportError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => {
                self.state = State::Done;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufReader, Cursor};

    fn stream(input: &str) -> JsonArrayStream<Cursor<Vec<u8>>> {
        JsonArrayStream::new(Cursor::new(input.as_bytes().to_vec()))
    }

    fn ids(input: &str) -> Vec<u64> {
        stream(input)
            .map(|r| r.unwrap().get("id").unwrap().as_u64().unwrap())
            .collect()
    }

    #[test]
    fn test_yields_records_in_order() {
        assert_eq!(ids(r#"[{"id": 1}, {"id": 2}, {"id": 3}]"#), vec![1, 2, 3]);
    }

    #[test]
    fn test_empty_array() {
        assert!(ids(" [ ] \n").is_empty());
    }

    #[test]
    fn test_tiny_buffer() {
        let input = "\n[\n  {\"id\": 1, \"tags\": [\"x\", \"]\"]},\n  {\"id\": 2}\n]\n";
        let reader = BufReader::with_capacity(1, input.as_bytes());
        let records: Vec<Record> = JsonArrayStream::new(reader).map(Result::unwrap).collect();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("tags").unwrap()[1], "]");
    }

    #[test]
    fn test_not_an_array() {
        let mut s = stream(r#"{"id": 1}"#);
        assert!(matches!(s.next(), Some(Err(ImportError::Parse(_)))));
        assert!(s.next().is_none());
    }

    #[test]
    fn test_form_feed_is_not_whitespace() {
        let mut s = stream("\x0C[{\"id\": 1}]");
        assert!(matches!(s.next(), Some(Err(ImportError::Parse(_)))));
        assert!(s.next().is_none());

        let mut s = stream("[{\"id\": 1}\x0C]");
        assert!(s.next().unwrap().is_ok());
        assert!(s.next().unwrap().is_err());
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(stream("  ").next(), Some(Err(ImportError::Parse(_)))));
    }

    #[test]
    fn test_bad_element_after_good_ones() {
        let mut s = stream(r#"[{"id": 1}, {"id": 2}, 3, {"id": 4}]"#);

        assert!(s.next().unwrap().is_ok());
        assert!(s.next().unwrap().is_ok());
        assert_eq!(s.position(), 2);
        assert!(matches!(s.next(), Some(Err(ImportError::Parse(_)))));
        assert!(s.next().is_none());
    }

    #[test]
    fn test_missing_separator() {
        let mut s = stream(r#"[{"id": 1} {"id": 2}]"#);
        assert!(s.next().unwrap().is_ok());
        assert!(s.next().unwrap().is_err());
    }

    #[test]
    fn test_trailing_comma() {
        let mut s = stream(r#"[{"id": 1},]"#);
        assert!(s.next().unwrap().is_ok());
        assert!(s.next().unwrap().is_err());
    }

    #[test]
    fn test_trailing_garbage() {
        let mut s = stream(r#"[{"id": 1}] x"#);
        assert!(s.next().unwrap().is_ok());
        assert!(s.next().unwrap().is_err());
    }

    #[test]
    fn test_unterminated() {
        let mut s = stream(r#"[{"id": 1}"#);
        assert!(s.next().unwrap().is_ok());
        assert!(s.next().unwrap().is_err());
    }
}
