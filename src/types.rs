use crate::error::ImportError;
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use serde_json::{Map, Number, Value};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// One JSON object from the input array - becomes one row in the target table
///
/// Keys keep the order they had in the source document, so the column list
/// derived from a record is stable across builds.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Column names in source order
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.get(column)
    }

    /// Split into parallel column and value lists
    pub fn into_parts(self) -> (Vec<String>, Vec<SqlValue>) {
        self.fields
            .into_iter()
            .map(|(column, value)| (column, SqlValue::from(value)))
            .unzip()
    }

    pub(crate) fn into_values(self) -> Vec<SqlValue> {
        self.fields.into_iter().map(|(_, value)| SqlValue::from(value)).collect()
    }
}

impl TryFrom<Value> for Record {
    type Error = ImportError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(fields) => Ok(Record { fields }),
            other => Err(ImportError::parse(format!(
                "expected a JSON object, found {}",
                json_kind(&other)
            ))),
        }
    }
}

// Deserializing through a visitor (rather than into a Map directly) lets us
// reject repeated keys, which serde_json would otherwise resolve last-wins.
impl<'de> Deserialize<'de> for Record {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct RecordVisitor;

        impl<'de> Visitor<'de> for RecordVisitor {
            type Value = Record;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a JSON object")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Record, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut fields = Map::new();
                while let Some((key, value)) = access.next_entry::<String, Value>()? {
                    if fields.contains_key(&key) {
                        return Err(de::Error::custom(format!("duplicate column `{}`", key)));
                    }
                    fields.insert(key, value);
                }
                Ok(Record { fields })
            }
        }

        deserializer.deserialize_map(RecordVisitor)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// A value ready to be bound to a statement parameter
///
/// Arrays and objects are not interpreted; they travel as `Json` and are
/// bound as their JSON text.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Number(Number),
    Text(String),
    Json(Value),
}

impl SqlValue {
    /// Textual form used by text-format parameter encodings; `None` for NULL
    pub fn to_text(&self) -> Option<Cow<'_, str>> {
        match self {
            SqlValue::Null => None,
            SqlValue::Bool(b) => Some(Cow::Borrowed(if *b { "true" } else { "false" })),
            SqlValue::Number(n) => Some(Cow::Owned(n.to_string())),
            SqlValue::Text(s) => Some(Cow::Borrowed(s)),
            SqlValue::Json(v) => Some(Cow::Owned(v.to_string())),
        }
    }
}

impl From<Value> for SqlValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => SqlValue::Null,
            Value::Bool(b) => SqlValue::Bool(b),
            Value::Number(n) => SqlValue::Number(n),
            Value::String(s) => SqlValue::Text(s),
            nested @ (Value::Array(_) | Value::Object(_)) => SqlValue::Json(nested),
        }
    }
}

/// The destination table, optionally schema-qualified
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImportTarget {
    schema: Option<String>,
    table: String,
}

impl ImportTarget {
    pub fn new(table: impl Into<String>) -> Result<Self, ImportError> {
        let table = table.into();
        check_name("table", &table)?;
        Ok(ImportTarget { schema: None, table })
    }

    pub fn with_schema(
        schema: impl Into<String>,
        table: impl Into<String>,
    ) -> Result<Self, ImportError> {
        let schema = schema.into();
        check_name("schema", &schema)?;
        let mut target = Self::new(table)?;
        target.schema = Some(schema);
        Ok(target)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    /// The identifier as it appears in generated SQL, e.g. `"public"."users"`
    pub fn quoted(&self) -> String {
        use crate::statement::quote_identifier;

        match &self.schema {
            Some(schema) => format!("{}.{}", quote_identifier(schema), quote_identifier(&self.table)),
            None => quote_identifier(&self.table),
        }
    }
}

fn check_name(kind: &str, name: &str) -> Result<(), ImportError> {
    if name.is_empty() {
        return Err(ImportError::InvalidTarget(format!("{} name is empty", kind)));
    }
    if name.contains('\0') {
        return Err(ImportError::InvalidTarget(format!(
            "{} name {:?} contains a NUL character",
            kind, name
        )));
    }
    Ok(())
}

/// Parses `table` or `schema.table`. Only the first dot separates the schema.
impl FromStr for ImportTarget {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((schema, table)) => Self::with_schema(schema, table),
            None => Self::new(s),
        }
    }
}

impl fmt::Display for ImportTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.table),
            None => f.write_str(&self.table),
        }
    }
}

/// How the input file is turned into records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStrategy {
    /// Read and parse the whole file before the first insert
    Eager,
    /// Parse one array element at a time
    Streaming,
}

/// Configuration for an import run
#[derive(Debug, Clone)]
pub struct ImportConfig {
    pub strategy: SourceStrategy,

    /// Records per INSERT statement (1 = one statement per record)
    pub batch_size: usize,

    /// Parse on a separate thread while the previous rows are inserted
    pub pipeline: bool,

    /// Records the parser may run ahead of the importer in pipeline mode
    pub channel_capacity: usize,

    /// Upper bound on how long the transaction may stay open
    pub max_duration: Option<Duration>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        ImportConfig {
            strategy: SourceStrategy::Streaming,
            batch_size: 1,
            pipeline: false,
            channel_capacity: 1024,
            max_duration: None,
        }
    }
}

/// Terminal status of a run
#[derive(Debug)]
pub enum ImportStatus {
    Success,
    Failed(ImportError),
}

/// Outcome of one import run
#[derive(Debug)]
pub struct ImportResult {
    /// Target table as the caller named it
    pub table: String,

    /// Rows committed; always 0 on failure
    pub rows: usize,

    pub status: ImportStatus,
}

impl ImportResult {
    pub fn success(table: impl Into<String>, rows: usize) -> Self {
        ImportResult {
            table: table.into(),
            rows,
            status: ImportStatus::Success,
        }
    }

    pub fn failure(table: impl Into<String>, error: ImportError) -> Self {
        ImportResult {
            table: table.into(),
            rows: 0,
            status: ImportStatus::Failed(error),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, ImportStatus::Success)
    }

    pub fn error(&self) -> Option<&ImportError> {
        match &self.status {
            ImportStatus::Success => None,
            ImportStatus::Failed(err) => Some(err),
        }
    }

    pub fn into_result(self) -> Result<usize, ImportError> {
        match self.status {
            ImportStatus::Success => Ok(self.rows),
            ImportStatus::Failed(err) => Err(err),
        }
    }
}
