//! Descriptor documents and their canonical in-memory form.
//!
//! Source documents are duck-typed: `tables` may be keyed by table id or
//! be a list of records, and `columns` arrives as a name-keyed mapping, a
//! list of objects, or a bare list of names. Everything is normalized
//! here, at load time, into ordered-list descriptors with normalized
//! identifiers; downstream code never sees the raw shapes.

use serde_json::{Map, Value};

/// One dataset's curated metadata. Canonical and immutable after load.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetDescriptor {
    /// Normalized dataset identifier
    pub id: String,
    pub description: Option<String>,
    /// Tables in source (first-seen) order
    pub tables: Vec<TableDescriptor>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableDescriptor {
    /// Normalized table identifier
    pub id: String,
    pub description: Option<String>,
    pub row_count: Option<u64>,
    /// Columns in source order
    pub columns: Vec<ColumnDescriptor>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    pub name: String,
    /// Declared type string; empty when the source document had none
    pub dtype: String,
}

/// Dtypes that classify a column as numeric. Everything else is
/// categorical; the partition is strict.
const NUMERIC_DTYPES: &[&str] = &[
    "int64",
    "int32",
    "integer",
    "float64",
    "float32",
    "float",
    "numeric",
    "bignumeric",
    "decimal",
    "number",
];

impl ColumnDescriptor {
    /// Numeric iff the lower-cased dtype matches the closed vocabulary
    /// exactly.
    pub fn is_numeric(&self) -> bool {
        NUMERIC_DTYPES.contains(&self.dtype.to_lowercase().as_str())
    }
}

/// Case-fold an identifier and drop qualifier prefixes: only the final
/// dot-separated segment takes part in lookups.
pub(crate) fn normalize_identifier(value: &str) -> String {
    let cleaned = value.replace('`', "");
    cleaned
        .rsplit('.')
        .next()
        .unwrap_or(cleaned.as_str())
        .to_lowercase()
}

/// Convert one parsed document into a canonical descriptor.
/// `fallback_id` is the file-derived name used when the document does
/// not declare a dataset id.
pub(crate) fn from_document(document: &Value, fallback_id: &str) -> DatasetDescriptor {
    let empty = Map::new();
    let object = document.as_object().unwrap_or(&empty);
    let id = document
        .get("dataset")
        .and_then(Value::as_str)
        .or_else(|| document.get("dataset_id").and_then(Value::as_str))
        .unwrap_or(fallback_id);
    let tables = match document.get("tables") {
        Some(Value::Object(keyed)) => keyed
            .iter()
            .filter_map(|(name, info)| {
                info.as_object().map(|info| table_from_parts(name, info))
            })
            .collect(),
        Some(Value::Array(listed)) => listed
            .iter()
            .filter_map(|entry| {
                let info = entry.as_object()?;
                let name = text_field(info, &["table", "table_id", "name"])?;
                Some(table_from_parts(&name, info))
            })
            .collect(),
        _ => Vec::new(),
    };
    DatasetDescriptor {
        id: normalize_identifier(id),
        description: text_field(object, &["description", "summary"]),
        tables,
    }
}

fn table_from_parts(name: &str, info: &Map<String, Value>) -> TableDescriptor {
    let row_count = info
        .get("row_count")
        .and_then(Value::as_u64)
        .or_else(|| info.get("rows").and_then(Value::as_u64));
    TableDescriptor {
        id: normalize_identifier(name),
        description: text_field(info, &["description", "summary"]),
        row_count,
        columns: columns_from(info.get("columns")),
    }
}

fn columns_from(value: Option<&Value>) -> Vec<ColumnDescriptor> {
    match value {
        Some(Value::Object(keyed)) => keyed
            .iter()
            .map(|(name, meta)| ColumnDescriptor {
                name: name.clone(),
                dtype: dtype_of(meta),
            })
            .collect(),
        Some(Value::Array(listed)) => listed
            .iter()
            .filter_map(|entry| match entry {
                Value::Object(meta) => {
                    let name = text_field(meta, &["name", "column"])?;
                    Some(ColumnDescriptor {
                        name,
                        dtype: dtype_of(entry),
                    })
                }
                Value::String(name) => Some(ColumnDescriptor {
                    name: name.clone(),
                    dtype: String::new(),
                }),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn dtype_of(meta: &Value) -> String {
    ["type", "data_type"]
        .iter()
        .find_map(|key| meta.get(*key).and_then(Value::as_str))
        .unwrap_or("")
        .to_string()
}

fn text_field(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| object.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}
