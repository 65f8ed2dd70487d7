//! In-memory model of a blog content export.
//!
//! A snapshot is the denormalized dump produced by the export side: a
//! `meta` block plus a mapping from table name to an ordered list of loosely
//! typed rows. Rows stay as raw JSON until they have passed validation, at
//! which point they are parsed into the typed [`record::Record`] union.

pub mod record;
pub mod table;
pub mod value;

pub use record::{
    Dataset, PostRecord, PostTagRecord, Record, RoleRecord, RoleUserRecord, SettingRecord,
    SubscriberRecord, TagRecord, UserRecord,
};
pub use table::Table;
pub use value::{Flag, LocalId, Timestamp};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// Snapshot metadata block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    /// Export format version, e.g. `"003"` or `"1.0.0"`.
    #[serde(default)]
    pub version: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported_on: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SnapshotMeta {
    /// The version rendered as text, `None` when missing or blank.
    pub fn version_text(&self) -> Option<String> {
        match self.version.as_ref()? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// A content export snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub meta: SnapshotMeta,

    /// Rows keyed by table name, in export order.
    #[serde(default)]
    pub data: BTreeMap<String, Vec<Value>>,
}

impl Snapshot {
    /// Create an empty snapshot with the given format version.
    pub fn new(version: &str) -> Self {
        Self {
            meta: SnapshotMeta {
                version: Some(Value::String(version.to_string())),
                ..SnapshotMeta::default()
            },
            data: BTreeMap::new(),
        }
    }

    /// Builder used by tests and fixtures.
    pub fn with_table(mut self, table: &str, rows: Vec<Value>) -> Self {
        self.data.insert(table.to_string(), rows);
        self
    }

    /// Parse a snapshot from a JSON value.
    ///
    /// Accepts the bare `{meta, data}` shape as well as the older wrapper
    /// `{"db": [{meta, data}]}`.
    pub fn from_value(value: Value) -> Result<Self> {
        let inner = match value {
            Value::Object(mut obj) if obj.contains_key("db") && !obj.contains_key("data") => {
                match obj.remove("db") {
                    Some(Value::Array(mut items)) if !items.is_empty() => items.swap_remove(0),
                    _ => anyhow::bail!("snapshot `db` wrapper must be a non-empty array"),
                }
            }
            other => other,
        };
        let snapshot: Snapshot =
            serde_json::from_value(inner).context("snapshot does not match {meta, data} shape")?;
        Ok(snapshot)
    }

    /// Load a snapshot from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json).context("snapshot is not valid JSON")?;
        Self::from_value(value)
    }

    /// Load a snapshot from a file (plain JSON or gzip).
    pub fn from_file(path: &Path) -> Result<Self> {
        use std::fs::File;
        use std::io::{BufReader, Read};

        let mut bytes = Vec::new();
        File::open(path)
            .with_context(|| format!("open snapshot {}", path.display()))?
            .read_to_end(&mut bytes)
            .with_context(|| format!("read snapshot {}", path.display()))?;

        let value: Value = if bytes.starts_with(&[0x1f, 0x8b]) {
            let decoder = flate2::read::GzDecoder::new(BufReader::new(bytes.as_slice()));
            serde_json::from_reader(decoder)
                .with_context(|| format!("decode gzip snapshot {}", path.display()))?
        } else {
            serde_json::from_slice(&bytes)
                .with_context(|| format!("parse snapshot {}", path.display()))?
        };
        Self::from_value(value)
    }

    /// Serialize to JSON with pretty formatting.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Rows of a known table; empty when the export omits it.
    pub fn rows(&self, table: Table) -> &[Value] {
        self.data.get(table.name()).map_or(&[], |rows| rows.as_slice())
    }

    /// Mutable rows of a known table, if present.
    pub fn rows_mut(&mut self, table: Table) -> Option<&mut Vec<Value>> {
        self.data.get_mut(table.name())
    }

    /// Tables present in the export that this importer does not handle.
    pub fn unknown_tables(&self) -> Vec<&str> {
        self.data
            .keys()
            .map(|s| s.as_str())
            .filter(|name| Table::from_name(name).is_none())
            .collect()
    }
}
