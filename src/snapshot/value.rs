//! Lenient scalar types for export rows.
//!
//! Exports from different versions disagree on how ids, timestamps and flags
//! are encoded. These newtypes accept every encoding seen in the wild and
//! normalize it once at the edge.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Identifier local to one snapshot. Numbers and strings are both accepted
/// and compared by their string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalId(String);

impl LocalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Read an id from a raw JSON value. Blank strings are not ids.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.trim().is_empty() => Some(Self(s.trim().to_string())),
            Value::Number(n) => Some(Self(n.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for LocalId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for LocalId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct LocalIdVisitor;

        impl Visitor<'_> for LocalIdVisitor {
            type Value = LocalId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string or integer identifier")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<LocalId, E> {
                Ok(LocalId(v.trim().to_string()))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<LocalId, E> {
                Ok(LocalId(v.to_string()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<LocalId, E> {
                Ok(LocalId(v.to_string()))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<LocalId, E> {
                if v.fract() == 0.0 {
                    Ok(LocalId((v as i64).to_string()))
                } else {
                    Err(E::custom(format!("non-integral identifier {}", v)))
                }
            }
        }

        deserializer.deserialize_any(LocalIdVisitor)
    }
}

/// `deserialize_with` helper for optional id columns: a blank string reads as
/// no id, the same as [`LocalId::from_value`].
pub fn optional_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<LocalId>, D::Error> {
    let id = Option::<LocalId>::deserialize(deserializer)?;
    Ok(id.filter(|id| !id.0.is_empty()))
}

/// Point in time stored as Unix milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn millis(self) -> i64 {
        self.0
    }

    /// Parse a raw JSON timestamp: epoch milliseconds (number or numeric
    /// string), RFC 3339, `YYYY-MM-DD HH:MM:SS`, or a bare date.
    pub fn parse(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .map(Self),
            Value::String(s) => Self::parse_str(s.trim()),
            _ => None,
        }
    }

    fn parse_str(s: &str) -> Option<Self> {
        if s.is_empty() {
            return None;
        }
        if let Ok(ms) = s.parse::<i64>() {
            return Some(Self(ms));
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(Self(dt.timestamp_millis()));
        }
        for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
                return Some(Self(naive.and_utc().timestamp_millis()));
            }
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| Self(naive.and_utc().timestamp_millis()))
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp_millis())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.0)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Timestamp::parse(&raw)
            .ok_or_else(|| de::Error::custom(format!("unrecognized timestamp {}", raw)))
    }
}

/// Boolean flag. Accepts `true`/`false`, `0`/`1` and their string forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flag(pub bool);

impl Flag {
    pub fn parse(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Self(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(0) => Some(Self(false)),
                Some(1) => Some(Self(true)),
                _ => None,
            },
            Value::String(s) => match s.trim() {
                "true" | "1" => Some(Self(true)),
                "false" | "0" => Some(Self(false)),
                _ => None,
            },
            _ => None,
        }
    }
}

impl Serialize for Flag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bool(self.0)
    }
}

impl<'de> Deserialize<'de> for Flag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Flag::parse(&raw).ok_or_else(|| de::Error::custom(format!("unrecognized flag {}", raw)))
    }
}

/// True when a raw field is absent, null, or a whitespace-only string.
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        _ => false,
    }
}

/// String field of a raw row, if present and a string.
pub fn text<'a>(row: &'a Value, column: &str) -> Option<&'a str> {
    row.get(column).and_then(Value::as_str)
}
