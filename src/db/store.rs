//! Persistence seam used by the entity importers.
//!
//! Importers never talk to SQLite directly: they look rows up and write them
//! through [`Store`], which lets a run share one transaction across every
//! stage and lets tests substitute an in-memory fake.

use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, ffi, params, params_from_iter};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::snapshot::Table;

/// Failure of a single store operation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint rejected the row. The surrounding transaction is
    /// still usable.
    #[error("duplicate {table} entry: {detail}")]
    Duplicate { table: &'static str, detail: String },

    /// Any other constraint (NOT NULL, CHECK, trigger) rejected the row.
    #[error("{table} entry rejected: {detail}")]
    Constraint { table: &'static str, detail: String },

    #[error(transparent)]
    Sqlite(rusqlite::Error),
}

impl StoreError {
    fn from_sqlite(table: Table, err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, msg)
                if code.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                    || code.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
            {
                StoreError::Duplicate {
                    table: table.name(),
                    detail: msg.clone().unwrap_or_else(|| code.to_string()),
                }
            }
            rusqlite::Error::SqliteFailure(code, msg)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::Constraint {
                    table: table.name(),
                    detail: msg.clone().unwrap_or_else(|| code.to_string()),
                }
            }
            _ => StoreError::Sqlite(err),
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::Duplicate { .. })
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Sqlite(err)
    }
}

/// Natural-key lookup against a destination table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<'a> {
    /// Case-insensitive slug match.
    Slug(&'a str),
    /// Case-insensitive email match.
    Email(&'a str),
    Key(&'a str),
    Name(&'a str),
}

impl Lookup<'_> {
    fn clause(&self) -> (&'static str, Vec<SqlValue>) {
        match self {
            Lookup::Slug(s) => ("slug = ?1 COLLATE NOCASE", vec![text(s)]),
            Lookup::Email(s) => ("email = ?1 COLLATE NOCASE", vec![text(s)]),
            Lookup::Key(s) => ("key = ?1", vec![text(s)]),
            Lookup::Name(s) => ("name = ?1", vec![text(s)]),
        }
    }
}

fn text(s: &str) -> SqlValue {
    SqlValue::Text(s.to_string())
}

/// Ordered column/value list for one insert or update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewRow {
    columns: Vec<(&'static str, SqlValue)>,
}

impl NewRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column, replacing any earlier value for it.
    pub fn set(mut self, column: &'static str, value: impl Into<SqlValue>) -> Self {
        let value = value.into();
        match self.columns.iter_mut().find(|(c, _)| *c == column) {
            Some(slot) => slot.1 = value,
            None => self.columns.push((column, value)),
        }
        self
    }

    /// Set a column to `value` or SQL NULL.
    pub fn set_opt<V: Into<SqlValue>>(self, column: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(column, v),
            None => self.set(column, SqlValue::Null),
        }
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(c, _)| *c == column)
            .map(|(_, v)| v)
    }

    /// Text value of a column, if it is set to text.
    pub fn get_text(&self, column: &str) -> Option<&str> {
        match self.get(column)? {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// JSON rendering of the row as persisted.
    pub fn to_json(&self) -> Map<String, Value> {
        self.columns
            .iter()
            .map(|(column, value)| {
                let json = match value {
                    SqlValue::Null => Value::Null,
                    SqlValue::Integer(i) => Value::from(*i),
                    SqlValue::Real(f) => Value::from(*f),
                    SqlValue::Text(s) => Value::String(s.clone()),
                    SqlValue::Blob(b) => Value::from(b.len()),
                };
                (column.to_string(), json)
            })
            .collect()
    }
}

/// Lookups and writes against the destination.
pub trait Store {
    /// Id of the row of `table` matching `lookup`.
    fn find_existing(&self, table: Table, lookup: &Lookup<'_>) -> Result<Option<String>, StoreError>;

    /// Id of a user currently holding the named role.
    fn find_role_holder(&self, role: &str) -> Result<Option<String>, StoreError>;

    fn insert(&self, table: Table, row: &NewRow) -> Result<(), StoreError>;

    fn update(&self, table: Table, id: &str, row: &NewRow) -> Result<(), StoreError>;
}

/// [`Store`] over a borrowed SQLite connection or transaction.
pub struct SqliteStore<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

impl Store for SqliteStore<'_> {
    fn find_existing(&self, table: Table, lookup: &Lookup<'_>) -> Result<Option<String>, StoreError> {
        let (clause, values) = lookup.clause();
        let sql = format!("SELECT id FROM {} WHERE {} LIMIT 1", table.name(), clause);
        let id = self
            .conn
            .query_row(&sql, params_from_iter(values), |row| row.get::<_, String>(0))
            .optional()?;
        Ok(id)
    }

    fn find_role_holder(&self, role: &str) -> Result<Option<String>, StoreError> {
        let id = self
            .conn
            .query_row(
                "SELECT ru.user_id FROM roles_users ru
                 JOIN roles r ON r.id = ru.role_id
                 WHERE r.name = ?1
                 ORDER BY ru.rowid LIMIT 1",
                params![role],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(id)
    }

    fn insert(&self, table: Table, row: &NewRow) -> Result<(), StoreError> {
        if row.is_empty() {
            return Ok(());
        }
        let columns: Vec<&str> = row.columns.iter().map(|(c, _)| *c).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table.name(),
            columns.join(", "),
            placeholders.join(", ")
        );
        self.conn
            .execute(&sql, params_from_iter(row.columns.iter().map(|(_, v)| v)))
            .map_err(|e| StoreError::from_sqlite(table, e))?;
        Ok(())
    }

    fn update(&self, table: Table, id: &str, row: &NewRow) -> Result<(), StoreError> {
        if row.is_empty() {
            return Ok(());
        }
        let assignments: Vec<String> = row
            .columns
            .iter()
            .enumerate()
            .map(|(i, (c, _))| format!("{} = ?{}", c, i + 1))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?{}",
            table.name(),
            assignments.join(", "),
            row.columns.len() + 1
        );
        let values = row
            .columns
            .iter()
            .map(|(_, v)| v.clone())
            .chain(std::iter::once(text(id)));
        self.conn
            .execute(&sql, params_from_iter(values))
            .map_err(|e| StoreError::from_sqlite(table, e))?;
        Ok(())
    }
}

/// New destination object id: 24 lowercase hex characters.
pub fn new_object_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(24);
    id
}

/// Fresh RFC 4122 uuid for a content row.
pub fn new_uuid() -> String {
    Uuid::new_v4().to_string()
}
