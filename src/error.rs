//! Error and diagnostic types produced by an import run.
//!
//! Two disjoint classes:
//! - [`ValidationError`]: fatal, collected exhaustively, aborts the whole run.
//! - [`Problem`]: non-fatal, recorded in arrival order, returned next to the
//!   imported data.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::db::StoreError;

/// Discriminator carried by every fatal field-level error on the wire.
pub const VALIDATION_ERROR_TYPE: &str = "ValidationError";

/// Fatal field-level violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    pub message: String,
    pub error_type: String,
    pub table: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    /// Position of the offending record in its table, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

impl ValidationError {
    pub fn new(table: &str, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_type: VALIDATION_ERROR_TYPE.to_string(),
            table: table.to_string(),
            column: None,
            index: None,
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn at_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    pub fn blank(table: &str, column: &str) -> Self {
        Self::new(
            table,
            format!("Value in [{}.{}] cannot be blank.", table, column),
        )
        .with_column(column)
    }

    pub fn too_long(table: &str, column: &str, max: usize) -> Self {
        Self::new(
            table,
            format!(
                "Value in [{}.{}] exceeds maximum length of {} characters.",
                table, column, max
            ),
        )
        .with_column(column)
    }

    /// `expected` carries its article, e.g. `"an integer"`.
    pub fn wrong_type(table: &str, column: &str, expected: &str) -> Self {
        Self::new(
            table,
            format!("Value in [{}.{}] must be {}.", table, column, expected),
        )
        .with_column(column)
    }

    pub fn not_allowed(table: &str, column: &str, allowed: &[&str]) -> Self {
        Self::new(
            table,
            format!(
                "Value in [{}.{}] must be one of: {}.",
                table,
                column,
                allowed.join(", ")
            ),
        )
        .with_column(column)
    }

    pub fn not_an_object(table: &str) -> Self {
        Self::new(table, format!("Entry in [{}] is not an object.", table))
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Non-fatal anomaly surfaced to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    pub message: String,
    /// Entity label, e.g. `"Tag"` or `"Post"`.
    pub help: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl Problem {
    pub fn new(help: &str, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            help: help.to_string(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Entry skipped because an equivalent one already exists.
    pub fn duplicate(help: &str) -> Self {
        Self::new(
            help,
            "Entry was not imported and ignored. Detected duplicated entry.",
        )
    }

    /// Entry persisted, but one of its user references could not be re-pointed.
    pub fn unresolved_user_ref(help: &str, field: &str) -> Self {
        Self::new(
            help,
            format!(
                "Entry was imported, but we were not able to update user reference field: {}",
                field
            ),
        )
    }

    /// Entry dropped because a required reference could not be re-pointed.
    pub fn unresolved_ref(help: &str, field: &str) -> Self {
        Self::new(
            help,
            format!(
                "Entry was not imported. Could not resolve reference field: {}",
                field
            ),
        )
    }

    pub fn uuid_replaced(help: &str) -> Self {
        Self::new(help, "Entry was imported, but its invalid uuid was replaced.")
    }

    /// Role association named a role the destination does not know.
    pub fn unknown_role(fallback: &str) -> Self {
        Self::new(
            "User",
            format!(
                "Entry was imported, but its role could not be found. Assigned role: {}",
                fallback
            ),
        )
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.help, self.message)
    }
}

/// Fatal outcome of an import run. Nothing is persisted when this is returned.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("import rejected with {} validation error(s)", .0.len())]
    Validation(Vec<ValidationError>),

    #[error("stage {stage} requires {missing} to be imported first")]
    StageOrder {
        stage: &'static str,
        missing: &'static str,
    },

    #[error("no user with email {0} exists in the destination")]
    UnknownActingUser(String),

    #[error("destination has no owner account; run `blog-import setup` first")]
    NoOwner,

    #[error("role {0} does not exist in the destination")]
    MissingRole(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl ImportError {
    /// The validation errors, when this failure is a rejected snapshot.
    pub fn validation_errors(&self) -> Option<&[ValidationError]> {
        match self {
            ImportError::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_message() {
        let err = ValidationError::blank("settings", "key");
        assert_eq!(err.message, "Value in [settings.key] cannot be blank.");
        assert_eq!(err.error_type, "ValidationError");
        assert_eq!(err.column.as_deref(), Some("key"));
    }

    #[test]
    fn test_too_long_message() {
        let err = ValidationError::too_long("posts", "title", 2000);
        assert_eq!(
            err.message,
            "Value in [posts.title] exceeds maximum length of 2000 characters."
        );
    }

    #[test]
    fn test_validation_error_serializes_error_type() {
        let err = ValidationError::blank("tags", "name").at_index(3);
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["errorType"], "ValidationError");
        assert_eq!(json["index"], 3);
    }

    #[test]
    fn test_problem_messages() {
        let p = Problem::unresolved_user_ref("Post", "published_by");
        assert_eq!(
            p.message,
            "Entry was imported, but we were not able to update user reference field: published_by"
        );
        assert_eq!(p.help, "Post");

        let dup = Problem::duplicate("Tag").with_context("{\"slug\":\"a\"}");
        assert_eq!(
            dup.message,
            "Entry was not imported and ignored. Detected duplicated entry."
        );
        assert!(dup.context.is_some());
    }

    #[test]
    fn test_import_error_exposes_validation_errors() {
        let err = ImportError::Validation(vec![ValidationError::blank("posts", "title")]);
        assert_eq!(err.validation_errors().map(|e| e.len()), Some(1));
        assert_eq!(err.to_string(), "import rejected with 1 validation error(s)");
    }
}
