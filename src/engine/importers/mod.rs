//! Entity importers, one per destination table.
//!
//! Each importer reads its slice of the typed [`Dataset`], decides between
//! insert, merge and skip, writes through the [`Store`], registers resolver
//! entries for dependent stages and records problems.

pub mod posts;
pub mod posts_tags;
pub mod roles_users;
pub mod settings;
pub mod subscribers;
pub mod tags;
pub mod users;

use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

use super::context::{ImportContext, RunState};
use crate::config::ImportConfig;
use crate::db::{NewRow, Store};
use crate::error::{ImportError, Problem, ValidationError};
use crate::snapshot::{Dataset, LocalId, Table};

/// What happened to a persisted row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowAction {
    Inserted,
    Updated,
}

/// A destination row written by the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistedRow {
    pub id: String,
    pub action: RowAction,
    pub values: Map<String, Value>,
}

impl PersistedRow {
    pub fn inserted(id: impl Into<String>, row: &NewRow) -> Self {
        Self {
            id: id.into(),
            action: RowAction::Inserted,
            values: row.to_json(),
        }
    }

    pub fn updated(id: impl Into<String>, row: &NewRow) -> Self {
        Self {
            id: id.into(),
            action: RowAction::Updated,
            values: row.to_json(),
        }
    }
}

/// Everything a stage needs for one run.
pub struct StageRun<'a> {
    pub store: &'a dyn Store,
    pub ctx: &'a ImportContext,
    pub config: &'a ImportConfig,
    pub dataset: &'a Dataset,
    pub state: &'a mut RunState,
}

impl StageRun<'_> {
    /// Map a user reference, `None` when the id is unknown to this run.
    pub fn resolve_user(&self, local: &LocalId) -> Option<String> {
        self.state
            .resolver
            .resolve(Table::Users, local)
            .map(str::to_string)
    }

    /// The destination refused row `index` outright. Fatal for the run, but
    /// the stage keeps going so every rejected row is reported together.
    pub fn reject(&mut self, table: Table, index: usize, detail: String) {
        self.state
            .diagnostics
            .error(ValidationError::new(table.name(), detail).at_index(index));
    }
}

/// One step of the persisting pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Settings,
    Tags,
    Users,
    Posts,
    Subscribers,
    PostsTags,
    RolesUsers,
}

impl Stage {
    /// Dependency order.
    pub const PIPELINE: [Stage; 7] = [
        Stage::Settings,
        Stage::Tags,
        Stage::Users,
        Stage::Posts,
        Stage::Subscribers,
        Stage::PostsTags,
        Stage::RolesUsers,
    ];

    pub fn name(self) -> &'static str {
        self.table().name()
    }

    /// Destination table the stage writes.
    pub fn table(self) -> Table {
        match self {
            Stage::Settings => Table::Settings,
            Stage::Tags => Table::Tags,
            Stage::Users => Table::Users,
            Stage::Posts => Table::Posts,
            Stage::Subscribers => Table::Subscribers,
            Stage::PostsTags => Table::PostsTags,
            Stage::RolesUsers => Table::RolesUsers,
        }
    }

    /// Tables whose resolver entries must be complete before this stage runs.
    pub fn requires(self) -> &'static [Table] {
        match self {
            Stage::Settings | Stage::Tags | Stage::Users | Stage::Subscribers => &[],
            Stage::Posts => &[Table::Users],
            Stage::PostsTags => &[Table::Posts, Table::Tags],
            Stage::RolesUsers => &[Table::Users],
        }
    }

    pub fn run(self, run: &mut StageRun<'_>) -> Result<Vec<PersistedRow>, ImportError> {
        match self {
            Stage::Settings => settings::import(run),
            Stage::Tags => tags::import(run),
            Stage::Users => users::import(run),
            Stage::Posts => posts::import(run),
            Stage::Subscribers => subscribers::import(run),
            Stage::PostsTags => posts_tags::import(run),
            Stage::RolesUsers => roles_users::import(run),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Keep a well-formed uuid, otherwise mint a new one. Only a non-empty
/// malformed value is worth a problem.
pub fn repair_uuid(raw: Option<&str>, help: &str) -> (String, Option<Problem>) {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => (crate::db::new_uuid(), None),
        Some(s) => match uuid::Uuid::parse_str(s) {
            Ok(parsed) => (parsed.hyphenated().to_string(), None),
            Err(_) => (crate::db::new_uuid(), Some(Problem::uuid_replaced(help))),
        },
    }
}

/// Slug given in the snapshot, or one derived from `fallback`. Both are
/// normalized, so destination lookups see the same key the sanitizer does.
pub fn slug_or_derive(slug: Option<&str>, fallback: &str) -> String {
    let source = slug.filter(|s| !s.trim().is_empty()).unwrap_or(fallback);
    super::sanitizer::normalize_slug(source)
}

/// JSON text of a record, for problem context.
pub fn context_json<T: Serialize>(record: &T) -> String {
    serde_json::to_string(record).unwrap_or_default()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repair_uuid() {
        let (kept, problem) = repair_uuid(Some("8D2B9B0C-54A4-4F5B-8D3E-3E1B3D6C1A9F"), "Post");
        assert_eq!(kept, "8d2b9b0c-54a4-4f5b-8d3e-3e1b3d6c1a9f");
        assert!(problem.is_none());

        let (fresh, problem) = repair_uuid(Some(""), "Post");
        assert!(uuid::Uuid::parse_str(&fresh).is_ok());
        assert!(problem.is_none());

        let (fresh, problem) = repair_uuid(None, "Post");
        assert!(uuid::Uuid::parse_str(&fresh).is_ok());
        assert!(problem.is_none());

        let (fresh, problem) = repair_uuid(Some("not-a-uuid"), "Tag");
        assert!(uuid::Uuid::parse_str(&fresh).is_ok());
        assert_eq!(problem.map(|p| p.help), Some("Tag".to_string()));
    }

    #[test]
    fn test_slug_or_derive() {
        assert_eq!(slug_or_derive(Some("given"), "Title"), "given");
        assert_eq!(slug_or_derive(Some("Hello_World"), "Title"), "hello-world");
        assert_eq!(slug_or_derive(Some(" Hello World "), "Title"), "hello-world");
        assert_eq!(slug_or_derive(Some("  "), "Hello World"), "hello-world");
        assert_eq!(slug_or_derive(None, "Hello World"), "hello-world");
    }

    #[test]
    fn test_stage_requirements_follow_pipeline() {
        for (position, stage) in Stage::PIPELINE.iter().enumerate() {
            for required in stage.requires() {
                let earlier = Stage::PIPELINE[..position]
                    .iter()
                    .any(|s| s.table() == *required);
                assert!(earlier, "{} requires {} before it", stage, required);
            }
        }
    }
}
