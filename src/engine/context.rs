//! Per-run context and diagnostics.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::db::{Database, Lookup, SqliteStore, Store};
use crate::error::{ImportError, Problem, ValidationError};
use crate::snapshot::Table;

use super::resolver::ReferenceResolver;

/// Who is importing, and when the run began.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportContext {
    /// Destination id stamped into `created_by`/`updated_by`.
    pub acting_user_id: String,
    pub started_at: DateTime<Utc>,
}

impl ImportContext {
    pub fn new(acting_user_id: impl Into<String>) -> Self {
        Self::at(acting_user_id, Utc::now())
    }

    pub fn at(acting_user_id: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            acting_user_id: acting_user_id.into(),
            started_at,
        }
    }

    /// Import on behalf of the destination owner.
    pub fn as_owner(db: &Database) -> Result<Self, ImportError> {
        let owner = db.with_conn(|conn| SqliteStore::new(conn).find_role_holder("Owner"))?;
        owner.map(Self::new).ok_or(ImportError::NoOwner)
    }

    /// Import on behalf of the destination user with `email`.
    pub fn as_user(db: &Database, email: &str) -> Result<Self, ImportError> {
        let user = db.with_conn(|conn| {
            SqliteStore::new(conn).find_existing(Table::Users, &Lookup::Email(email))
        })?;
        user.map(Self::new)
            .ok_or_else(|| ImportError::UnknownActingUser(email.to_string()))
    }

    pub fn started_ms(&self) -> i64 {
        self.started_at.timestamp_millis()
    }
}

/// Fatal and non-fatal findings of a run, in arrival order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    pub errors: Vec<ValidationError>,
    pub problems: Vec<Problem>,
}

impl Diagnostics {
    pub fn problem(&mut self, problem: Problem) {
        warn!(help = %problem.help, "{}", problem.message);
        self.problems.push(problem);
    }

    pub fn problems(&mut self, problems: impl IntoIterator<Item = Problem>) {
        for problem in problems {
            self.problem(problem);
        }
    }

    pub fn error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// A tag whose `created_by` waits for the Users stage.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingUserRef {
    pub row_id: String,
    pub local_user: crate::snapshot::LocalId,
}

/// Mutable state threaded through every stage of one run.
#[derive(Debug, Default)]
pub struct RunState {
    pub resolver: ReferenceResolver,
    pub diagnostics: Diagnostics,
    pub pending_tag_authors: Vec<PendingUserRef>,
    /// Destination ids of users inserted by this run, in insert order.
    pub new_users: Vec<String>,
}
