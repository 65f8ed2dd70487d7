//! Import orchestration.
//!
//! One run moves through `Idle -> Sanitizing -> Validating -> Persisting`
//! and ends in `Committed` or `RolledBack`. Every entity stage runs inside a
//! single transaction; any fatal error drops the transaction so nothing from
//! the run becomes visible.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::context::{ImportContext, RunState};
use super::importers::{PersistedRow, RowAction, Stage, StageRun, tags};
use super::sanitizer::{Sanitized, sanitize};
use super::validator::validate_snapshot;
use crate::config::ImportConfig;
use crate::db::{Database, SqliteStore, Store};
use crate::error::{ImportError, Problem, ValidationError};
use crate::snapshot::{Dataset, Snapshot};

/// Options for controlling an import run.
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Run every stage, then roll the transaction back.
    pub dry_run: bool,
}

impl ImportOptions {
    pub fn dry_run() -> Self {
        Self { dry_run: true }
    }
}

/// Result of a successful import run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    /// Rows written per destination table, in stage order within each table.
    pub data: BTreeMap<String, Vec<PersistedRow>>,
    /// The snapshot after sanitizing.
    pub original_data: Snapshot,
    /// Sanitizer problems first, then stage problems in pipeline order.
    pub problems: Vec<Problem>,
    pub dry_run: bool,
}

impl ImportResult {
    /// Rows of `table` with the given action.
    pub fn count(&self, table: &str, action: RowAction) -> usize {
        self.data
            .get(table)
            .map_or(0, |rows| rows.iter().filter(|r| r.action == action).count())
    }

    /// Total number of rows written.
    pub fn total_rows(&self) -> usize {
        self.data.values().map(Vec::len).sum()
    }

    /// Problems carrying the given entity label.
    pub fn problems_for<'a>(&'a self, help: &'a str) -> impl Iterator<Item = &'a Problem> + 'a {
        self.problems.iter().filter(move |p| p.help == help)
    }
}

/// Where a run currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportPhase {
    #[default]
    Idle,
    Sanitizing,
    Validating,
    Persisting,
    Committed,
    RolledBack,
}

impl ImportPhase {
    pub fn can_transition_to(self, next: ImportPhase) -> bool {
        use ImportPhase::*;
        matches!(
            (self, next),
            (Idle, Sanitizing)
                | (Sanitizing, Validating)
                | (Validating, Persisting)
                | (Validating, RolledBack)
                | (Persisting, Committed)
                | (Persisting, RolledBack)
        )
    }

    /// Whether the run has finished, one way or the other.
    pub fn is_terminal(self) -> bool {
        matches!(self, ImportPhase::Committed | ImportPhase::RolledBack)
    }
}

/// Sanitized snapshot and the outcome of validating it, without touching a
/// destination.
#[derive(Debug, Clone)]
pub struct Preflight {
    pub sanitized: Sanitized,
    pub outcome: Result<Dataset, Vec<ValidationError>>,
}

impl Preflight {
    pub fn errors(&self) -> &[ValidationError] {
        match &self.outcome {
            Ok(_) => &[],
            Err(errors) => errors,
        }
    }
}

/// Sanitize and validate `snapshot`.
pub fn preflight(snapshot: Snapshot) -> Preflight {
    let sanitized = sanitize(snapshot);
    let outcome = validate(&sanitized.snapshot);
    Preflight { sanitized, outcome }
}

/// Field rules over every table, then typed parsing. Errors are collected
/// exhaustively before deciding.
fn validate(snapshot: &Snapshot) -> Result<Dataset, Vec<ValidationError>> {
    let errors = validate_snapshot(snapshot);
    if !errors.is_empty() {
        return Err(errors);
    }
    Dataset::from_snapshot(snapshot)
}

/// Drives import runs against a destination.
#[derive(Debug)]
pub struct Importer {
    config: ImportConfig,
    phase: ImportPhase,
}

impl Importer {
    pub fn new(config: ImportConfig) -> Self {
        Self {
            config,
            phase: ImportPhase::Idle,
        }
    }

    pub fn phase(&self) -> ImportPhase {
        self.phase
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    fn transition(&mut self, next: ImportPhase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "invalid import phase transition {:?} -> {:?}",
            self.phase,
            next
        );
        info!(from = ?self.phase, to = ?next, "import phase");
        self.phase = next;
    }

    /// Import `snapshot` into `db` on behalf of `ctx.acting_user_id`.
    ///
    /// Returns every validation error when the snapshot is rejected; in that
    /// case, and for any other error, the destination is unchanged.
    pub fn run(
        &mut self,
        db: &Database,
        snapshot: Snapshot,
        ctx: &ImportContext,
        options: &ImportOptions,
    ) -> Result<ImportResult, ImportError> {
        self.phase = ImportPhase::Idle;

        self.transition(ImportPhase::Sanitizing);
        let Sanitized {
            snapshot,
            problems: sanitizer_problems,
        } = sanitize(snapshot);

        self.transition(ImportPhase::Validating);
        let dataset = match validate(&snapshot) {
            Ok(dataset) => dataset,
            Err(errors) => {
                info!(errors = errors.len(), "snapshot rejected");
                self.transition(ImportPhase::RolledBack);
                return Err(ImportError::Validation(errors));
            }
        };
        for table in snapshot.unknown_tables() {
            debug!(table, "unknown table passed through");
        }

        self.transition(ImportPhase::Persisting);
        let mut state = RunState::default();
        let config = &self.config;
        let persisted = db.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let data = persist(&SqliteStore::new(&tx), ctx, config, &dataset, &mut state)?;
            if options.dry_run {
                tx.rollback()?;
            } else {
                tx.commit()?;
            }
            Ok::<_, ImportError>(data)
        });

        let data = match persisted {
            Ok(data) => data,
            Err(e) => {
                info!(error = %e, "import rolled back");
                self.transition(ImportPhase::RolledBack);
                return Err(e);
            }
        };
        self.transition(if options.dry_run {
            ImportPhase::RolledBack
        } else {
            ImportPhase::Committed
        });

        let mut problems = sanitizer_problems;
        problems.extend(state.diagnostics.problems);
        Ok(ImportResult {
            data,
            original_data: snapshot,
            problems,
            dry_run: options.dry_run,
        })
    }
}

/// Run every stage in pipeline order against `store`.
fn persist(
    store: &dyn Store,
    ctx: &ImportContext,
    config: &ImportConfig,
    dataset: &Dataset,
    state: &mut RunState,
) -> Result<BTreeMap<String, Vec<PersistedRow>>, ImportError> {
    let mut data: BTreeMap<String, Vec<PersistedRow>> = BTreeMap::new();

    for stage in Stage::PIPELINE {
        if let Some(missing) = stage
            .requires()
            .iter()
            .find(|t| !state.resolver.is_completed(**t))
        {
            return Err(ImportError::StageOrder {
                stage: stage.name(),
                missing: missing.name(),
            });
        }

        let rows = {
            let mut run = StageRun {
                store,
                ctx,
                config,
                dataset,
                state: &mut *state,
            };
            stage.run(&mut run)?
        };
        info!(stage = %stage, rows = rows.len(), "stage complete");
        data.insert(stage.name().to_string(), rows);
        state.resolver.mark_completed(stage.table());

        if stage == Stage::Users {
            let tag_rows = data.entry(Stage::Tags.name().to_string()).or_default();
            tags::relink_authors(store, state, tag_rows)?;
        }
    }

    if state.diagnostics.has_errors() {
        return Err(ImportError::Validation(std::mem::take(
            &mut state.diagnostics.errors,
        )));
    }
    Ok(data)
}
