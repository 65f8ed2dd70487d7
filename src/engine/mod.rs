//! The import reconciliation engine.
//!
//! Data flows raw snapshot -> [`sanitizer`] -> [`validator`] -> entity
//! [`importers`] (threading a [`resolver::ReferenceResolver`]) -> commit or
//! rollback in the [`orchestrator`].

pub mod context;
pub mod importers;
pub mod orchestrator;
pub mod resolver;
pub mod sanitizer;
pub mod validator;

pub use context::{Diagnostics, ImportContext, RunState};
pub use importers::{PersistedRow, RowAction, Stage};
pub use orchestrator::{ImportOptions, ImportPhase, ImportResult, Importer, Preflight, preflight};
pub use resolver::ReferenceResolver;
pub use sanitizer::{Sanitized, sanitize};
pub use validator::{validate, validate_snapshot};
