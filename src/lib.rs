//! Blog Import Library
//!
//! Reconciles a blog content-export snapshot with a live destination:
//! within-snapshot deduplication, field validation, reference remapping and
//! an all-or-nothing persisting pipeline.

pub mod cli;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod logging;
pub mod snapshot;
