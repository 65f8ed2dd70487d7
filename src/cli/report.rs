//! Plain-text rendering of import outcomes.

use std::io::{self, Write};

use crate::engine::{ImportResult, Preflight, RowAction, Stage};
use crate::error::{Problem, ValidationError};

/// Per-table summary of a finished run, followed by its problems.
pub fn render_import(result: &ImportResult, out: &mut impl Write) -> io::Result<()> {
    if result.dry_run {
        writeln!(out, "Dry run results (nothing was written):")?;
    } else {
        writeln!(out, "Import complete:")?;
    }
    writeln!(out, "  Rows written: {}", result.total_rows())?;
    for stage in Stage::PIPELINE {
        let table = stage.name();
        let inserted = result.count(table, RowAction::Inserted);
        let updated = result.count(table, RowAction::Updated);
        if inserted + updated == 0 {
            continue;
        }
        write!(out, "    {}: {} inserted", table, inserted)?;
        if updated > 0 {
            write!(out, ", {} updated", updated)?;
        }
        writeln!(out)?;
    }
    render_problems(&result.problems, out)
}

pub fn render_problems(problems: &[Problem], out: &mut impl Write) -> io::Result<()> {
    if problems.is_empty() {
        return Ok(());
    }
    writeln!(out, "  Problems ({}):", problems.len())?;
    for problem in problems {
        writeln!(out, "    - {}", problem)?;
        if let Some(context) = &problem.context {
            writeln!(out, "      {}", context)?;
        }
    }
    Ok(())
}

pub fn render_errors(errors: &[ValidationError], out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "Import rejected with {} validation error(s):", errors.len())?;
    for error in errors {
        match error.index {
            Some(index) => writeln!(out, "  - {} (entry {})", error.message, index)?,
            None => writeln!(out, "  - {}", error.message)?,
        }
    }
    Ok(())
}

/// Outcome of the validate subcommand.
pub fn render_preflight(preflight: &Preflight, out: &mut impl Write) -> io::Result<()> {
    let errors = preflight.errors();
    if errors.is_empty() {
        writeln!(out, "Snapshot is valid.")?;
    } else {
        render_errors(errors, out)?;
    }
    render_problems(&preflight.sanitized.problems, out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PersistedRow;
    use crate::snapshot::Snapshot;
    use std::collections::BTreeMap;

    fn render<F>(f: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> io::Result<()>,
    {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_render_import_summary() {
        let row = |action| PersistedRow {
            id: "a".to_string(),
            action,
            values: Default::default(),
        };
        let mut data = BTreeMap::new();
        data.insert("tags".to_string(), vec![row(RowAction::Inserted), row(RowAction::Inserted)]);
        data.insert("settings".to_string(), vec![row(RowAction::Updated)]);
        data.insert("posts".to_string(), vec![]);
        let result = ImportResult {
            data,
            original_data: Snapshot::default(),
            problems: vec![Problem::duplicate("Tag").with_context(r#"{"slug":"a"}"#)],
            dry_run: false,
        };

        let text = render(|out| render_import(&result, out));
        assert_eq!(
            text,
            "Import complete:\n  Rows written: 3\n    settings: 0 inserted, 1 updated\n    tags: 2 inserted\n  Problems (1):\n    - [Tag] Entry was not imported and ignored. Detected duplicated entry.\n      {\"slug\":\"a\"}\n"
        );
    }

    #[test]
    fn test_render_errors_with_index() {
        let errors = vec![ValidationError::blank("posts", "title").at_index(2)];
        let text = render(|out| render_errors(&errors, out));
        assert!(text.contains("  - Value in [posts.title] cannot be blank. (entry 2)\n"));
    }
}
