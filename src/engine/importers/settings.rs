//! Settings: merge by key onto existing, unprotected destination settings.

use rusqlite::types::Value as SqlValue;
use tracing::debug;

use super::{PersistedRow, StageRun};
use crate::db::{Lookup, NewRow};
use crate::error::ImportError;
use crate::snapshot::Table;

pub fn import(run: &mut StageRun<'_>) -> Result<Vec<PersistedRow>, ImportError> {
    let mut persisted = Vec::new();

    let dataset = run.dataset;
    for setting in &dataset.settings {
        let key = setting.key.trim();
        if run.config.is_protected(key) {
            debug!(key, "protected setting left untouched");
            continue;
        }
        let Some(id) = run.store.find_existing(Table::Settings, &Lookup::Key(key))? else {
            debug!(key, "unknown setting ignored");
            continue;
        };

        let row = NewRow::new()
            .set("value", setting.stored_value().map_or(SqlValue::Null, SqlValue::Text))
            .set("updated_at", run.ctx.started_ms())
            .set("updated_by", run.ctx.acting_user_id.clone());
        run.store.update(Table::Settings, &id, &row)?;
        persisted.push(PersistedRow::updated(id, &row.set("key", key.to_string())));
    }
    Ok(persisted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::context::RunState;
    use crate::engine::importers::testing::{dataset, destination, with_stage};
    use serde_json::json;

    #[test]
    fn test_updates_existing_unprotected_keys_only() {
        let (db, owner) = destination();
        let data = dataset(vec![(
            "settings",
            vec![
                json!({"key": "title", "value": "Imported Blog"}),
                json!({"key": "active_theme", "value": "other"}),
                json!({"key": "made_up", "value": "x"}),
                json!({"key": "navigation", "value": [{"label": "Home"}]}),
            ],
        )]);

        let mut state = RunState::default();
        let rows = with_stage(&db, &owner, &data, &mut state, |run| import(run)).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(db.get_setting("title").unwrap().as_deref(), Some("Imported Blog"));
        assert_eq!(db.get_setting("active_theme").unwrap().as_deref(), Some("casper"));
        assert_eq!(
            db.get_setting("navigation").unwrap().as_deref(),
            Some(r#"[{"label":"Home"}]"#)
        );
        assert!(state.diagnostics.problems.is_empty());
    }
}
