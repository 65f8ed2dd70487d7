//! Tags: insert, or fall back to the destination's tag on a slug collision.
//!
//! Tags are written before users exist, so `created_by` is parked in
//! [`RunState::pending_tag_authors`] and settled by [`relink_authors`] once
//! the Users stage has run.

use rusqlite::types::Value as SqlValue;
use serde_json::Value;
use tracing::debug;

use super::{PersistedRow, StageRun, context_json, repair_uuid, slug_or_derive};
use crate::db::{Lookup, NewRow, StoreError, new_object_id};
use crate::engine::context::{PendingUserRef, RunState};
use crate::error::{ImportError, Problem};
use crate::snapshot::Table;

const HELP: &str = "Tag";

pub fn import(run: &mut StageRun<'_>) -> Result<Vec<PersistedRow>, ImportError> {
    let mut persisted = Vec::new();
    let started = run.ctx.started_ms();
    let acting = run.ctx.acting_user_id.clone();

    let dataset = run.dataset;
    for (index, tag) in dataset.tags.iter().enumerate() {
        let id = new_object_id();
        let slug = slug_or_derive(tag.slug.as_deref(), &tag.name);
        let (uuid, uuid_problem) = repair_uuid(tag.uuid.as_deref(), HELP);

        let row = NewRow::new()
            .set("id", id.clone())
            .set("uuid", uuid)
            .set("name", tag.name.clone())
            .set("slug", slug.clone())
            .set_opt("description", tag.description.clone())
            .set("created_at", tag.created_at.map_or(started, |t| t.millis()))
            .set("created_by", acting.clone())
            .set("updated_at", tag.updated_at.map_or(started, |t| t.millis()))
            .set("updated_by", acting.clone());

        match run.store.insert(Table::Tags, &row) {
            Ok(()) => {}
            Err(StoreError::Duplicate { .. }) => {
                let existing = run.store.find_existing(Table::Tags, &Lookup::Slug(&slug))?;
                if let (Some(local), Some(existing)) = (&tag.id, existing) {
                    run.state
                        .resolver
                        .record_existing(Table::Tags, local, existing);
                }
                debug!(slug, "tag already in destination");
                run.state
                    .diagnostics
                    .problem(Problem::duplicate(HELP).with_context(context_json(tag)));
                continue;
            }
            Err(StoreError::Constraint { detail, .. }) => {
                run.reject(Table::Tags, index, detail);
                continue;
            }
            Err(e) => return Err(e.into()),
        }

        run.state.diagnostics.problems(uuid_problem);
        if let Some(local) = &tag.id {
            run.state.resolver.record(Table::Tags, local, id.clone());
        }
        if let Some(author) = &tag.created_by {
            run.state.pending_tag_authors.push(PendingUserRef {
                row_id: id.clone(),
                local_user: author.clone(),
            });
        }
        persisted.push(PersistedRow::inserted(id, &row));
    }
    Ok(persisted)
}

/// Point each parked tag `created_by` at the imported user, or clear it.
/// `rows` are the Tags stage's persisted rows, patched in place.
pub fn relink_authors(
    store: &dyn crate::db::Store,
    state: &mut RunState,
    rows: &mut [PersistedRow],
) -> Result<(), ImportError> {
    for pending in std::mem::take(&mut state.pending_tag_authors) {
        let resolved = state
            .resolver
            .resolve(Table::Users, &pending.local_user)
            .map(str::to_string);
        if resolved.is_none() {
            state
                .diagnostics
                .problem(Problem::unresolved_user_ref(HELP, "created_by"));
        }

        let value = resolved.clone().map_or(SqlValue::Null, SqlValue::Text);
        store.update(
            Table::Tags,
            &pending.row_id,
            &NewRow::new().set("created_by", value),
        )?;

        if let Some(row) = rows.iter_mut().find(|r| r.id == pending.row_id) {
            row.values.insert(
                "created_by".to_string(),
                resolved.map_or(Value::Null, Value::String),
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use crate::engine::importers::testing::{dataset, destination, with_stage};
    use crate::snapshot::LocalId;
    use serde_json::json;

    #[test]
    fn test_insert_and_register() {
        let (db, owner) = destination();
        let data = dataset(vec![(
            "tags",
            vec![
                json!({"id": 1, "name": "Getting Started"}),
                json!({"id": 2, "name": "Rust", "slug": "rust", "uuid": "bogus"}),
            ],
        )]);
        let mut state = RunState::default();
        let rows = with_stage(&db, &owner, &data, &mut state, |run| import(run)).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].values["slug"], "getting-started");
        assert!(state.resolver.resolve(Table::Tags, &LocalId::new("2")).is_some());
        assert_eq!(state.diagnostics.problems.len(), 1);
        assert_eq!(
            state.diagnostics.problems[0].message,
            "Entry was imported, but its invalid uuid was replaced."
        );
    }

    #[test]
    fn test_destination_duplicate_maps_to_existing_tag() {
        let (db, owner) = destination();
        let first = dataset(vec![("tags", vec![json!({"id": 9, "name": "Rust"})])]);
        let mut state = RunState::default();
        with_stage(&db, &owner, &first, &mut state, |run| import(run)).unwrap();
        let existing = db.list_tags().unwrap()[0].id.clone();

        let second = dataset(vec![("tags", vec![json!({"id": 1, "name": "RUST", "slug": "Rust"})])]);
        let mut state = RunState::default();
        let rows = with_stage(&db, &owner, &second, &mut state, |run| import(run)).unwrap();

        assert!(rows.is_empty());
        assert_eq!(
            state.resolver.resolve(Table::Tags, &LocalId::new("1")),
            Some(existing.as_str())
        );
        assert_eq!(state.diagnostics.problems[0].help, "Tag");
        assert_eq!(db.list_tags().unwrap().len(), 1);
    }

    #[test]
    fn test_relink_authors() {
        let (db, owner) = destination();
        let data = dataset(vec![(
            "tags",
            vec![
                json!({"id": 1, "name": "a", "created_by": 5}),
                json!({"id": 2, "name": "b", "created_by": 6}),
                json!({"id": 3, "name": "c"}),
            ],
        )]);
        let mut state = RunState::default();
        let mut rows = with_stage(&db, &owner, &data, &mut state, |run| import(run)).unwrap();
        assert_eq!(state.pending_tag_authors.len(), 2);

        state
            .resolver
            .record_existing(Table::Users, &LocalId::new("5"), owner.clone());
        db.with_conn(|conn| relink_authors(&SqliteStore::new(conn), &mut state, &mut rows))
            .unwrap();

        let tags = db.list_tags().unwrap();
        assert_eq!(tags[0].created_by.as_deref(), Some(owner.as_str()));
        assert_eq!(tags[1].created_by, None);
        assert_eq!(tags[2].created_by.as_deref(), Some(owner.as_str()));
        assert_eq!(rows[1].values["created_by"], Value::Null);
        assert_eq!(state.diagnostics.problems.len(), 1);
        assert_eq!(
            state.diagnostics.problems[0].message,
            "Entry was imported, but we were not able to update user reference field: created_by"
        );
    }
}
