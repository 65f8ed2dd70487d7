//! Posts: insert with remapped user references; destination slug or uuid
//! collisions skip the post.

use rusqlite::types::Value as SqlValue;
use tracing::debug;

use super::{PersistedRow, StageRun, context_json, repair_uuid, slug_or_derive};
use crate::db::{NewRow, StoreError, new_object_id};
use crate::error::{ImportError, Problem};
use crate::snapshot::{LocalId, PostRecord, Table};

const HELP: &str = "Post";

/// How a missing or unresolvable user reference is filled in.
#[derive(Debug, Clone, Copy)]
enum Fallback {
    /// Missing stamps the acting user; unresolved is cleared.
    ActingOrNull,
    /// Missing and unresolved are both cleared.
    Null,
    /// Missing stamps the acting user; unresolved keeps the raw export value.
    ActingOrRaw,
}

fn user_ref(
    run: &StageRun<'_>,
    field: &'static str,
    local: Option<&LocalId>,
    fallback: Fallback,
    problems: &mut Vec<Problem>,
) -> SqlValue {
    let acting = || SqlValue::Text(run.ctx.acting_user_id.clone());
    let Some(local) = local else {
        return match fallback {
            Fallback::Null => SqlValue::Null,
            Fallback::ActingOrNull | Fallback::ActingOrRaw => acting(),
        };
    };
    if let Some(id) = run.resolve_user(local) {
        return SqlValue::Text(id);
    }
    problems.push(Problem::unresolved_user_ref(HELP, field));
    match fallback {
        Fallback::ActingOrRaw => SqlValue::Text(local.to_string()),
        Fallback::ActingOrNull | Fallback::Null => SqlValue::Null,
    }
}

fn build_row(run: &StageRun<'_>, post: &PostRecord, id: &str, problems: &mut Vec<Problem>) -> NewRow {
    let started = run.ctx.started_ms();
    let (uuid, uuid_problem) = repair_uuid(post.uuid.as_deref(), HELP);
    problems.extend(uuid_problem);

    let author = user_ref(run, "author_id", post.author_id.as_ref(), Fallback::ActingOrRaw, problems);
    let created_by = user_ref(run, "created_by", post.created_by.as_ref(), Fallback::ActingOrNull, problems);
    let published_by = user_ref(run, "published_by", post.published_by.as_ref(), Fallback::Null, problems);

    NewRow::new()
        .set("id", id.to_string())
        .set("uuid", uuid)
        .set("title", post.title.clone())
        .set("slug", slug_or_derive(post.slug.as_deref(), &post.title))
        .set_opt("markdown", post.markdown.clone())
        .set_opt("html", post.html.clone())
        .set("featured", post.featured.is_some_and(|f| f.0))
        .set("page", post.page.is_some_and(|f| f.0))
        .set("status", post.status.clone())
        .set("language", post.language.clone())
        .set("author_id", author)
        .set("created_at", post.created_at.map_or(started, |t| t.millis()))
        .set("created_by", created_by)
        .set("updated_at", post.updated_at.map_or(started, |t| t.millis()))
        .set("updated_by", run.ctx.acting_user_id.clone())
        .set_opt("published_at", post.published_at.map(|t| t.millis()))
        .set("published_by", published_by)
}

pub fn import(run: &mut StageRun<'_>) -> Result<Vec<PersistedRow>, ImportError> {
    let mut persisted = Vec::new();

    let dataset = run.dataset;
    for (index, post) in dataset.posts.iter().enumerate() {
        let id = new_object_id();
        let mut problems = Vec::new();
        let row = build_row(run, post, &id, &mut problems);

        match run.store.insert(Table::Posts, &row) {
            Ok(()) => {}
            Err(StoreError::Duplicate { detail, .. }) => {
                debug!(detail, "post already in destination");
                if let Some(local) = &post.id {
                    run.state.resolver.mark_skipped(Table::Posts, local);
                }
                run.state
                    .diagnostics
                    .problem(Problem::duplicate(HELP).with_context(context_json(post)));
                continue;
            }
            Err(StoreError::Constraint { detail, .. }) => {
                run.reject(Table::Posts, index, detail);
                continue;
            }
            Err(e) => return Err(e.into()),
        }

        run.state.diagnostics.problems(problems);
        if let Some(local) = &post.id {
            run.state.resolver.record(Table::Posts, local, id.clone());
        }
        persisted.push(PersistedRow::inserted(id, &row));
    }
    Ok(persisted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::context::RunState;
    use crate::engine::importers::testing::{dataset, destination, with_stage};
    use serde_json::json;

    fn post(id: i64, slug: &str) -> serde_json::Value {
        json!({
            "id": id,
            "title": format!("Post {}", id),
            "slug": slug,
            "status": "published",
            "language": "en_US",
            "created_at": 1388318310782_i64,
            "updated_at": 1388318310783_i64,
            "published_at": 1388318310784_i64
        })
    }

    #[test]
    fn test_references_and_timestamps() {
        let (db, owner) = destination();
        let mut row = post(1, "hello");
        row["author_id"] = json!(1);
        row["created_by"] = json!(1);
        row["published_by"] = json!(99);
        let data = dataset(vec![("posts", vec![row])]);

        let mut state = RunState::default();
        state
            .resolver
            .record_existing(Table::Users, &LocalId::new("1"), owner.clone());
        state.resolver.mark_completed(Table::Users);
        with_stage(&db, &owner, &data, &mut state, |run| import(run)).unwrap();

        let posts = db.list_posts().unwrap();
        assert_eq!(posts[0].author_id, owner);
        assert_eq!(posts[0].created_by.as_deref(), Some(owner.as_str()));
        assert_eq!(posts[0].published_by, None);
        assert_eq!(posts[0].updated_by.as_deref(), Some(owner.as_str()));
        assert_eq!(posts[0].created_at, Some(1388318310782));
        assert_eq!(posts[0].published_at, Some(1388318310784));

        assert_eq!(state.diagnostics.problems.len(), 1);
        assert_eq!(state.diagnostics.problems[0].help, "Post");
        assert_eq!(
            state.diagnostics.problems[0].message,
            "Entry was imported, but we were not able to update user reference field: published_by"
        );
    }

    #[test]
    fn test_unresolved_author_keeps_raw_value() {
        let (db, owner) = destination();
        let mut row = post(1, "hello");
        row["author_id"] = json!(2);
        let data = dataset(vec![("posts", vec![row])]);

        let mut state = RunState::default();
        with_stage(&db, &owner, &data, &mut state, |run| import(run)).unwrap();

        let posts = db.list_posts().unwrap();
        assert_eq!(posts[0].author_id, "2");
        assert_eq!(posts[0].created_by.as_deref(), Some(owner.as_str()));
        assert_eq!(state.diagnostics.problems.len(), 1);
    }

    #[test]
    fn test_destination_duplicate_is_skipped() {
        let (db, owner) = destination();
        let data = dataset(vec![("posts", vec![post(1, "hello")])]);
        let mut state = RunState::default();
        with_stage(&db, &owner, &data, &mut state, |run| import(run)).unwrap();

        let again = dataset(vec![("posts", vec![post(7, "HELLO")])]);
        let mut state = RunState::default();
        let rows = with_stage(&db, &owner, &again, &mut state, |run| import(run)).unwrap();

        assert!(rows.is_empty());
        assert!(state.resolver.is_skipped(Table::Posts, &LocalId::new("7")));
        assert_eq!(
            state.diagnostics.problems[0].message,
            "Entry was not imported and ignored. Detected duplicated entry."
        );
        assert_eq!(db.list_posts().unwrap().len(), 1);
    }
}
