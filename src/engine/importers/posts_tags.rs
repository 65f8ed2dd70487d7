//! Post to tag associations.

use std::collections::{HashMap, HashSet};
use tracing::debug;

use super::{PersistedRow, StageRun};
use crate::db::{NewRow, new_object_id};
use crate::error::{ImportError, Problem};
use crate::snapshot::{LocalId, Table};

const HELP: &str = "PostTag";

pub fn import(run: &mut StageRun<'_>) -> Result<Vec<PersistedRow>, ImportError> {
    let mut persisted = Vec::new();
    // Position of each row among the rows of its post, counted over the
    // whole join table so skipped rows still hold their slot.
    let mut positions: HashMap<LocalId, i64> = HashMap::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();

    let dataset = run.dataset;
    for join in &dataset.posts_tags {
        let position = {
            let slot = positions.entry(join.post_id.clone()).or_insert(0);
            let current = *slot;
            *slot += 1;
            current
        };

        let resolver = &run.state.resolver;
        if resolver.is_skipped(Table::Posts, &join.post_id) {
            debug!(post = %join.post_id, "post was skipped; dropping its tag");
            continue;
        }
        let Some(post_id) = resolver.resolve(Table::Posts, &join.post_id).map(str::to_string) else {
            run.state
                .diagnostics
                .problem(Problem::unresolved_ref(HELP, "post_id"));
            continue;
        };
        let Some(tag_id) = resolver.resolve(Table::Tags, &join.tag_id).map(str::to_string) else {
            run.state
                .diagnostics
                .problem(Problem::unresolved_ref(HELP, "tag_id"));
            continue;
        };
        if !seen.insert((post_id.clone(), tag_id.clone())) {
            debug!(post = %post_id, tag = %tag_id, "duplicate association dropped");
            continue;
        }

        let id = new_object_id();
        let row = NewRow::new()
            .set("id", id.clone())
            .set("post_id", post_id)
            .set("tag_id", tag_id)
            .set("sort_order", join.sort_order.unwrap_or(position));
        run.store.insert(Table::PostsTags, &row)?;
        persisted.push(PersistedRow::inserted(id, &row));
    }
    Ok(persisted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::context::RunState;
    use crate::engine::importers::testing::{dataset, destination, with_stage};
    use crate::engine::importers::{posts, tags};
    use serde_json::json;

    fn fixture(joins: Vec<serde_json::Value>) -> crate::snapshot::Dataset {
        dataset(vec![
            (
                "posts",
                vec![
                    json!({"id": 1, "title": "One", "status": "draft", "language": "en"}),
                    json!({"id": 2, "title": "Two", "status": "draft", "language": "en"}),
                ],
            ),
            (
                "tags",
                vec![
                    json!({"id": 1, "name": "a"}),
                    json!({"id": 2, "name": "b"}),
                    json!({"id": 3, "name": "c"}),
                ],
            ),
            ("posts_tags", joins),
        ])
    }

    fn run_all(data: &crate::snapshot::Dataset) -> (crate::db::Database, String, RunState) {
        let (db, owner) = destination();
        let mut state = RunState::default();
        with_stage(&db, &owner, data, &mut state, |run| {
            tags::import(run)?;
            posts::import(run)?;
            import(run)
        })
        .unwrap();
        (db, owner, state)
    }

    fn slugs_of(db: &crate::db::Database, title: &str) -> Vec<(String, i64)> {
        let post = db
            .list_posts()
            .unwrap()
            .into_iter()
            .find(|p| p.title == title)
            .unwrap();
        db.post_tag_slugs(&post.id).unwrap()
    }

    #[test]
    fn test_explicit_sort_order_is_kept() {
        let data = fixture(vec![
            json!({"post_id": 1, "tag_id": 1, "sort_order": 2}),
            json!({"post_id": 1, "tag_id": 2, "sort_order": 0}),
            json!({"post_id": 1, "tag_id": 3, "sort_order": 1}),
        ]);
        let (db, _, _) = run_all(&data);
        assert_eq!(
            slugs_of(&db, "One"),
            vec![("b".to_string(), 0), ("c".to_string(), 1), ("a".to_string(), 2)]
        );
    }

    #[test]
    fn test_missing_sort_order_uses_position_per_post() {
        let data = fixture(vec![
            json!({"post_id": 1, "tag_id": 3}),
            json!({"post_id": 2, "tag_id": 1}),
            json!({"post_id": 1, "tag_id": 1}),
            json!({"post_id": 2, "tag_id": 2}),
        ]);
        let (db, _, _) = run_all(&data);
        assert_eq!(
            slugs_of(&db, "One"),
            vec![("c".to_string(), 0), ("a".to_string(), 1)]
        );
        assert_eq!(
            slugs_of(&db, "Two"),
            vec![("a".to_string(), 0), ("b".to_string(), 1)]
        );
    }

    #[test]
    fn test_unresolvable_and_duplicate_rows() {
        let data = fixture(vec![
            json!({"post_id": 1, "tag_id": 1}),
            json!({"post_id": 1, "tag_id": 1}),
            json!({"post_id": 9, "tag_id": 1}),
            json!({"post_id": 2, "tag_id": 9}),
        ]);
        let (db, _, state) = run_all(&data);
        assert_eq!(slugs_of(&db, "One").len(), 1);
        let messages: Vec<&str> = state
            .diagnostics
            .problems
            .iter()
            .map(|p| p.message.as_str())
            .collect();
        assert_eq!(
            messages,
            vec![
                "Entry was not imported. Could not resolve reference field: post_id",
                "Entry was not imported. Could not resolve reference field: tag_id",
            ]
        );
    }
}
