//! Within-snapshot deduplication.
//!
//! Runs before validation and never fails. Duplicate tags are collapsed onto
//! the first occurrence and join rows are re-pointed at the survivor;
//! duplicate posts are dropped along with their join rows.

use heck::ToKebabCase;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use crate::error::Problem;
use crate::snapshot::value::text;
use crate::snapshot::{LocalId, Snapshot, Table};

/// Sanitized snapshot plus the problems found while producing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Sanitized {
    pub snapshot: Snapshot,
    pub problems: Vec<Problem>,
}

/// Case- and format-insensitive slug key: `"Hello World"`, `"hello-world"`
/// and `"HELLO_WORLD"` all collapse to `hello-world`.
pub fn normalize_slug(raw: &str) -> String {
    let kebab = raw.trim().to_kebab_case();
    if kebab.is_empty() {
        raw.trim().to_lowercase()
    } else {
        kebab
    }
}

fn non_blank<'a>(row: &'a Value, column: &str) -> Option<&'a str> {
    text(row, column).filter(|s| !s.trim().is_empty())
}

fn tag_identity(row: &Value) -> Option<String> {
    non_blank(row, "slug")
        .or_else(|| non_blank(row, "name"))
        .map(normalize_slug)
}

fn post_identity(row: &Value) -> Option<String> {
    if let Some(slug) = non_blank(row, "slug") {
        return Some(format!("slug:{}", normalize_slug(slug)));
    }
    non_blank(row, "uuid")
        .and_then(|u| uuid::Uuid::parse_str(u.trim()).ok())
        .map(|u| format!("uuid:{}", u))
}

fn local_id(row: &Value, column: &str) -> Option<LocalId> {
    row.get(column).and_then(LocalId::from_value)
}

fn context_of(row: &Value) -> String {
    serde_json::to_string(row).unwrap_or_default()
}

/// Keep the first row per identity. Returns the survivors and, for each
/// removed row, the survivor it duplicated.
fn split_duplicates(
    rows: Vec<Value>,
    identity: fn(&Value) -> Option<String>,
) -> (Vec<Value>, Vec<(Value, usize)>) {
    let mut first_by_key: HashMap<String, usize> = HashMap::new();
    let mut kept = Vec::with_capacity(rows.len());
    let mut removed = Vec::new();

    for row in rows {
        match identity(&row) {
            Some(key) => match first_by_key.get(&key) {
                Some(&survivor) => removed.push((row, survivor)),
                None => {
                    first_by_key.insert(key, kept.len());
                    kept.push(row);
                }
            },
            None => kept.push(row),
        }
    }
    (kept, removed)
}

fn dedup_tags(snapshot: &mut Snapshot, problems: &mut Vec<Problem>) {
    let Some(rows) = snapshot.rows_mut(Table::Tags) else {
        return;
    };
    let (kept, removed) = split_duplicates(std::mem::take(rows), tag_identity);

    let mut redirects: HashMap<LocalId, Value> = HashMap::new();
    for (row, survivor) in &removed {
        let survivor_raw = kept[*survivor].get("id");
        let survivor_id = survivor_raw.and_then(LocalId::from_value);
        if let (Some(from), Some(to), Some(raw)) = (local_id(row, "id"), survivor_id, survivor_raw)
            && from != to
        {
            redirects.insert(from, raw.clone());
        }
        debug!(tag = %context_of(row), "dropping duplicate tag");
        problems.push(Problem::duplicate(Table::Tags.label()).with_context(context_of(row)));
    }
    *rows = kept;

    if redirects.is_empty() {
        return;
    }
    if let Some(joins) = snapshot.rows_mut(Table::PostsTags) {
        for join in joins.iter_mut() {
            let target = local_id(join, "tag_id").and_then(|id| redirects.get(&id));
            if let (Some(target), Some(obj)) = (target.cloned(), join.as_object_mut()) {
                obj.insert("tag_id".to_string(), target);
            }
        }
    }
}

fn dedup_posts(snapshot: &mut Snapshot, problems: &mut Vec<Problem>) {
    let Some(rows) = snapshot.rows_mut(Table::Posts) else {
        return;
    };
    let (kept, removed) = split_duplicates(std::mem::take(rows), post_identity);

    let surviving: HashSet<LocalId> = kept.iter().filter_map(|r| local_id(r, "id")).collect();
    let mut dropped: HashSet<LocalId> = HashSet::new();
    for (row, _) in &removed {
        if let Some(id) = local_id(row, "id")
            && !surviving.contains(&id)
        {
            dropped.insert(id);
        }
        debug!(post = %context_of(row), "dropping duplicate post");
        problems.push(Problem::duplicate(Table::Posts.label()).with_context(context_of(row)));
    }
    *rows = kept;

    if dropped.is_empty() {
        return;
    }
    if let Some(joins) = snapshot.rows_mut(Table::PostsTags) {
        joins.retain(|join| !local_id(join, "post_id").is_some_and(|id| dropped.contains(&id)));
    }
}

/// Remove within-snapshot duplicate tags and posts.
pub fn sanitize(mut snapshot: Snapshot) -> Sanitized {
    let mut problems = Vec::new();
    dedup_tags(&mut snapshot, &mut problems);
    dedup_posts(&mut snapshot, &mut problems);

    if !problems.is_empty() {
        info!(removed = problems.len(), "removed duplicate snapshot entries");
    }
    Sanitized { snapshot, problems }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tag_ids_of_joins(snapshot: &Snapshot) -> Vec<String> {
        snapshot
            .rows(Table::PostsTags)
            .iter()
            .map(|j| local_id(j, "tag_id").map(|id| id.to_string()).unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_normalize_slug() {
        assert_eq!(normalize_slug("Hello World"), "hello-world");
        assert_eq!(normalize_slug("hello-world"), "hello-world");
        assert_eq!(normalize_slug("HELLO_WORLD"), "hello-world");
        assert_eq!(normalize_slug("!!!"), "!!!");
    }

    #[test]
    fn test_duplicate_tags_are_collapsed_and_joins_redirected() {
        let snapshot = Snapshot::new("003")
            .with_table(
                "tags",
                vec![
                    json!({"id": 1, "name": "Rust", "slug": "rust"}),
                    json!({"id": 2, "name": "Go", "slug": "go"}),
                    json!({"id": 3, "name": "RUST", "slug": "Rust"}),
                    json!({"id": 4, "name": "Go"}),
                ],
            )
            .with_table(
                "posts_tags",
                vec![
                    json!({"post_id": 1, "tag_id": 3}),
                    json!({"post_id": 1, "tag_id": 4}),
                    json!({"post_id": 2, "tag_id": 2}),
                ],
            );

        let sanitized = sanitize(snapshot);
        let tags = sanitized.snapshot.rows(Table::Tags);
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0]["id"], 1);
        assert_eq!(tags[1]["id"], 2);
        assert_eq!(tag_ids_of_joins(&sanitized.snapshot), vec!["1", "2", "2"]);

        assert_eq!(sanitized.problems.len(), 2);
        assert!(sanitized.problems.iter().all(|p| p.help == "Tag"));
        assert_eq!(
            sanitized.problems[0].message,
            "Entry was not imported and ignored. Detected duplicated entry."
        );
    }

    #[test]
    fn test_duplicate_posts_keep_first_and_drop_joins() {
        let snapshot = Snapshot::new("003")
            .with_table(
                "posts",
                vec![
                    json!({"id": 1, "title": "A", "slug": "a"}),
                    json!({"id": 2, "title": "A again", "slug": "A"}),
                    json!({"id": 3, "title": "B", "uuid": "1d6d8a5e-0b63-4e49-b3d2-7c1a4a3f9b11"}),
                    json!({"id": 4, "title": "B again", "uuid": "1D6D8A5E-0B63-4E49-B3D2-7C1A4A3F9B11"}),
                    json!({"id": 5, "title": "no identity"}),
                    json!({"id": 6, "title": "no identity"}),
                ],
            )
            .with_table(
                "posts_tags",
                vec![
                    json!({"post_id": 1, "tag_id": 1}),
                    json!({"post_id": 2, "tag_id": 1}),
                    json!({"post_id": 4, "tag_id": 1}),
                ],
            );

        let sanitized = sanitize(snapshot);
        let ids: Vec<i64> = sanitized
            .snapshot
            .rows(Table::Posts)
            .iter()
            .filter_map(|p| p["id"].as_i64())
            .collect();
        assert_eq!(ids, vec![1, 3, 5, 6]);
        assert_eq!(sanitized.snapshot.rows(Table::PostsTags).len(), 1);
        assert_eq!(sanitized.problems.len(), 2);
        assert!(sanitized.problems.iter().all(|p| p.help == "Post"));
    }

    #[test]
    fn test_tag_problems_come_before_post_problems() {
        let snapshot = Snapshot::new("003")
            .with_table(
                "posts",
                vec![json!({"id": 1, "slug": "x"}), json!({"id": 2, "slug": "x"})],
            )
            .with_table(
                "tags",
                vec![json!({"id": 1, "slug": "t"}), json!({"id": 2, "slug": "t"})],
            );
        let helps: Vec<String> = sanitize(snapshot)
            .problems
            .into_iter()
            .map(|p| p.help)
            .collect();
        assert_eq!(helps, vec!["Tag", "Post"]);
    }

    #[test]
    fn test_clean_snapshot_is_untouched() {
        let snapshot = Snapshot::new("003").with_table(
            "tags",
            vec![json!({"id": 1, "slug": "a"}), json!({"id": 2, "slug": "b"})],
        );
        let sanitized = sanitize(snapshot.clone());
        assert_eq!(sanitized.snapshot, snapshot);
        assert!(sanitized.problems.is_empty());
    }
}
