//! Role assignments for users inserted by this run.
//!
//! Snapshot roles are mapped to destination roles by name. Matched users keep
//! the roles they already have. The destination never ends up with a second
//! owner: an imported `Owner` is demoted when one already exists.

use std::collections::HashSet;
use tracing::debug;

use super::{PersistedRow, StageRun};
use crate::db::{Lookup, NewRow, new_object_id};
use crate::error::{ImportError, Problem};
use crate::snapshot::{LocalId, Table};

const OWNER: &str = "Owner";

pub fn import(run: &mut StageRun<'_>) -> Result<Vec<PersistedRow>, ImportError> {
    let mut persisted = Vec::new();
    let mut assigned: HashSet<String> = HashSet::new();
    let mut owner_taken = run.store.find_role_holder(OWNER)?.is_some();

    let dataset = run.dataset;
    for role in &dataset.roles {
        let Some(local) = &role.id else { continue };
        if let Some(id) = run.store.find_existing(Table::Roles, &Lookup::Name(&role.name))? {
            run.state.resolver.record_existing(Table::Roles, local, id);
        }
    }

    for link in &dataset.roles_users {
        let Some(user_id) = run.resolve_user(&link.user_id) else {
            run.state
                .diagnostics
                .problem(Problem::unresolved_ref("RoleUser", "user_id"));
            continue;
        };
        if run.state.resolver.was_matched(Table::Users, &link.user_id) {
            debug!(user = %user_id, "existing user keeps current roles");
            continue;
        }
        if assigned.contains(&user_id) {
            debug!(user = %user_id, "user already has a role from this import");
            continue;
        }

        let mut role = role_for(run, &link.role_id);
        if role == OWNER && owner_taken {
            debug!(user = %user_id, fallback = %run.config.owner_fallback_role, "owner demoted");
            role = run.config.owner_fallback_role.clone();
        }
        persisted.push(assign(run, &user_id, &role)?);
        owner_taken |= role == OWNER;
        assigned.insert(user_id);
    }

    let unassigned: Vec<String> = run
        .state
        .new_users
        .iter()
        .filter(|id| !assigned.contains(*id))
        .cloned()
        .collect();
    for user_id in unassigned {
        let role = run.config.default_role.clone();
        persisted.push(assign(run, &user_id, &role)?);
    }
    Ok(persisted)
}

/// Destination role name for a snapshot role id, falling back to the
/// default role with a problem when the name is unknown.
fn role_for(run: &mut StageRun<'_>, local: &LocalId) -> String {
    if run.state.resolver.resolve(Table::Roles, local).is_some()
        && let Some(name) = run.dataset.role_name(local)
    {
        return name.to_string();
    }
    let fallback = run.config.default_role.clone();
    run.state.diagnostics.problem(Problem::unknown_role(&fallback));
    fallback
}

fn assign(run: &mut StageRun<'_>, user_id: &str, role: &str) -> Result<PersistedRow, ImportError> {
    let role_id = run
        .store
        .find_existing(Table::Roles, &Lookup::Name(role))?
        .ok_or_else(|| ImportError::MissingRole(role.to_string()))?;
    let id = new_object_id();
    let row = NewRow::new()
        .set("id", id.clone())
        .set("role_id", role_id)
        .set("user_id", user_id.to_string());
    run.store.insert(Table::RolesUsers, &row)?;
    debug!(user = user_id, role, "role assigned");
    Ok(PersistedRow::inserted(id, &row.set("role", role.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::context::RunState;
    use crate::engine::importers::testing::{dataset, destination, with_stage};
    use crate::engine::importers::users;
    use serde_json::json;

    fn roles() -> Vec<serde_json::Value> {
        vec![
            json!({"id": 1, "name": "Administrator"}),
            json!({"id": 2, "name": "Editor"}),
            json!({"id": 3, "name": "Author"}),
            json!({"id": 4, "name": "Owner"}),
            json!({"id": 5, "name": "Contributor"}),
        ]
    }

    fn user(id: i64, email: &str) -> serde_json::Value {
        json!({"id": id, "name": format!("User {}", id), "email": email})
    }

    fn run(data: &crate::snapshot::Dataset) -> (crate::db::Database, RunState) {
        let (db, owner) = destination();
        let mut state = RunState::default();
        with_stage(&db, &owner, data, &mut state, |run| {
            users::import(run)?;
            import(run)
        })
        .unwrap();
        (db, state)
    }

    fn roles_of(db: &crate::db::Database, email: &str) -> Vec<String> {
        db.list_users()
            .unwrap()
            .into_iter()
            .find(|u| u.email == email)
            .map(|u| u.roles)
            .unwrap_or_default()
    }

    #[test]
    fn test_imported_owners_are_demoted() {
        let data = dataset(vec![
            ("roles", roles()),
            ("users", vec![user(1, "a@example.com"), user(2, "b@example.com")]),
            (
                "roles_users",
                vec![
                    json!({"role_id": 4, "user_id": 1}),
                    json!({"role_id": 4, "user_id": 2}),
                ],
            ),
        ]);
        let (db, state) = run(&data);

        assert_eq!(roles_of(&db, "a@example.com"), vec!["Administrator"]);
        assert_eq!(roles_of(&db, "b@example.com"), vec!["Administrator"]);
        let owners = db
            .list_users()
            .unwrap()
            .into_iter()
            .filter(|u| u.roles.iter().any(|r| r == "Owner"))
            .count();
        assert_eq!(owners, 1);
        assert!(state.diagnostics.problems.is_empty());
    }

    #[test]
    fn test_defaults_and_unknown_roles() {
        let data = dataset(vec![
            ("roles", roles()),
            (
                "users",
                vec![
                    user(1, "a@example.com"),
                    user(2, "b@example.com"),
                    user(3, "c@example.com"),
                ],
            ),
            (
                "roles_users",
                vec![
                    json!({"role_id": 2, "user_id": 1}),
                    json!({"role_id": 1, "user_id": 1}),
                    json!({"role_id": 5, "user_id": 2}),
                ],
            ),
        ]);
        let (db, state) = run(&data);

        assert_eq!(roles_of(&db, "a@example.com"), vec!["Editor"]);
        assert_eq!(roles_of(&db, "b@example.com"), vec!["Author"]);
        assert_eq!(roles_of(&db, "c@example.com"), vec!["Author"]);
        assert_eq!(state.diagnostics.problems.len(), 1);
        assert_eq!(
            state.diagnostics.problems[0].message,
            "Entry was imported, but its role could not be found. Assigned role: Author"
        );
    }

    #[test]
    fn test_matched_user_keeps_existing_roles() {
        let data = dataset(vec![
            ("roles", roles()),
            ("users", vec![user(1, "owner@example.com")]),
            ("roles_users", vec![json!({"role_id": 3, "user_id": 1})]),
        ]);
        let (db, _) = run(&data);
        assert_eq!(roles_of(&db, "owner@example.com"), vec!["Owner"]);
    }

    #[test]
    fn test_unresolved_user_is_reported() {
        let data = dataset(vec![
            ("roles", roles()),
            ("roles_users", vec![json!({"role_id": 3, "user_id": 42})]),
        ]);
        let (_, state) = run(&data);
        assert_eq!(state.diagnostics.problems[0].help, "RoleUser");
    }
}
