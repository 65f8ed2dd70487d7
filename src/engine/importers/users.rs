//! Users: match by email, otherwise insert as a locked account.
//!
//! A matched user only receives display fields. Email, password, bio and
//! status of an existing account are never touched.

use tracing::debug;

use super::{PersistedRow, StageRun, repair_uuid, slug_or_derive};
use crate::db::{Lookup, NewRow, Store, StoreError, new_object_id};
use crate::engine::sanitizer::normalize_slug;
use crate::error::{ImportError, Problem};
use crate::snapshot::{Table, UserRecord};

const HELP: &str = "User";

pub fn import(run: &mut StageRun<'_>) -> Result<Vec<PersistedRow>, ImportError> {
    let mut persisted = Vec::new();

    let dataset = run.dataset;
    for (index, user) in dataset.users.iter().enumerate() {
        let email = user.email.trim();
        match run.store.find_existing(Table::Users, &Lookup::Email(email))? {
            Some(existing) => {
                let row = merge_row(run.store, user, &existing)?
                    .set("updated_at", run.ctx.started_ms())
                    .set("updated_by", run.ctx.acting_user_id.clone());
                run.store.update(Table::Users, &existing, &row)?;
                if let Some(local) = &user.id {
                    run.state
                        .resolver
                        .record_existing(Table::Users, local, existing.clone());
                }
                debug!(email, id = %existing, "merged into existing user");
                persisted.push(PersistedRow::updated(existing, &row));
            }
            None => {
                if let Some(row) = insert_user(run, index, user)? {
                    persisted.push(row);
                }
            }
        }
    }
    Ok(persisted)
}

/// Display fields copied onto a matched user. The slug moves only when no
/// other user holds it.
fn merge_row(store: &dyn Store, user: &UserRecord, existing: &str) -> Result<NewRow, StoreError> {
    let mut row = NewRow::new().set("name", user.name.clone());

    if let Some(slug) = user
        .slug
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(normalize_slug)
    {
        match store.find_existing(Table::Users, &Lookup::Slug(&slug))? {
            Some(holder) if holder != existing => {
                debug!(%slug, "slug taken by another user; keeping current slug");
            }
            _ => row = row.set("slug", slug),
        }
    }
    if let Some(website) = &user.website {
        row = row.set("website", website.clone());
    }
    if let Some(location) = &user.location {
        row = row.set("location", location.clone());
    }
    Ok(row)
}

/// First free slug among `base`, `base-2`, `base-3`, ...
fn unique_slug(store: &dyn Store, base: &str) -> Result<String, StoreError> {
    let mut candidate = base.to_string();
    let mut n = 2;
    while store
        .find_existing(Table::Users, &Lookup::Slug(&candidate))?
        .is_some()
    {
        candidate = format!("{}-{}", base, n);
        n += 1;
    }
    Ok(candidate)
}

fn insert_user(
    run: &mut StageRun<'_>,
    index: usize,
    user: &UserRecord,
) -> Result<Option<PersistedRow>, ImportError> {
    let id = new_object_id();
    let started = run.ctx.started_ms();
    let acting = run.ctx.acting_user_id.clone();
    let slug = unique_slug(run.store, &slug_or_derive(user.slug.as_deref(), &user.name))?;
    let (uuid, uuid_problem) = repair_uuid(user.uuid.as_deref(), HELP);

    let row = NewRow::new()
        .set("id", id.clone())
        .set("uuid", uuid)
        .set("name", user.name.clone())
        .set("slug", slug)
        .set("email", user.email.trim().to_string())
        .set("password", user.password.clone().unwrap_or_default())
        .set_opt("bio", user.bio.clone())
        .set_opt("website", user.website.clone())
        .set_opt("location", user.location.clone())
        .set("status", run.config.new_user_status.clone())
        .set("created_at", started)
        .set("created_by", acting.clone())
        .set("updated_at", started)
        .set("updated_by", acting);

    match run.store.insert(Table::Users, &row) {
        Ok(()) => {}
        Err(StoreError::Duplicate { detail, .. }) => {
            debug!(detail, "user rejected as duplicate");
            run.state.diagnostics.problem(Problem::duplicate(HELP));
            return Ok(None);
        }
        Err(StoreError::Constraint { detail, .. }) => {
            run.reject(Table::Users, index, detail);
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    }

    run.state.diagnostics.problems(uuid_problem);
    if let Some(local) = &user.id {
        run.state.resolver.record(Table::Users, local, id.clone());
    }
    run.state.new_users.push(id.clone());
    Ok(Some(PersistedRow::inserted(id, &row)))
}
