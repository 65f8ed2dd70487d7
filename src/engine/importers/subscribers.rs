//! Subscribers: plain inserts; an email already subscribed is skipped.

use tracing::debug;

use super::{PersistedRow, StageRun, context_json, repair_uuid};
use crate::db::{NewRow, StoreError, new_object_id};
use crate::error::{ImportError, Problem};
use crate::snapshot::Table;

const HELP: &str = "Subscriber";

pub fn import(run: &mut StageRun<'_>) -> Result<Vec<PersistedRow>, ImportError> {
    let mut persisted = Vec::new();
    let started = run.ctx.started_ms();
    let acting = run.ctx.acting_user_id.clone();

    let dataset = run.dataset;
    for (index, subscriber) in dataset.subscribers.iter().enumerate() {
        let id = new_object_id();
        let (uuid, uuid_problem) = repair_uuid(subscriber.uuid.as_deref(), HELP);
        let row = NewRow::new()
            .set("id", id.clone())
            .set("uuid", uuid)
            .set_opt("name", subscriber.name.clone())
            .set("email", subscriber.email.trim().to_string())
            .set(
                "status",
                subscriber
                    .status
                    .clone()
                    .unwrap_or_else(|| "subscribed".to_string()),
            )
            .set("created_at", subscriber.created_at.map_or(started, |t| t.millis()))
            .set("created_by", acting.clone())
            .set("updated_at", started)
            .set("updated_by", acting.clone());

        match run.store.insert(Table::Subscribers, &row) {
            Ok(()) => {}
            Err(StoreError::Duplicate { detail, .. }) => {
                debug!(detail, "subscriber already in destination");
                run.state
                    .diagnostics
                    .problem(Problem::duplicate(HELP).with_context(context_json(subscriber)));
                continue;
            }
            Err(StoreError::Constraint { detail, .. }) => {
                run.reject(Table::Subscribers, index, detail);
                continue;
            }
            Err(e) => return Err(e.into()),
        }

        run.state.diagnostics.problems(uuid_problem);
        if let Some(local) = &subscriber.id {
            run.state.resolver.record(Table::Subscribers, local, id.clone());
        }
        persisted.push(PersistedRow::inserted(id, &row));
    }
    Ok(persisted)
}
