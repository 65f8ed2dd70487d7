//! Declarative per-column field rules.
//!
//! [`validate`] is pure: it looks at one raw row and returns every violation
//! in rule-list order. [`validate_snapshot`] walks the whole snapshot in
//! table, then record, then column order.

use serde_json::Value;

use crate::error::ValidationError;
use crate::snapshot::value::is_blank;
use crate::snapshot::{Flag, LocalId, Snapshot, Table, Timestamp};

/// Expected JSON shape of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    String,
    Integer,
    Boolean,
    Timestamp,
    Identifier,
}

impl Kind {
    fn describe(self) -> &'static str {
        match self {
            Kind::String => "a string",
            Kind::Integer => "an integer",
            Kind::Boolean => "a boolean",
            Kind::Timestamp => "a timestamp",
            Kind::Identifier => "an identifier",
        }
    }

    fn accepts(self, value: &Value) -> bool {
        match self {
            Kind::String => value.is_string(),
            Kind::Integer => value.is_i64() || value.is_u64(),
            Kind::Boolean => Flag::parse(value).is_some(),
            Kind::Timestamp => Timestamp::parse(value).is_some(),
            Kind::Identifier => LocalId::from_value(value).is_some(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Required,
    /// Maximum length in characters.
    MaxLength(usize),
    Type(Kind),
    IsIn(&'static [&'static str]),
}

/// Rules for one column, evaluated in order.
#[derive(Debug, Clone, Copy)]
pub struct ColumnRule {
    pub column: &'static str,
    pub rules: &'static [Rule],
}

const fn col(column: &'static str, rules: &'static [Rule]) -> ColumnRule {
    ColumnRule { column, rules }
}

use Kind as K;
use Rule::{IsIn, MaxLength, Required, Type};

pub const POST_STATUSES: &[&str] = &["published", "draft", "scheduled"];
pub const SUBSCRIBER_STATUSES: &[&str] = &["subscribed", "unsubscribed"];

const SETTINGS: &[ColumnRule] = &[col("key", &[Required, Type(K::String), MaxLength(50)])];

const TAGS: &[ColumnRule] = &[
    col("name", &[Required, Type(K::String), MaxLength(191)]),
    col("slug", &[Type(K::String), MaxLength(191)]),
    col("description", &[Type(K::String), MaxLength(500)]),
];

const USERS: &[ColumnRule] = &[
    col("name", &[Required, Type(K::String), MaxLength(191)]),
    col("email", &[Required, Type(K::String), MaxLength(191)]),
    col("slug", &[Type(K::String), MaxLength(191)]),
    col("bio", &[Type(K::String), MaxLength(200)]),
];

const POSTS: &[ColumnRule] = &[
    col("title", &[Required, Type(K::String), MaxLength(2000)]),
    col("slug", &[Type(K::String), MaxLength(191)]),
    col("status", &[Required, IsIn(POST_STATUSES)]),
    col("language", &[Required, Type(K::String), MaxLength(6)]),
    col("featured", &[Type(K::Boolean)]),
    col("page", &[Type(K::Boolean)]),
    col("created_at", &[Type(K::Timestamp)]),
    col("updated_at", &[Type(K::Timestamp)]),
    col("published_at", &[Type(K::Timestamp)]),
];

const SUBSCRIBERS: &[ColumnRule] = &[
    col("email", &[Required, Type(K::String), MaxLength(191)]),
    col("status", &[IsIn(SUBSCRIBER_STATUSES)]),
];

const POSTS_TAGS: &[ColumnRule] = &[
    col("post_id", &[Required, Type(K::Identifier)]),
    col("tag_id", &[Required, Type(K::Identifier)]),
    col("sort_order", &[Type(K::Integer)]),
];

const ROLES: &[ColumnRule] = &[col("name", &[Required, MaxLength(50)])];

const ROLES_USERS: &[ColumnRule] = &[
    col("role_id", &[Required, Type(K::Identifier)]),
    col("user_id", &[Required, Type(K::Identifier)]),
];

/// The rule list of a table.
pub fn rules(table: Table) -> &'static [ColumnRule] {
    match table {
        Table::Settings => SETTINGS,
        Table::Tags => TAGS,
        Table::Users => USERS,
        Table::Posts => POSTS,
        Table::Subscribers => SUBSCRIBERS,
        Table::PostsTags => POSTS_TAGS,
        Table::Roles => ROLES,
        Table::RolesUsers => ROLES_USERS,
    }
}

/// Every violation of one raw row.
pub fn validate(table: Table, row: &Value) -> Vec<ValidationError> {
    let name = table.name();
    if !row.is_object() {
        return vec![ValidationError::not_an_object(name)];
    }

    let mut errors = Vec::new();
    for rule in rules(table) {
        let value = row.get(rule.column);
        if is_blank(value) {
            if rule.rules.contains(&Required) {
                errors.push(ValidationError::blank(name, rule.column));
            }
            continue;
        }
        let Some(value) = value else { continue };

        for check in rule.rules {
            match *check {
                Required => {}
                Type(kind) => {
                    if !kind.accepts(value) {
                        errors.push(ValidationError::wrong_type(
                            name,
                            rule.column,
                            kind.describe(),
                        ));
                        break;
                    }
                }
                MaxLength(max) => {
                    if let Some(s) = value.as_str()
                        && s.chars().count() > max
                    {
                        errors.push(ValidationError::too_long(name, rule.column, max));
                    }
                }
                IsIn(allowed) => {
                    if !value.as_str().is_some_and(|s| allowed.contains(&s)) {
                        errors.push(ValidationError::not_allowed(name, rule.column, allowed));
                    }
                }
            }
        }
    }
    errors
}

/// Validate the whole snapshot: `meta` first, then every known table.
pub fn validate_snapshot(snapshot: &Snapshot) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if snapshot.meta.version_text().is_none() {
        errors.push(ValidationError::blank("meta", "version"));
    }

    for table in Table::ALL {
        for (index, row) in snapshot.rows(table).iter().enumerate() {
            errors.extend(
                validate(table, row)
                    .into_iter()
                    .map(|e| e.at_index(index)),
            );
        }
    }
    errors
}
