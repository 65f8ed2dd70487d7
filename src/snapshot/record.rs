//! Typed view of validated export rows.
//!
//! Each table has its own record struct; unknown columns are kept in `extra`
//! so a record can be inspected or echoed back without loss.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::table::Table;
use super::value::{Flag, LocalId, Timestamp, optional_id};
use super::Snapshot;
use crate::error::ValidationError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingRecord {
    #[serde(default, deserialize_with = "optional_id")]
    pub id: Option<LocalId>,
    pub key: String,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SettingRecord {
    /// Value rendered the way the destination stores it: strings verbatim,
    /// other JSON as serialized text, null as `None`.
    pub fn stored_value(&self) -> Option<String> {
        match self.value.as_ref()? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagRecord {
    #[serde(default, deserialize_with = "optional_id")]
    pub id: Option<LocalId>,
    #[serde(default)]
    pub uuid: Option<String>,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    #[serde(default, deserialize_with = "optional_id")]
    pub created_by: Option<LocalId>,
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(default, deserialize_with = "optional_id")]
    pub id: Option<LocalId>,
    #[serde(default)]
    pub uuid: Option<String>,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    pub email: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    #[serde(default, deserialize_with = "optional_id")]
    pub id: Option<LocalId>,
    #[serde(default)]
    pub uuid: Option<String>,
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub markdown: Option<String>,
    #[serde(default)]
    pub html: Option<String>,
    pub status: String,
    pub language: String,
    #[serde(default)]
    pub featured: Option<Flag>,
    #[serde(default)]
    pub page: Option<Flag>,
    #[serde(default, deserialize_with = "optional_id")]
    pub author_id: Option<LocalId>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    #[serde(default, deserialize_with = "optional_id")]
    pub created_by: Option<LocalId>,
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
    #[serde(default)]
    pub published_at: Option<Timestamp>,
    #[serde(default, deserialize_with = "optional_id")]
    pub published_by: Option<LocalId>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriberRecord {
    #[serde(default, deserialize_with = "optional_id")]
    pub id: Option<LocalId>,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub email: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostTagRecord {
    #[serde(default, deserialize_with = "optional_id")]
    pub id: Option<LocalId>,
    pub post_id: LocalId,
    pub tag_id: LocalId,
    #[serde(default)]
    pub sort_order: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleRecord {
    #[serde(default, deserialize_with = "optional_id")]
    pub id: Option<LocalId>,
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleUserRecord {
    #[serde(default, deserialize_with = "optional_id")]
    pub id: Option<LocalId>,
    pub role_id: LocalId,
    pub user_id: LocalId,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One typed export row.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Setting(SettingRecord),
    Tag(TagRecord),
    User(UserRecord),
    Post(PostRecord),
    Subscriber(SubscriberRecord),
    PostTag(PostTagRecord),
    Role(RoleRecord),
    RoleUser(RoleUserRecord),
}

impl Record {
    /// Parse a raw row of `table` into its typed form.
    pub fn parse(table: Table, row: &Value) -> Result<Self, serde_json::Error> {
        let row = row.clone();
        Ok(match table {
            Table::Settings => Record::Setting(serde_json::from_value(row)?),
            Table::Tags => Record::Tag(serde_json::from_value(row)?),
            Table::Users => Record::User(serde_json::from_value(row)?),
            Table::Posts => Record::Post(serde_json::from_value(row)?),
            Table::Subscribers => Record::Subscriber(serde_json::from_value(row)?),
            Table::PostsTags => Record::PostTag(serde_json::from_value(row)?),
            Table::Roles => Record::Role(serde_json::from_value(row)?),
            Table::RolesUsers => Record::RoleUser(serde_json::from_value(row)?),
        })
    }
}

/// Every known table of a validated snapshot, typed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub settings: Vec<SettingRecord>,
    pub tags: Vec<TagRecord>,
    pub users: Vec<UserRecord>,
    pub posts: Vec<PostRecord>,
    pub subscribers: Vec<SubscriberRecord>,
    pub posts_tags: Vec<PostTagRecord>,
    pub roles: Vec<RoleRecord>,
    pub roles_users: Vec<RoleUserRecord>,
}

impl Dataset {
    /// Parse every known table of `snapshot`.
    ///
    /// Rows the field rules accepted can still fail here on columns without
    /// rules (a numeric `markdown`, say); those failures are reported as
    /// validation errors rather than dropped.
    pub fn from_snapshot(snapshot: &Snapshot) -> Result<Self, Vec<ValidationError>> {
        let mut dataset = Dataset::default();
        let mut errors = Vec::new();

        for table in Table::ALL {
            for (index, row) in snapshot.rows(table).iter().enumerate() {
                match Record::parse(table, row) {
                    Ok(record) => dataset.push(record),
                    Err(e) => errors.push(
                        ValidationError::new(
                            table.name(),
                            format!("Entry in [{}] could not be read: {}", table, e),
                        )
                        .at_index(index),
                    ),
                }
            }
        }

        if errors.is_empty() {
            Ok(dataset)
        } else {
            Err(errors)
        }
    }

    fn push(&mut self, record: Record) {
        match record {
            Record::Setting(r) => self.settings.push(r),
            Record::Tag(r) => self.tags.push(r),
            Record::User(r) => self.users.push(r),
            Record::Post(r) => self.posts.push(r),
            Record::Subscriber(r) => self.subscribers.push(r),
            Record::PostTag(r) => self.posts_tags.push(r),
            Record::Role(r) => self.roles.push(r),
            Record::RoleUser(r) => self.roles_users.push(r),
        }
    }

    /// Role name for a snapshot-local role id.
    pub fn role_name(&self, role_id: &LocalId) -> Option<&str> {
        self.roles
            .iter()
            .find(|r| r.id.as_ref() == Some(role_id))
            .map(|r| r.name.as_str())
    }
}
