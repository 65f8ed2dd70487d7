//! Read helpers and owner bootstrap for the destination.

use anyhow::{Result, bail};
use rusqlite::{OptionalExtension, Row, params};
use serde::Serialize;

use super::store::{new_object_id, new_uuid};
use super::{Database, now_ms};
use crate::snapshot::Table;

/// A destination user with their role names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRow {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub email: String,
    pub password: String,
    pub bio: Option<String>,
    pub website: Option<String>,
    pub location: Option<String>,
    pub status: String,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostRow {
    pub id: String,
    pub uuid: String,
    pub title: String,
    pub slug: String,
    pub status: String,
    pub author_id: String,
    pub created_at: Option<i64>,
    pub created_by: Option<String>,
    pub updated_at: Option<i64>,
    pub updated_by: Option<String>,
    pub published_at: Option<i64>,
    pub published_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagRow {
    pub id: String,
    pub uuid: String,
    pub name: String,
    pub slug: String,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
}

fn parse_user_row(row: &Row) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get("id")?,
        name: row.get("name")?,
        slug: row.get("slug")?,
        email: row.get("email")?,
        password: row.get("password")?,
        bio: row.get("bio")?,
        website: row.get("website")?,
        location: row.get("location")?,
        status: row.get("status")?,
        created_by: row.get("created_by")?,
        updated_by: row.get("updated_by")?,
        roles: Vec::new(),
    })
}

fn parse_post_row(row: &Row) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get("id")?,
        uuid: row.get("uuid")?,
        title: row.get("title")?,
        slug: row.get("slug")?,
        status: row.get("status")?,
        author_id: row.get("author_id")?,
        created_at: row.get("created_at")?,
        created_by: row.get("created_by")?,
        updated_at: row.get("updated_at")?,
        updated_by: row.get("updated_by")?,
        published_at: row.get("published_at")?,
        published_by: row.get("published_by")?,
    })
}

fn parse_tag_row(row: &Row) -> rusqlite::Result<TagRow> {
    Ok(TagRow {
        id: row.get("id")?,
        uuid: row.get("uuid")?,
        name: row.get("name")?,
        slug: row.get("slug")?,
        created_by: row.get("created_by")?,
        updated_by: row.get("updated_by")?,
    })
}

impl Database {
    /// Id of the user holding the Owner role.
    pub fn owner_user_id(&self) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let id = conn
                .query_row(
                    "SELECT ru.user_id FROM roles_users ru
                     JOIN roles r ON r.id = ru.role_id
                     WHERE r.name = 'Owner'
                     ORDER BY ru.rowid LIMIT 1",
                    [],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(id)
        })
    }

    /// Id of the user with the given email, compared case-insensitively.
    pub fn user_id_by_email(&self, email: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let id = conn
                .query_row(
                    "SELECT id FROM users WHERE email = ?1 COLLATE NOCASE",
                    params![email],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(id)
        })
    }

    /// Create the destination's owner account. Fails if an owner exists.
    pub fn create_owner(
        &self,
        name: &str,
        email: &str,
        password_hash: Option<&str>,
    ) -> Result<String> {
        if self.owner_user_id()?.is_some() {
            bail!("destination already has an owner");
        }
        let user_id = new_object_id();
        let slug = heck::ToKebabCase::to_kebab_case(name);
        let now = now_ms();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO users (id, uuid, name, slug, email, password, status,
                                    created_at, created_by, updated_at, updated_by)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'active', ?7, ?1, ?7, ?1)",
                params![
                    user_id,
                    new_uuid(),
                    name,
                    slug,
                    email,
                    password_hash.unwrap_or_default(),
                    now
                ],
            )?;
            tx.execute(
                "INSERT INTO roles_users (id, role_id, user_id)
                 SELECT ?1, id, ?2 FROM roles WHERE name = 'Owner'",
                params![new_object_id(), user_id],
            )?;
            tx.commit()?;
            Ok(user_id)
        })
    }

    /// Every user, with role names, in insertion order.
    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM users ORDER BY rowid")?;
            let mut users = stmt
                .query_map([], parse_user_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut roles = conn.prepare(
                "SELECT r.name FROM roles_users ru
                 JOIN roles r ON r.id = ru.role_id
                 WHERE ru.user_id = ?1 ORDER BY ru.rowid",
            )?;
            for user in &mut users {
                user.roles = roles
                    .query_map(params![user.id], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<String>>>()?;
            }
            Ok(users)
        })
    }

    /// Every post in insertion order.
    pub fn list_posts(&self) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM posts ORDER BY rowid")?;
            let posts = stmt
                .query_map([], parse_post_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(posts)
        })
    }

    /// Every tag in insertion order.
    pub fn list_tags(&self) -> Result<Vec<TagRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM tags ORDER BY rowid")?;
            let tags = stmt
                .query_map([], parse_tag_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(tags)
        })
    }

    /// Tag slugs attached to a post, by ascending sort order.
    pub fn post_tag_slugs(&self, post_id: &str) -> Result<Vec<(String, i64)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT t.slug, pt.sort_order FROM posts_tags pt
                 JOIN tags t ON t.id = pt.tag_id
                 WHERE pt.post_id = ?1
                 ORDER BY pt.sort_order, pt.rowid",
            )?;
            let rows = stmt
                .query_map(params![post_id], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let value = conn
                .query_row(
                    "SELECT value FROM settings WHERE key = ?1",
                    params![key],
                    |row| row.get::<_, Option<String>>(0),
                )
                .optional()?;
            Ok(value.flatten())
        })
    }

    /// Row count per known table.
    pub fn table_counts(&self) -> Result<std::collections::BTreeMap<String, usize>> {
        self.with_conn(|conn| {
            let mut counts = std::collections::BTreeMap::new();
            for table in Table::ALL {
                let count: i64 = conn.query_row(
                    &format!("SELECT COUNT(*) FROM {}", table.name()),
                    [],
                    |row| row.get(0),
                )?;
                counts.insert(table.name().to_string(), count as usize);
            }
            Ok(counts)
        })
    }
}
