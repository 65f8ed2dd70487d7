//! Catalogue of the export tables the importer understands.

use serde::Serialize;
use std::fmt;

/// A known snapshot table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Settings,
    Tags,
    Users,
    Posts,
    Subscribers,
    PostsTags,
    Roles,
    RolesUsers,
}

impl Table {
    /// All known tables, in validation order.
    pub const ALL: [Table; 8] = [
        Table::Settings,
        Table::Tags,
        Table::Users,
        Table::Posts,
        Table::Subscribers,
        Table::PostsTags,
        Table::Roles,
        Table::RolesUsers,
    ];

    /// Table name as it appears in the export and in the destination schema.
    pub fn name(self) -> &'static str {
        match self {
            Table::Settings => "settings",
            Table::Tags => "tags",
            Table::Users => "users",
            Table::Posts => "posts",
            Table::Subscribers => "subscribers",
            Table::PostsTags => "posts_tags",
            Table::Roles => "roles",
            Table::RolesUsers => "roles_users",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Table::ALL.into_iter().find(|t| t.name() == name)
    }

    /// Entity label used as the `help` of a [`crate::error::Problem`].
    pub fn label(self) -> &'static str {
        match self {
            Table::Settings => "Setting",
            Table::Tags => "Tag",
            Table::Users => "User",
            Table::Posts => "Post",
            Table::Subscribers => "Subscriber",
            Table::PostsTags => "PostTag",
            Table::Roles => "Role",
            Table::RolesUsers => "RoleUser",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_roundtrip() {
        for table in Table::ALL {
            assert_eq!(Table::from_name(table.name()), Some(table));
        }
        assert_eq!(Table::from_name("permissions"), None);
    }

    #[test]
    fn test_labels() {
        assert_eq!(Table::Tags.label(), "Tag");
        assert_eq!(Table::Posts.label(), "Post");
    }
}
