use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// Timestamp format used for every TEXT datetime column (matches SQLite's `datetime('now')`).
pub const DB_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

impl ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

/// The closed set of post categories seeded by the initial migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    News,
    Life,
    Auto,
    Creative,
    Gadgets,
    Science,
    Games,
    Other,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::News,
        Category::Life,
        Category::Auto,
        Category::Creative,
        Category::Gadgets,
        Category::Science,
        Category::Games,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::News => "news",
            Category::Life => "life",
            Category::Auto => "auto",
            Category::Creative => "creative",
            Category::Gadgets => "gadgets",
            Category::Science => "science",
            Category::Games => "games",
            Category::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| format!("unknown category: {}", s))
    }
}

impl FromSql for Category {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

impl ToSql for Category {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

/// Feed orderings and selections accepted by the index page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostFilter {
    #[default]
    New,
    Best,
    My,
    Liked,
    Commented,
}

impl PostFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostFilter::New => "new",
            PostFilter::Best => "best",
            PostFilter::My => "my",
            PostFilter::Liked => "liked",
            PostFilter::Commented => "commented",
        }
    }

    /// Filters scoped to the viewer's own activity.
    pub fn requires_user(&self) -> bool {
        matches!(
            self,
            PostFilter::My | PostFilter::Liked | PostFilter::Commented
        )
    }
}

impl FromStr for PostFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "new" => Ok(PostFilter::New),
            "best" => Ok(PostFilter::Best),
            "my" => Ok(PostFilter::My),
            "liked" => Ok(PostFilter::Liked),
            "commented" => Ok(PostFilter::Commented),
            other => Err(format!("invalid filter: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub display_name: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user_id: i64,
    pub role: Role,
    pub expires_at: String,
}

/// A post as shown in feeds and on its own page, with derived vote data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    pub created_at: String,
    pub categories: Vec<Category>,
    pub likes: i64,
    pub dislikes: i64,
    pub user_vote: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub username: String,
    pub content: String,
    pub created_at: String,
    pub likes: i64,
    pub dislikes: i64,
    pub user_vote: Option<i64>,
}
