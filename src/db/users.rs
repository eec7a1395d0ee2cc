use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::{Role, User};
use crate::db::{is_unique_violation, StoreError, StoreResult};

const USER_COLUMNS: &str = "id, email, username, password, role, display_name, created_at";

fn map_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        password_hash: row.get(3)?,
        role: row.get(4)?,
        display_name: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Insert a new account with the `user` role. Returns the new id.
pub fn register(
    conn: &Connection,
    email: &str,
    username: &str,
    password_hash: &str,
) -> StoreResult<i64> {
    if email_exists(conn, email)? {
        return Err(StoreError::Conflict("Email already taken".into()));
    }
    if username_exists(conn, username)? {
        return Err(StoreError::Conflict("Username already taken".into()));
    }

    conn.execute(
        "INSERT INTO users (email, username, password, role) VALUES (?1, ?2, ?3, ?4)",
        params![email, username, password_hash, Role::User],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            StoreError::Conflict("Email or username already taken".into())
        } else {
            e.into()
        }
    })?;

    Ok(conn.last_insert_rowid())
}

pub fn find_by_id(conn: &Connection, user_id: i64) -> StoreResult<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
            params![user_id],
            map_user,
        )
        .optional()?;
    Ok(user)
}

pub fn find_by_email(conn: &Connection, email: &str) -> StoreResult<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS),
            params![email],
            map_user,
        )
        .optional()?;
    Ok(user)
}

pub fn email_exists(conn: &Connection, email: &str) -> StoreResult<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
        params![email],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Usernames compare case-insensitively.
pub fn username_exists(conn: &Connection, username: &str) -> StoreResult<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(username) = LOWER(?1))",
        params![username],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Change username and display name. A username equal to the current one
/// (ignoring case) is not treated as a conflict.
pub fn update_profile(
    conn: &Connection,
    user_id: i64,
    username: &str,
    display_name: Option<&str>,
) -> StoreResult<()> {
    let taken: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(username) = LOWER(?1) AND id != ?2)",
        params![username, user_id],
        |row| row.get(0),
    )?;
    if taken {
        return Err(StoreError::Conflict("Username already taken".into()));
    }

    let updated = conn.execute(
        "UPDATE users SET username = ?1, display_name = ?2 WHERE id = ?3",
        params![username, display_name, user_id],
    )?;
    if updated == 0 {
        return Err(StoreError::NotFound(format!("user {}", user_id)));
    }
    Ok(())
}

pub fn set_role(conn: &Connection, email: &str, role: Role) -> StoreResult<()> {
    let updated = conn.execute(
        "UPDATE users SET role = ?1 WHERE email = ?2",
        params![role, email],
    )?;
    if updated == 0 {
        return Err(StoreError::NotFound(format!("user {}", email)));
    }
    Ok(())
}
