use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::Comment;
use crate::db::{posts, StoreError, StoreResult};

// ?1 is always the viewer id (NULL when anonymous).
const COMMENT_SELECT: &str = "
    SELECT c.id, c.post_id, c.user_id, u.username, c.content, c.created_at,
           (SELECT COUNT(*) FROM comment_votes v WHERE v.comment_id = c.id AND v.vote = 1) AS likes,
           (SELECT COUNT(*) FROM comment_votes v WHERE v.comment_id = c.id AND v.vote = -1) AS dislikes,
           (SELECT v.vote FROM comment_votes v WHERE v.comment_id = c.id AND v.user_id = ?1) AS user_vote
    FROM comments c
    JOIN users u ON u.id = c.user_id";

fn map_comment(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        post_id: row.get(1)?,
        user_id: row.get(2)?,
        username: row.get(3)?,
        content: row.get(4)?,
        created_at: row.get(5)?,
        likes: row.get(6)?,
        dislikes: row.get(7)?,
        user_vote: row.get(8)?,
    })
}

pub fn create(conn: &Connection, post_id: i64, user_id: i64, content: &str) -> StoreResult<i64> {
    if !posts::exists(conn, post_id)? {
        return Err(StoreError::NotFound(format!("post {}", post_id)));
    }
    conn.execute(
        "INSERT INTO comments (post_id, user_id, content) VALUES (?1, ?2, ?3)",
        params![post_id, user_id, content],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find(conn: &Connection, comment_id: i64, viewer: Option<i64>) -> StoreResult<Option<Comment>> {
    let comment = conn
        .query_row(
            &format!("{} WHERE c.id = ?2", COMMENT_SELECT),
            params![viewer, comment_id],
            map_comment,
        )
        .optional()?;
    Ok(comment)
}

/// Comments on a post, newest first, with the viewer's vote on each.
pub fn for_post(conn: &Connection, post_id: i64, viewer: Option<i64>) -> StoreResult<Vec<Comment>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE c.post_id = ?2 ORDER BY c.created_at DESC, c.id DESC",
        COMMENT_SELECT
    ))?;
    let comments = stmt
        .query_map(params![viewer, post_id], map_comment)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(comments)
}

pub fn owner(conn: &Connection, comment_id: i64) -> StoreResult<Option<i64>> {
    let owner = conn
        .query_row(
            "SELECT user_id FROM comments WHERE id = ?1",
            params![comment_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(owner)
}

pub fn exists(conn: &Connection, comment_id: i64) -> StoreResult<bool> {
    Ok(owner(conn, comment_id)?.is_some())
}

pub fn remove_votes(conn: &Connection, comment_id: i64) -> StoreResult<usize> {
    Ok(conn.execute(
        "DELETE FROM comment_votes WHERE comment_id = ?1",
        params![comment_id],
    )?)
}

pub fn remove(conn: &Connection, comment_id: i64) -> StoreResult<usize> {
    Ok(conn.execute("DELETE FROM comments WHERE id = ?1", params![comment_id])?)
}

/// Votes cast on any comment under `post_id`.
pub fn remove_votes_for_post(conn: &Connection, post_id: i64) -> StoreResult<usize> {
    Ok(conn.execute(
        "DELETE FROM comment_votes
         WHERE comment_id IN (SELECT id FROM comments WHERE post_id = ?1)",
        params![post_id],
    )?)
}

pub fn remove_for_post(conn: &Connection, post_id: i64) -> StoreResult<usize> {
    Ok(conn.execute(
        "DELETE FROM comments WHERE post_id = ?1",
        params![post_id],
    )?)
}
