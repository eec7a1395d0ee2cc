// SQLite access for vote rows. Table and column names come from VoteTarget, never from input.
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::StoreResult;
use crate::votes::domain::{Vote, VoteChange, VoteStats, VoteTarget};

pub fn target_exists(conn: &Connection, target: VoteTarget) -> StoreResult<bool> {
    let exists = conn.query_row(
        &format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1)",
            target.target_table()
        ),
        params![target.id()],
        |row| row.get(0),
    )?;
    Ok(exists)
}

pub fn current(conn: &Connection, user_id: i64, target: VoteTarget) -> StoreResult<Option<Vote>> {
    let value: Option<i64> = conn
        .query_row(
            &format!(
                "SELECT vote FROM {} WHERE user_id = ?1 AND {} = ?2",
                target.vote_table(),
                target.key_column()
            ),
            params![user_id, target.id()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value.and_then(Vote::from_value))
}

/// Insert and update share one upsert keyed by (user, target).
pub fn apply(
    conn: &Connection,
    user_id: i64,
    target: VoteTarget,
    change: VoteChange,
) -> StoreResult<()> {
    match change {
        VoteChange::Insert(vote) | VoteChange::Update(vote) => {
            conn.execute(
                &format!(
                    "INSERT INTO {table} (user_id, {key}, vote) VALUES (?1, ?2, ?3)
                     ON CONFLICT(user_id, {key}) DO UPDATE SET vote = excluded.vote",
                    table = target.vote_table(),
                    key = target.key_column()
                ),
                params![user_id, target.id(), vote.value()],
            )?;
        }
        VoteChange::Delete => {
            conn.execute(
                &format!(
                    "DELETE FROM {} WHERE user_id = ?1 AND {} = ?2",
                    target.vote_table(),
                    target.key_column()
                ),
                params![user_id, target.id()],
            )?;
        }
    }
    Ok(())
}

pub fn stats(conn: &Connection, target: VoteTarget, caller: Option<i64>) -> StoreResult<VoteStats> {
    let (likes, dislikes, caller_value): (i64, i64, Option<i64>) = conn.query_row(
        &format!(
            "SELECT COALESCE(SUM(CASE WHEN vote = 1 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN vote = -1 THEN 1 ELSE 0 END), 0),
                    (SELECT vote FROM {table} WHERE user_id = ?1 AND {key} = ?2)
             FROM {table} WHERE {key} = ?2",
            table = target.vote_table(),
            key = target.key_column()
        ),
        params![caller, target.id()],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;

    Ok(VoteStats {
        likes,
        dislikes,
        caller_vote: caller_value.and_then(Vote::from_value),
    })
}

/// Raw row count for (user, target); at most one by the primary key.
#[cfg(test)]
pub fn row_count(conn: &Connection, user_id: i64, target: VoteTarget) -> StoreResult<i64> {
    let count = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM {} WHERE user_id = ?1 AND {} = ?2",
            target.vote_table(),
            target.key_column()
        ),
        params![user_id, target.id()],
        |row| row.get(0),
    )?;
    Ok(count)
}
