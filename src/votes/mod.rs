//! Like/dislike toggling for posts and comments.
//!
//! Each call reads the caller's current vote, picks the next state with
//! [`domain::transition`] and applies it as one write, all inside a single
//! immediate transaction, so concurrent toggles by the same user serialize.
//! Counts are never cached: [`stats`] re-aggregates the vote table each time.

pub mod domain;
pub mod repository;

pub use domain::{Vote, VoteStats, VoteTarget};

use rusqlite::TransactionBehavior;

use crate::db::{StoreError, StoreResult};
use crate::state::DbPool;

pub fn like(pool: &DbPool, user_id: i64, target: VoteTarget) -> StoreResult<VoteStats> {
    cast(pool, user_id, target, Vote::Like)
}

pub fn dislike(pool: &DbPool, user_id: i64, target: VoteTarget) -> StoreResult<VoteStats> {
    cast(pool, user_id, target, Vote::Dislike)
}

fn cast(pool: &DbPool, user_id: i64, target: VoteTarget, action: Vote) -> StoreResult<VoteStats> {
    let mut conn = pool.get()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    if !repository::target_exists(&tx, target)? {
        return Err(StoreError::NotFound(target.to_string()));
    }

    let current = repository::current(&tx, user_id, target)?;
    let change = domain::transition(current, action);
    repository::apply(&tx, user_id, target, change)?;
    let stats = repository::stats(&tx, target, Some(user_id))?;
    tx.commit()?;
    tracing::debug!(
        "User {} voted {:?} on {}: {:?} -> {:?}",
        user_id,
        action,
        target,
        current,
        change.result()
    );
    Ok(stats)
}

pub fn current_vote(pool: &DbPool, user_id: i64, target: VoteTarget) -> StoreResult<Option<Vote>> {
    let conn = pool.get()?;
    repository::current(&conn, user_id, target)
}

/// Likes, dislikes and the caller's own vote. A missing target is `NotFound`,
/// so a deleted post never reports empty counts.
pub fn stats(pool: &DbPool, target: VoteTarget, caller: Option<i64>) -> StoreResult<VoteStats> {
    let conn = pool.get()?;
    if !repository::target_exists(&conn, target)? {
        return Err(StoreError::NotFound(target.to_string()));
    }
    repository::stats(&conn, target, caller)
}
