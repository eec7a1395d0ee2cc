//! Explicit multi-table deletes for posts and comments.
//!
//! Every dependent row is removed by its own statement inside one immediate
//! transaction, children before parents. Nothing here depends on
//! `ON DELETE CASCADE`, so the same order works with foreign keys off.

use rusqlite::{Transaction, TransactionBehavior};

use crate::auth::SessionIdentity;
use crate::db::{comments, posts, StoreError};
use crate::error::{AppError, AppResult};
use crate::state::DbPool;

/// A missing target is an ordinary outcome so repeated deletes stay harmless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// Authors may change their own content; admins may change anyone's.
pub fn ensure_can_modify(actor: SessionIdentity, owner_id: i64) -> AppResult<()> {
    if actor.user_id == owner_id || actor.role.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

fn in_transaction<T, E>(
    pool: &DbPool,
    f: impl FnOnce(&Transaction<'_>) -> Result<T, E>,
) -> Result<T, E>
where
    E: From<StoreError>,
{
    let mut conn = pool.get().map_err(StoreError::from)?;
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(StoreError::from)?;
    let value = f(&tx)?;
    tx.commit().map_err(StoreError::from)?;
    Ok(value)
}

fn post_cascade(tx: &Transaction<'_>, post_id: i64) -> Result<DeleteOutcome, StoreError> {
    if !posts::exists(tx, post_id)? {
        return Ok(DeleteOutcome::NotFound);
    }

    let categories = posts::remove_categories(tx, post_id)?;
    let comment_votes = comments::remove_votes_for_post(tx, post_id)?;
    let comment_rows = comments::remove_for_post(tx, post_id)?;
    let votes = posts::remove_votes(tx, post_id)?;
    posts::remove(tx, post_id)?;

    tracing::info!(
        "Deleted post {} ({} categories, {} comments, {} comment votes, {} votes)",
        post_id,
        categories,
        comment_rows,
        comment_votes,
        votes
    );
    Ok(DeleteOutcome::Deleted)
}

fn comment_cascade(tx: &Transaction<'_>, comment_id: i64) -> Result<DeleteOutcome, StoreError> {
    if !comments::exists(tx, comment_id)? {
        return Ok(DeleteOutcome::NotFound);
    }

    let votes = comments::remove_votes(tx, comment_id)?;
    comments::remove(tx, comment_id)?;

    tracing::info!("Deleted comment {} ({} votes)", comment_id, votes);
    Ok(DeleteOutcome::Deleted)
}

/// Removes a post with its category links, comments, comment votes and votes.
pub fn delete_post(pool: &DbPool, post_id: i64) -> Result<DeleteOutcome, StoreError> {
    in_transaction(pool, |tx| post_cascade(tx, post_id))
}

pub fn delete_comment(pool: &DbPool, comment_id: i64) -> Result<DeleteOutcome, StoreError> {
    in_transaction(pool, |tx| comment_cascade(tx, comment_id))
}

/// Ownership check and cascade share one transaction.
pub fn delete_post_as(
    pool: &DbPool,
    actor: SessionIdentity,
    post_id: i64,
) -> AppResult<DeleteOutcome> {
    in_transaction(pool, |tx| {
        let Some(owner_id) = posts::owner(tx, post_id)? else {
            return Ok(DeleteOutcome::NotFound);
        };
        ensure_can_modify(actor, owner_id)?;
        Ok(post_cascade(tx, post_id)?)
    })
}

pub fn delete_comment_as(
    pool: &DbPool,
    actor: SessionIdentity,
    comment_id: i64,
) -> AppResult<DeleteOutcome> {
    in_transaction(pool, |tx| {
        let Some(owner_id) = comments::owner(tx, comment_id)? else {
            return Ok(DeleteOutcome::NotFound);
        };
        ensure_can_modify(actor, owner_id)?;
        Ok(comment_cascade(tx, comment_id)?)
    })
}
