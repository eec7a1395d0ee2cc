use axum::extract::{Query, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::state::AppState;
use crate::votes::{self, Vote, VoteStats, VoteTarget};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/like", post(like_post))
        .route("/dislike", post(dislike_post))
        .route("/comment-like", post(like_comment))
        .route("/comment-dislike", post(dislike_comment))
}

#[derive(Deserialize)]
pub struct PostVoteQuery {
    pub post_id: i64,
}

#[derive(Deserialize)]
pub struct CommentVoteQuery {
    pub comment_id: i64,
}

/// `user_vote` is 1, -1, or 0 for no vote.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct VoteResponse {
    pub likes: i64,
    pub dislikes: i64,
    pub user_vote: i64,
}

impl From<VoteStats> for VoteResponse {
    fn from(stats: VoteStats) -> Self {
        Self {
            likes: stats.likes,
            dislikes: stats.dislikes,
            user_vote: stats.caller_vote.as_ref().map_or(0, Vote::value),
        }
    }
}

async fn like_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(q): Query<PostVoteQuery>,
) -> AppResult<Json<VoteResponse>> {
    let stats = votes::like(&state.db, user.id, VoteTarget::Post(q.post_id))?;
    Ok(Json(stats.into()))
}

async fn dislike_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(q): Query<PostVoteQuery>,
) -> AppResult<Json<VoteResponse>> {
    let stats = votes::dislike(&state.db, user.id, VoteTarget::Post(q.post_id))?;
    Ok(Json(stats.into()))
}

async fn like_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(q): Query<CommentVoteQuery>,
) -> AppResult<Json<VoteResponse>> {
    let stats = votes::like(&state.db, user.id, VoteTarget::Comment(q.comment_id))?;
    Ok(Json(stats.into()))
}

async fn dislike_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(q): Query<CommentVoteQuery>,
) -> AppResult<Json<VoteResponse>> {
    let stats = votes::dislike(&state.db, user.id, VoteTarget::Comment(q.comment_id))?;
    Ok(Json(stats.into()))
}
