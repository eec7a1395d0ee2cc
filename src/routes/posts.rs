use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::cascade::{self, DeleteOutcome};
use crate::db::models::{Comment, Post};
use crate::db::posts::PostDraft;
use crate::db::{comments, posts, StoreResult};
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::state::AppState;
use crate::validation;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/post", get(view_post))
        .route("/create-post", post(create_post))
        .route("/edit-post", post(edit_post))
        .route("/delete-post", delete(delete_post))
}

/// A post with its comments, newest comment first.
#[derive(Serialize)]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub comments: Vec<Comment>,
}

impl PostView {
    /// Pair each post with its comments, vote counts seen as `viewer`.
    pub fn with_comments(
        conn: &rusqlite::Connection,
        posts: Vec<Post>,
        viewer: Option<i64>,
    ) -> StoreResult<Vec<PostView>> {
        posts
            .into_iter()
            .map(|post| {
                let comments = comments::for_post(conn, post.id, viewer)?;
                Ok(PostView { post, comments })
            })
            .collect()
    }
}

#[derive(Deserialize)]
pub struct PostQuery {
    pub post_id: i64,
}

#[derive(Deserialize)]
pub struct PostPayload {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub image_url: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
}

impl PostPayload {
    fn into_draft(self) -> AppResult<PostDraft> {
        let (title, content) =
            validation::post_text(&self.title, &self.content).map_err(AppError::BadRequest)?;
        let categories =
            validation::categories(&self.categories).map_err(AppError::BadRequest)?;
        Ok(PostDraft {
            title,
            content,
            image_url: validation::optional_field(self.image_url.as_deref()),
            categories,
        })
    }
}

#[derive(Deserialize)]
pub struct EditPostPayload {
    pub post_id: i64,
    #[serde(flatten)]
    pub fields: PostPayload,
}

async fn view_post(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    Query(query): Query<PostQuery>,
) -> AppResult<Json<PostView>> {
    let viewer = maybe_user.id();
    let conn = state.db.get()?;
    let post = posts::find(&conn, query.post_id, viewer)?.ok_or(AppError::NotFound)?;
    let comments = comments::for_post(&conn, post.id, viewer)?;
    Ok(Json(PostView { post, comments }))
}

async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<PostPayload>,
) -> AppResult<Response> {
    let draft = payload.into_draft()?;
    let mut conn = state.db.get()?;
    let post_id = posts::create(&mut conn, user.id, &draft)?;
    tracing::info!("User {} created post {}", user.id, post_id);

    Ok((StatusCode::CREATED, Json(json!({ "id": post_id }))).into_response())
}

/// Only the author may edit; admins can delete but not rewrite.
async fn edit_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<EditPostPayload>,
) -> AppResult<Json<serde_json::Value>> {
    let post_id = payload.post_id;
    let draft = payload.fields.into_draft()?;

    let mut conn = state.db.get()?;
    let owner_id = posts::owner(&conn, post_id)?.ok_or(AppError::NotFound)?;
    if owner_id != user.id {
        return Err(AppError::Forbidden);
    }
    posts::update(&mut conn, post_id, &draft)?;
    tracing::info!("User {} edited post {}", user.id, post_id);

    Ok(Json(json!({ "id": post_id })))
}

async fn delete_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<PostQuery>,
) -> AppResult<Json<serde_json::Value>> {
    match cascade::delete_post_as(&state.db, user.identity(), query.post_id)? {
        DeleteOutcome::Deleted => Ok(Json(json!({ "status": "deleted" }))),
        DeleteOutcome::NotFound => Err(AppError::NotFound),
    }
}
