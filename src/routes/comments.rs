use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, post};
use axum::{Form, Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::cascade::{self, DeleteOutcome};
use crate::db::comments;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;
use crate::validation;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/comment", post(create_comment))
        .route("/delete-comment", delete(delete_comment))
}

#[derive(Deserialize)]
pub struct CommentForm {
    pub post_id: i64,
    #[serde(default)]
    pub content: String,
}

#[derive(Deserialize)]
pub struct CommentQuery {
    pub comment_id: i64,
}

async fn create_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<CommentForm>,
) -> AppResult<Response> {
    let content = validation::comment(&form.content).map_err(AppError::BadRequest)?;
    let conn = state.db.get()?;
    let comment_id = comments::create(&conn, form.post_id, user.id, &content)?;
    tracing::debug!(
        "User {} commented {} on post {}",
        user.id,
        comment_id,
        form.post_id
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({ "id": comment_id, "post_id": form.post_id })),
    )
        .into_response())
}

async fn delete_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<CommentQuery>,
) -> AppResult<Json<serde_json::Value>> {
    match cascade::delete_comment_as(&state.db, user.identity(), query.comment_id)? {
        DeleteOutcome::Deleted => Ok(Json(json!({ "status": "deleted" }))),
        DeleteOutcome::NotFound => Err(AppError::NotFound),
    }
}
