use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::models::{Category, PostFilter};
use crate::db::posts;
use crate::error::{AppError, AppResult};
use crate::extractors::MaybeUser;
use crate::routes::posts::PostView;
use crate::state::AppState;

#[derive(Deserialize, Default)]
pub struct FeedQuery {
    pub filter: Option<String>,
    pub category: Option<String>,
}

#[derive(Serialize)]
pub struct Feed {
    pub filter: PostFilter,
    pub category: Option<Category>,
    pub categories: Vec<Category>,
    pub logged_in: bool,
    pub posts: Vec<PostView>,
}

/// GET / - posts with their comments. Personal filters need a session, an
/// empty category means all.
pub async fn index(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    Query(query): Query<FeedQuery>,
) -> AppResult<Json<Feed>> {
    let filter: PostFilter = query
        .filter
        .as_deref()
        .unwrap_or_default()
        .parse()
        .map_err(AppError::BadRequest)?;

    let viewer = maybe_user.id();
    if filter.requires_user() && viewer.is_none() {
        return Err(AppError::Unauthorized);
    }

    let category = match query.category.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(name) => Some(name.parse::<Category>().map_err(AppError::BadRequest)?),
    };

    let conn = state.db.get()?;
    let listed = posts::list(&conn, viewer, filter, category)?;
    let posts = PostView::with_comments(&conn, listed, viewer)?;
    tracing::debug!("Feed {} returned {} posts", filter.as_str(), posts.len());

    Ok(Json(Feed {
        filter,
        category,
        categories: Category::ALL.to_vec(),
        logged_in: viewer.is_some(),
        posts,
    }))
}
