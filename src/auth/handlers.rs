use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::db::models::Role;
use crate::db::{posts, users};
use crate::error::{AppError, AppResult};
use crate::extractors::{session_token, CurrentUser, MaybeUser};
use crate::routes::posts::PostView;
use crate::state::AppState;
use crate::validation;

fn session_cookie(name: &str, token: &str, max_age_secs: i64) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        name, token, max_age_secs
    )
}

fn clear_session_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", name)
}

async fn hash_password(state: &AppState, password: String) -> AppResult<String> {
    let hasher = state.hasher.clone();
    let hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
        .await
        .map_err(|e| AppError::Internal(format!("Hashing task failed: {}", e)))??;
    Ok(hash)
}

async fn verify_password(state: &AppState, password: String, hash: String) -> AppResult<bool> {
    let hasher = state.hasher.clone();
    tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("Verification task failed: {}", e)))
}

#[derive(Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// POST /register
pub async fn register(
    State(state): State<AppState>,
    Form(form): Form<RegisterForm>,
) -> AppResult<Response> {
    let reg = validation::registration(&form.email, &form.username, &form.password)
        .map_err(AppError::BadRequest)?;

    // Reject duplicates before paying for a bcrypt hash.
    {
        let conn = state.db.get()?;
        if users::email_exists(&conn, &reg.email)? {
            return Err(AppError::Conflict("Email already taken".into()));
        }
        if users::username_exists(&conn, &reg.username)? {
            return Err(AppError::Conflict("Username already taken".into()));
        }
    }

    let hash = hash_password(&state, reg.password).await?;
    let conn = state.db.get()?;
    let user_id = users::register(&conn, &reg.email, &reg.username, &hash)?;
    tracing::info!("Registered user {} ({})", user_id, reg.username);

    Ok((
        StatusCode::CREATED,
        Json(json!({ "id": user_id, "username": reg.username })),
    )
        .into_response())
}

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// POST /login - any mismatch yields the same 401.
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let email = form.email.trim();
    if email.is_empty() || form.password.is_empty() {
        return Err(AppError::BadRequest("Email and password are required".into()));
    }

    let user = {
        let conn = state.db.get()?;
        users::find_by_email(&conn, email)?
    };
    let user = user.ok_or(AppError::InvalidCredentials)?;

    if !verify_password(&state, form.password, user.password_hash.clone()).await? {
        tracing::debug!("Failed login for user {}", user.id);
        return Err(AppError::InvalidCredentials);
    }

    let token = state.sessions.create(user.id, user.role)?;
    let cookie = session_cookie(
        &state.config.auth.cookie_name,
        &token,
        state.sessions.lifetime().num_seconds(),
    );

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "id": user.id, "username": user.username, "role": user.role })),
    )
        .into_response())
}

/// POST /logout - clears the cookie even when no session was found.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let name = &state.config.auth.cookie_name;
    if let Some(token) = session_token(&headers, name) {
        state.sessions.end(token);
    }

    (
        StatusCode::OK,
        [(header::SET_COOKIE, clear_session_cookie(name))],
        Json(json!({ "status": "ok" })),
    )
        .into_response()
}

#[derive(Deserialize)]
pub struct ProfileQuery {
    pub user_id: Option<i64>,
}

#[derive(Serialize)]
pub struct ProfileView {
    pub id: i64,
    pub username: String,
    pub display_name: Option<String>,
    pub role: Role,
    pub created_at: String,
    pub is_own: bool,
    pub posts: Vec<PostView>,
}

/// GET /profile?user_id= - without an id, the caller's own profile.
pub async fn profile(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    Query(query): Query<ProfileQuery>,
) -> AppResult<Json<ProfileView>> {
    let viewer = maybe_user.id();
    let user_id = query.user_id.or(viewer).ok_or(AppError::Unauthorized)?;

    let conn = state.db.get()?;
    let user = users::find_by_id(&conn, user_id)?.ok_or(AppError::NotFound)?;

    let authored = posts::by_author(&conn, user.id, viewer)?;
    let views = PostView::with_comments(&conn, authored, viewer)?;

    Ok(Json(ProfileView {
        id: user.id,
        username: user.username,
        display_name: user.display_name,
        role: user.role,
        created_at: user.created_at,
        is_own: viewer == Some(user.id),
        posts: views,
    }))
}

#[derive(Deserialize)]
pub struct UpdateProfileForm {
    pub username: Option<String>,
    pub display_name: Option<String>,
}

/// POST /update-profile - blank fields keep their current value.
pub async fn update_profile(
    State(state): State<AppState>,
    current: CurrentUser,
    Form(form): Form<UpdateProfileForm>,
) -> AppResult<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    let user = users::find_by_id(&conn, current.id)?.ok_or(AppError::NotFound)?;

    let username =
        validation::optional_field(form.username.as_deref()).unwrap_or(user.username);
    let display_name =
        validation::optional_field(form.display_name.as_deref()).or(user.display_name);

    users::update_profile(&conn, user.id, &username, display_name.as_deref())?;
    tracing::debug!("Updated profile for user {}", user.id);

    Ok(Json(json!({
        "id": user.id,
        "username": username,
        "display_name": display_name,
    })))
}
