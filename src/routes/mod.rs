pub mod auth;
pub mod comments;
pub mod home;
pub mod posts;
pub mod votes;

use axum::routing::get;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::state::AppState;

/// The full application: every route, a 404 fallback, panic recovery and request tracing.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home::index))
        .merge(auth::router())
        .merge(posts::router())
        .merge(comments::router())
        .merge(votes::router())
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CatchPanicLayer::new()),
        )
        .with_state(state)
}

async fn not_found() -> AppError {
    AppError::NotFound
}
