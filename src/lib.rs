// Library exports for the forum server
// This allows integration tests and the binary to share modules

pub mod auth;
pub mod cascade;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;
pub mod validation;
pub mod votes;

use crate::config::Config;
use crate::state::AppState;

/// Open the configured database, apply migrations and assemble shared state.
pub fn app_state(config: Config) -> anyhow::Result<AppState> {
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;
    AppState::new(pool, config)
}
