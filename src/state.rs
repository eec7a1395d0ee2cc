use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth::{BcryptHasher, PasswordHasher, SessionManager};
use crate::config::Config;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub sessions: SessionManager,
    pub hasher: Arc<dyn PasswordHasher>,
}

impl AppState {
    pub fn new(db: DbPool, config: Config) -> anyhow::Result<Self> {
        let sessions = SessionManager::new(db.clone(), config.auth.session_lifetime()?);
        let hasher = Arc::new(BcryptHasher::new(config.auth.bcrypt_cost));
        Ok(Self {
            db,
            config,
            sessions,
            hasher,
        })
    }
}
