pub mod handlers;
pub mod password;
pub mod session;

pub use password::{BcryptHasher, PasswordHasher};
pub use session::{SessionIdentity, SessionManager};
