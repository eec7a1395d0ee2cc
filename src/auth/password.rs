use thiserror::Error;

#[derive(Debug, Error)]
#[error("Password hashing failed: {0}")]
pub struct HashError(String);

/// Opaque password hashing capability.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, HashError>;

    /// False on mismatch and on malformed hashes.
    fn verify(&self, password: &str, hash: &str) -> bool;
}

pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl PasswordHasher for BcryptHasher {
    fn hash(&self, password: &str) -> Result<String, HashError> {
        bcrypt::hash(password, self.cost).map_err(|e| HashError(e.to_string()))
    }

    fn verify(&self, password: &str, hash: &str) -> bool {
        bcrypt::verify(password, hash).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hasher = BcryptHasher::new(4);
        let hash = hasher.hash("hunter22").unwrap();
        assert_ne!(hash, "hunter22");
        assert!(hasher.verify("hunter22", &hash));
        assert!(!hasher.verify("hunter23", &hash));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        let hasher = BcryptHasher::new(4);
        assert!(!hasher.verify("anything", "not-a-bcrypt-hash"));
    }

    #[test]
    fn invalid_cost_is_an_error() {
        let hasher = BcryptHasher::new(99);
        assert!(hasher.hash("pw").is_err());
    }
}
