/// Password Hashing and Verification
///
/// bcrypt with a configurable cost. Hashes are written with the `$2y$` prefix
/// so they stay interchangeable with PHP's `password_hash`. The work runs on
/// the blocking thread pool, never on the request reactor.

use bcrypt::{hash_with_result, verify, Version};

use crate::error::AppError;

/// Hash a password using bcrypt
///
/// # Errors
/// Returns error if the cost is out of range or hashing fails
pub fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    hash_with_result(password, cost)
        .map(|parts| parts.format_for_version(Version::TwoY))
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against its hash
///
/// # Errors
/// Returns error if the stored hash is not a valid bcrypt hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    verify(password, hash)
        .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))
}

/// Async password hasher shared by the authentication flows
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    cost: u32,
    /// Verified against when no user matches, so unknown emails cost as much
    /// time as wrong passwords.
    dummy_hash: String,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Result<Self, AppError> {
        let dummy_hash = hash_password("simple-pos-dummy-password", cost)?;
        Ok(Self { cost, dummy_hash })
    }

    pub async fn hash(&self, password: &str) -> Result<String, AppError> {
        let password = password.to_owned();
        let cost = self.cost;
        tokio::task::spawn_blocking(move || hash_password(&password, cost))
            .await
            .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?
    }

    pub async fn verify(&self, password: &str, hash: &str) -> Result<bool, AppError> {
        let password = password.to_owned();
        let hash = hash.to_owned();
        tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| AppError::Internal(format!("Password verification task failed: {}", e)))?
    }

    /// Burn one verification's worth of work; always reports a mismatch.
    pub async fn verify_dummy(&self, password: &str) -> Result<bool, AppError> {
        self.verify(password, &self.dummy_hash).await.map(|_| false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_COST: u32 = 4;

    #[test]
    fn test_hash_password() {
        let password = "secret123";
        let hash = hash_password(password, TEST_COST).expect("Failed to hash password");

        assert_ne!(password, hash);
        assert!(hash.starts_with("$2y$04$"));
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("secret123", TEST_COST).expect("Failed to hash password");

        assert!(verify_password("secret123", &hash).expect("Failed to verify password"));
        assert!(!verify_password("secret124", &hash).expect("Failed to verify password"));
    }

    #[test]
    fn test_verifies_other_bcrypt_prefixes() {
        let hash = bcrypt::hash("secret123", TEST_COST).expect("Failed to hash password");
        assert!(hash.starts_with("$2b$"));
        assert!(verify_password("secret123", &hash).expect("Failed to verify password"));
    }

    #[test]
    fn test_invalid_hash_is_an_error() {
        assert!(verify_password("secret123", "not-a-hash").is_err());
    }

    #[test]
    fn test_cost_out_of_range() {
        assert!(hash_password("secret123", 2).is_err());
    }

    #[tokio::test]
    async fn test_async_hasher_round_trip() {
        let hasher = PasswordHasher::new(TEST_COST).expect("hasher");
        let hash = hasher.hash("secret123").await.expect("hash");

        assert!(hasher.verify("secret123", &hash).await.expect("verify"));
        assert!(!hasher.verify("wrong", &hash).await.expect("verify"));
        assert!(!hasher.verify_dummy("simple-pos-dummy-password").await.expect("verify"));
    }
}
