use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use tracing::error;

/// Hashes `plain` with argon2id and a fresh random salt, producing a PHC string.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!(error = %e, "password hashing failed");
            anyhow::anyhow!("password hashing failed: {e}")
        })
}

/// Checks `plain` against a stored PHC string. `Ok(false)` means the password is wrong;
/// `Err` means the stored hash could not be parsed.
pub fn verify_password(plain: &str, stored: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored).map_err(|e| {
        error!(error = %e, "stored password hash is malformed");
        anyhow::anyhow!("malformed password hash: {e}")
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// [`hash_password`] on the blocking pool; argon2 is too slow for a runtime worker.
pub async fn hash_blocking(plain: String) -> anyhow::Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&plain)).await?
}

/// [`verify_password`] on the blocking pool.
pub async fn verify_blocking(plain: String, stored: String) -> anyhow::Result<bool> {
    tokio::task::spawn_blocking(move || verify_password(&plain, &stored)).await?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_hash_is_salted_phc_without_plaintext() {
        let first = hash_password("to-the-moon-42").expect("hash");
        let second = hash_password("to-the-moon-42").expect("hash");
        assert_ne!(first, second);
        assert!(first.starts_with("$argon2id$"));
        assert!(!first.contains("to-the-moon-42"));
    }

    #[test]
    fn only_the_original_password_verifies() {
        let stored = hash_password("to-the-moon-42").expect("hash");
        assert!(verify_password("to-the-moon-42", &stored).unwrap());
        assert!(!verify_password("to-the-moon-43", &stored).unwrap());
        assert!(!verify_password("", &stored).unwrap());
    }

    #[test]
    fn malformed_stored_hash_is_an_error() {
        assert!(verify_password("anything", "plain-text-in-db").is_err());
    }

    #[tokio::test]
    async fn blocking_pool_variants_agree_with_sync_ones() {
        let stored = hash_blocking("hodl-forever".into()).await.expect("hash");
        assert!(verify_password("hodl-forever", &stored).unwrap());
        assert!(verify_blocking("hodl-forever".into(), stored.clone())
            .await
            .unwrap());
        assert!(!verify_blocking("sell-now".into(), stored).await.unwrap());
        assert!(verify_blocking("x".into(), "garbage".into()).await.is_err());
    }
}
