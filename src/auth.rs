//! Administrator credentials: Argon2id hashes and login checks.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use ulid::Ulid;

use crate::observability;
use crate::store::{Store, StoreError};

/// Access level given to the administrator seeded from configuration.
pub const SEEDED_ACCESS_LEVEL: u8 = 3;

/// Hash a plaintext password using Argon2id with a random salt.
///
/// Returns the PHC-formatted hash string.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a plaintext password against a stored PHC-formatted hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed_hash = PasswordHash::new(hash)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Check an email/password pair. `Ok(None)` means the credentials are wrong.
pub async fn authenticate(store: &Store, email: &str, password: &str) -> Result<Option<Ulid>, StoreError> {
    let Some(admin) = store.administrator_by_email(email.trim()).await? else {
        metrics::counter!(observability::AUTH_FAILURES_TOTAL).increment(1);
        return Ok(None);
    };
    let password = password.to_string();
    let hash = admin.password_hash.clone();
    // Argon2 runs on the blocking pool.
    let verified = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;
    match verified {
        Ok(true) => Ok(Some(admin.id)),
        Ok(false) => {
            metrics::counter!(observability::AUTH_FAILURES_TOTAL).increment(1);
            Ok(None)
        }
        Err(e) => {
            tracing::error!(admin_id = %admin.id, error = %e, "stored password hash unreadable");
            Ok(None)
        }
    }
}

/// Create the configured administrator unless one with that email exists.
pub async fn seed_administrator(store: &Store, email: &str, password: &str) -> Result<bool, StoreError> {
    if store.administrator_by_email(email).await?.is_some() {
        return Ok(false);
    }
    let password = password.to_string();
    let hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?
        .map_err(|e| StoreError::Validation(format!("password could not be hashed: {e}")))?;
    store
        .create_administrator("Site", "Administrator", email, hash, SEEDED_ACCESS_LEVEL)
        .await?;
    tracing::info!(email, "administrator seeded");
    Ok(true)
}
