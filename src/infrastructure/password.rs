//! bcrypt hashing helpers.
//!
//! bcrypt is deliberately slow, so both helpers run on the blocking thread
//! pool instead of a runtime worker.

use tokio::task;

use super::RepositoryError;

/// Work factor used for every stored password.
pub const HASH_COST: u32 = 12;

/// Hashes `password` with a fresh salt at the given cost.
///
/// # Errors
///
/// Returns `RepositoryError::Hashing` if the cost is out of range or the
/// blocking task fails.
pub async fn hash(password: String, cost: u32) -> Result<String, RepositoryError> {
    task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|error| RepositoryError::Hashing(error.to_string()))?
        .map_err(|error| RepositoryError::Hashing(error.to_string()))
}

/// Compares `password` against a stored bcrypt hash.
///
/// A hash that bcrypt cannot parse never matches; it is logged and reported
/// as `Ok(false)`.
///
/// # Errors
///
/// Returns `RepositoryError::Hashing` if the blocking task fails.
pub async fn verify(password: String, password_hash: String) -> Result<bool, RepositoryError> {
    let outcome = task::spawn_blocking(move || bcrypt::verify(password, &password_hash))
        .await
        .map_err(|error| RepositoryError::Hashing(error.to_string()))?;

    match outcome {
        Ok(matches) => Ok(matches),
        Err(error) => {
            tracing::warn!(%error, "Stored password hash could not be parsed");
            Ok(false)
        }
    }
}
