//! User domain model.

/// An API user and the bcrypt hash of their password.
///
/// Users are provisioned at startup and never modified through the API.
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    /// Unique login name.
    pub username: String,
    /// Salted bcrypt hash of the password.
    pub password_hash: String,
}

impl User {
    /// Creates a user record from an already computed hash.
    #[must_use]
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password_hash: password_hash.into(),
        }
    }
}

impl std::fmt::Debug for User {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("User")
            .field("username", &self.username)
            .field("password_hash", &"<redacted>")
            .finish()
    }
}
