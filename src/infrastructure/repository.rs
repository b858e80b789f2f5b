//! Store traits for tasks and user credentials.
//!
//! Every method returns a boxed `'static` future so the traits stay
//! object-safe and can be shared as `Arc<dyn ...>` between request handlers.
//! The future owns everything it needs; nothing borrowed from the caller is
//! held across an await.

use futures::future::BoxFuture;
use thiserror::Error;

use super::password;
use crate::domain::{Task, TaskId, User};

// =============================================================================
// Repository Error
// =============================================================================

/// Errors that can occur during store operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// No task with the given identifier is stored.
    #[error("Task not found: {0}")]
    NotFound(TaskId),

    /// A task with the given identifier is already stored.
    #[error("Task already exists: {0}")]
    DuplicateId(TaskId),

    /// The stored task differs from the copy supplied by the caller.
    #[error("Stored task {id} does not match the supplied record")]
    StaleRecord { id: TaskId },

    /// Database connection or query error.
    #[error("Database error: {0}")]
    Database(String),

    /// A stored row could not be converted into a domain value.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Password hashing failed.
    #[error("Hashing error: {0}")]
    Hashing(String),
}

/// Future returned by every store operation.
pub type RepositoryFuture<T> = BoxFuture<'static, Result<T, RepositoryError>>;

// =============================================================================
// Task Repository
// =============================================================================

/// Store for task records.
///
/// Each operation is atomic with respect to a single task.
pub trait TaskRepository: Send + Sync {
    /// Returns every stored task in insertion order.
    fn list_all(&self) -> RepositoryFuture<Vec<Task>>;

    /// Finds a task by its identifier.
    fn find_by_id(&self, id: TaskId) -> RepositoryFuture<Option<Task>>;

    /// Finds the first task, in store order, whose title equals `title`.
    ///
    /// Titles are not unique.
    fn find_by_title(&self, title: &str) -> RepositoryFuture<Option<Task>>;

    /// Allocates a fresh identifier.
    ///
    /// Identifiers are never handed out twice and are always greater than
    /// any identifier inserted so far. The first identifier of an empty store
    /// is [`TaskId::FIRST`].
    fn next_id(&self) -> RepositoryFuture<TaskId>;

    /// Stores a fully-formed task under the identifier it carries.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DuplicateId` if a task with the same
    /// identifier is already stored.
    fn insert(&self, task: &Task) -> RepositoryFuture<()>;

    /// Replaces the title, description and done flag of the stored task with
    /// the same identifier and returns the stored result.
    ///
    /// When nothing differs, the stored task is left untouched and its
    /// revision is unchanged. Otherwise the revision is incremented.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no task with that identifier
    /// is stored.
    fn update(&self, task: &Task) -> RepositoryFuture<Task>;

    /// Deletes the stored task only if it is identical to `task`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no task with that identifier is
    /// stored, or `RepositoryError::StaleRecord` if the stored task differs
    /// from `task` in any field, revision included.
    fn delete(&self, task: &Task) -> RepositoryFuture<()>;

    /// Deletes a task by identifier without comparing its contents.
    ///
    /// Returns `true` if a task was removed.
    fn delete_by_id(&self, id: TaskId) -> RepositoryFuture<bool>;

    /// Counts all stored tasks.
    fn count(&self) -> RepositoryFuture<u64>;
}

// =============================================================================
// Credential Store
// =============================================================================

/// Store for usernames and their password hashes.
pub trait CredentialStore: Send + Sync {
    /// Finds a user by exact username.
    fn find_by_username(&self, username: &str) -> RepositoryFuture<Option<User>>;

    /// Hashes `password` and stores a new user unless `username` is taken.
    ///
    /// Returns `true` if a user was created. An existing user is left as is;
    /// there is no way to change a password through this trait.
    fn create_if_absent(&self, username: &str, password: &str) -> RepositoryFuture<bool>;

    /// Counts all stored users.
    fn count(&self) -> RepositoryFuture<u64>;

    /// Checks `password` against the stored hash for `username`.
    ///
    /// An unknown username yields `Ok(false)`, not an error.
    fn verify(&self, username: &str, password: &str) -> RepositoryFuture<bool> {
        let lookup = self.find_by_username(username);
        let password = password.to_owned();
        Box::pin(async move {
            match lookup.await? {
                Some(user) => password::verify(password, user.password_hash).await,
                None => Ok(false),
            }
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
