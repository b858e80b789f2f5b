//! In-memory store implementations.
//!
//! These implementations keep records in a `Vec` behind a
//! `tokio::sync::RwLock`, preserving insertion order. They back the default
//! `in_memory` storage mode and the test suite.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::domain::{Task, TaskId, User};
use crate::infrastructure::{
    CredentialStore, RepositoryError, RepositoryFuture, TaskRepository, password,
};

// =============================================================================
// In-Memory Task Repository
// =============================================================================

/// Task records together with the identifier allocator.
///
/// Both live behind the same lock so allocation and insertion never race.
#[derive(Debug)]
struct TaskTable {
    tasks: Vec<Task>,
    next_id: TaskId,
}

impl TaskTable {
    const fn new() -> Self {
        Self {
            tasks: Vec::new(),
            next_id: TaskId::FIRST,
        }
    }

    fn position(&self, id: TaskId) -> Option<usize> {
        self.tasks.iter().position(|task| task.task_id == id)
    }
}

/// In-memory implementation of `TaskRepository`.
///
/// # Example
///
/// ```ignore
/// let repository = InMemoryTaskRepository::new();
/// let id = repository.next_id().await?;
/// repository.insert(&Task::new(id, "Read a book")).await?;
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryTaskRepository {
    table: Arc<RwLock<TaskTable>>,
}

impl InMemoryTaskRepository {
    /// Creates a new empty in-memory task repository.
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: Arc::new(RwLock::new(TaskTable::new())),
        }
    }
}

impl Default for InMemoryTaskRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(clippy::significant_drop_tightening)]
impl TaskRepository for InMemoryTaskRepository {
    fn list_all(&self) -> RepositoryFuture<Vec<Task>> {
        let table = Arc::clone(&self.table);
        Box::pin(async move {
            let guard = table.read().await;
            Ok(guard.tasks.clone())
        })
    }

    fn find_by_id(&self, id: TaskId) -> RepositoryFuture<Option<Task>> {
        let table = Arc::clone(&self.table);
        Box::pin(async move {
            let guard = table.read().await;
            Ok(guard.tasks.iter().find(|task| task.task_id == id).cloned())
        })
    }

    fn find_by_title(&self, title: &str) -> RepositoryFuture<Option<Task>> {
        let table = Arc::clone(&self.table);
        let title = title.to_owned();
        Box::pin(async move {
            let guard = table.read().await;
            Ok(guard.tasks.iter().find(|task| task.title == title).cloned())
        })
    }

    fn next_id(&self) -> RepositoryFuture<TaskId> {
        let table = Arc::clone(&self.table);
        Box::pin(async move {
            let mut guard = table.write().await;
            let id = guard.next_id;
            guard.next_id = id.next();
            Ok(id)
        })
    }

    fn insert(&self, task: &Task) -> RepositoryFuture<()> {
        let table = Arc::clone(&self.table);
        let task = task.clone();
        Box::pin(async move {
            let mut guard = table.write().await;

            if guard.position(task.task_id).is_some() {
                return Err(RepositoryError::DuplicateId(task.task_id));
            }

            // Keep the allocator ahead of explicitly supplied identifiers
            if task.task_id >= guard.next_id {
                guard.next_id = task.task_id.next();
            }

            guard.tasks.push(task);
            Ok(())
        })
    }

    fn update(&self, task: &Task) -> RepositoryFuture<Task> {
        let table = Arc::clone(&self.table);
        let task = task.clone();
        Box::pin(async move {
            let mut guard = table.write().await;

            let index = guard
                .position(task.task_id)
                .ok_or(RepositoryError::NotFound(task.task_id))?;
            let stored = &mut guard.tasks[index];

            if !stored.has_same_content(&task) {
                stored.title = task.title;
                stored.description = task.description;
                stored.done = task.done;
                stored.revision += 1;
            }

            Ok(stored.clone())
        })
    }

    fn delete(&self, task: &Task) -> RepositoryFuture<()> {
        let table = Arc::clone(&self.table);
        let task = task.clone();
        Box::pin(async move {
            let mut guard = table.write().await;

            let index = guard
                .position(task.task_id)
                .ok_or(RepositoryError::NotFound(task.task_id))?;

            if guard.tasks[index] != task {
                return Err(RepositoryError::StaleRecord { id: task.task_id });
            }

            guard.tasks.remove(index);
            Ok(())
        })
    }

    fn delete_by_id(&self, id: TaskId) -> RepositoryFuture<bool> {
        let table = Arc::clone(&self.table);
        Box::pin(async move {
            let mut guard = table.write().await;
            let removed = guard.position(id).map(|index| guard.tasks.remove(index));
            Ok(removed.is_some())
        })
    }

    fn count(&self) -> RepositoryFuture<u64> {
        let table = Arc::clone(&self.table);
        Box::pin(async move {
            let guard = table.read().await;
            Ok(guard.tasks.len() as u64)
        })
    }
}

// =============================================================================
// In-Memory Credential Store
// =============================================================================

/// In-memory implementation of `CredentialStore`.
#[derive(Debug, Clone)]
pub struct InMemoryCredentialStore {
    users: Arc<RwLock<Vec<User>>>,
    cost: u32,
}

impl InMemoryCredentialStore {
    /// Creates an empty store hashing at [`password::HASH_COST`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_cost(password::HASH_COST)
    }

    /// Creates an empty store hashing at the given bcrypt cost.
    ///
    /// Intended for tests, where the production cost makes every fixture
    /// slow to build.
    #[must_use]
    pub fn with_cost(cost: u32) -> Self {
        Self {
            users: Arc::new(RwLock::new(Vec::new())),
            cost,
        }
    }
}

impl Default for InMemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(clippy::significant_drop_tightening)]
impl CredentialStore for InMemoryCredentialStore {
    fn find_by_username(&self, username: &str) -> RepositoryFuture<Option<User>> {
        let users = Arc::clone(&self.users);
        let username = username.to_owned();
        Box::pin(async move {
            let guard = users.read().await;
            Ok(guard.iter().find(|user| user.username == username).cloned())
        })
    }

    fn create_if_absent(&self, username: &str, password: &str) -> RepositoryFuture<bool> {
        let users = Arc::clone(&self.users);
        let username = username.to_owned();
        let password = password.to_owned();
        let cost = self.cost;
        Box::pin(async move {
            if users.read().await.iter().any(|user| user.username == username) {
                return Ok(false);
            }

            let password_hash = password::hash(password, cost).await?;

            let mut guard = users.write().await;
            // Another caller may have created the user while we were hashing
            if guard.iter().any(|user| user.username == username) {
                return Ok(false);
            }
            guard.push(User::new(username, password_hash));
            Ok(true)
        })
    }

    fn count(&self) -> RepositoryFuture<u64> {
        let users = Arc::clone(&self.users);
        Box::pin(async move { Ok(users.read().await.len() as u64) })
    }
}

// =============================================================================
// Tests
// =============================================================================
