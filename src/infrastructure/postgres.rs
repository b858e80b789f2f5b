//! `PostgreSQL` store implementations.
//!
//! Uses `sqlx` with a shared `PgPool`. Each operation is a single statement or
//! a short transaction holding a row lock, so every write is atomic per task.
//!
//! # Table Schema
//!
//! ```sql
//! CREATE SEQUENCE IF NOT EXISTS task_ids;
//!
//! CREATE TABLE IF NOT EXISTS tasks (
//!     id BIGINT PRIMARY KEY,
//!     title TEXT NOT NULL,
//!     description TEXT NOT NULL DEFAULT '',
//!     done BOOLEAN NOT NULL DEFAULT FALSE,
//!     revision BIGINT NOT NULL DEFAULT 1,
//!     position BIGSERIAL NOT NULL
//! );
//!
//! CREATE TABLE IF NOT EXISTS users (
//!     username TEXT PRIMARY KEY,
//!     password_hash TEXT NOT NULL
//! );
//! ```
//!
//! `position` records insertion order; `task_ids` allocates identifiers.

use sqlx::PgPool;

use crate::domain::{Task, TaskId, User};
use crate::infrastructure::{
    CredentialStore, RepositoryError, RepositoryFuture, TaskRepository, password,
};

/// Statements creating the schema above, run once at startup.
const SCHEMA_STATEMENTS: [&str; 3] = [
    "CREATE SEQUENCE IF NOT EXISTS task_ids",
    "CREATE TABLE IF NOT EXISTS tasks (\
         id BIGINT PRIMARY KEY, \
         title TEXT NOT NULL, \
         description TEXT NOT NULL DEFAULT '', \
         done BOOLEAN NOT NULL DEFAULT FALSE, \
         revision BIGINT NOT NULL DEFAULT 1, \
         position BIGSERIAL NOT NULL)",
    "CREATE TABLE IF NOT EXISTS users (\
         username TEXT PRIMARY KEY, \
         password_hash TEXT NOT NULL)",
];

const TASK_COLUMNS: &str = "id, title, description, done, revision";

/// Creates the tables and sequence if they do not exist yet.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if any statement fails.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), RepositoryError> {
    for statement in SCHEMA_STATEMENTS {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(database_error)?;
    }
    Ok(())
}

// =============================================================================
// Row Conversion
// =============================================================================

/// Raw `tasks` row as returned by `SELECT id, title, description, done, revision`.
type TaskRow = (i64, String, String, bool, i64);

fn database_error(error: sqlx::Error) -> RepositoryError {
    RepositoryError::Database(error.to_string())
}

fn task_from_row((id, title, description, done, revision): TaskRow) -> Result<Task, RepositoryError> {
    let revision = u64::try_from(revision).map_err(|_| {
        RepositoryError::Serialization(format!("task {id} has negative revision {revision}"))
    })?;

    Ok(Task {
        task_id: TaskId::new(id),
        title,
        description,
        done,
        revision,
    })
}

fn revision_column(task: &Task) -> Result<i64, RepositoryError> {
    i64::try_from(task.revision).map_err(|_| {
        RepositoryError::Serialization(format!(
            "task {} revision {} exceeds column range",
            task.task_id, task.revision
        ))
    })
}

// =============================================================================
// PostgreSQL Task Repository
// =============================================================================

/// `PostgreSQL` implementation of `TaskRepository`.
#[derive(Debug, Clone)]
pub struct PostgresTaskRepository {
    pool: PgPool,
}

impl PostgresTaskRepository {
    /// Creates a new task repository using the given connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl TaskRepository for PostgresTaskRepository {
    fn list_all(&self) -> RepositoryFuture<Vec<Task>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let rows: Vec<TaskRow> =
                sqlx::query_as(&format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY position"))
                    .fetch_all(&pool)
                    .await
                    .map_err(database_error)?;

            rows.into_iter().map(task_from_row).collect()
        })
    }

    fn find_by_id(&self, id: TaskId) -> RepositoryFuture<Option<Task>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let row: Option<TaskRow> =
                sqlx::query_as(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1"))
                    .bind(id.value())
                    .fetch_optional(&pool)
                    .await
                    .map_err(database_error)?;

            row.map(task_from_row).transpose()
        })
    }

    fn find_by_title(&self, title: &str) -> RepositoryFuture<Option<Task>> {
        let pool = self.pool.clone();
        let title = title.to_owned();
        Box::pin(async move {
            let row: Option<TaskRow> = sqlx::query_as(&format!(
                "SELECT {TASK_COLUMNS} FROM tasks WHERE title = $1 ORDER BY position LIMIT 1"
            ))
            .bind(&title)
            .fetch_optional(&pool)
            .await
            .map_err(database_error)?;

            row.map(task_from_row).transpose()
        })
    }

    fn next_id(&self) -> RepositoryFuture<TaskId> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let (id,): (i64,) = sqlx::query_as("SELECT nextval('task_ids')")
                .fetch_one(&pool)
                .await
                .map_err(database_error)?;

            Ok(TaskId::new(id))
        })
    }

    fn insert(&self, task: &Task) -> RepositoryFuture<()> {
        let pool = self.pool.clone();
        let task = task.clone();
        Box::pin(async move {
            let revision = revision_column(&task)?;

            let mut transaction = pool.begin().await.map_err(database_error)?;

            let result = sqlx::query(
                "INSERT INTO tasks (id, title, description, done, revision) \
                 VALUES ($1, $2, $3, $4, $5) \
                 ON CONFLICT (id) DO NOTHING",
            )
            .bind(task.task_id.value())
            .bind(&task.title)
            .bind(&task.description)
            .bind(task.done)
            .bind(revision)
            .execute(&mut *transaction)
            .await
            .map_err(database_error)?;

            if result.rows_affected() == 0 {
                return Err(RepositoryError::DuplicateId(task.task_id));
            }

            // Move the sequence past explicitly supplied identifiers
            sqlx::query(
                "SELECT setval('task_ids', $1) FROM task_ids \
                 WHERE $1 > CASE WHEN is_called THEN last_value ELSE last_value - 1 END",
            )
            .bind(task.task_id.value())
            .execute(&mut *transaction)
            .await
            .map_err(database_error)?;

            transaction.commit().await.map_err(database_error)?;
            Ok(())
        })
    }

    fn update(&self, task: &Task) -> RepositoryFuture<Task> {
        let pool = self.pool.clone();
        let task = task.clone();
        Box::pin(async move {
            let mut transaction = pool.begin().await.map_err(database_error)?;

            let row: Option<TaskRow> = sqlx::query_as(&format!(
                "SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1 FOR UPDATE"
            ))
            .bind(task.task_id.value())
            .fetch_optional(&mut *transaction)
            .await
            .map_err(database_error)?;

            let stored = row
                .map(task_from_row)
                .transpose()?
                .ok_or(RepositoryError::NotFound(task.task_id))?;

            if stored.has_same_content(&task) {
                transaction.commit().await.map_err(database_error)?;
                return Ok(stored);
            }

            let row: TaskRow = sqlx::query_as(&format!(
                "UPDATE tasks SET title = $2, description = $3, done = $4, \
                 revision = revision + 1 WHERE id = $1 RETURNING {TASK_COLUMNS}"
            ))
            .bind(task.task_id.value())
            .bind(&task.title)
            .bind(&task.description)
            .bind(task.done)
            .fetch_one(&mut *transaction)
            .await
            .map_err(database_error)?;

            transaction.commit().await.map_err(database_error)?;

            task_from_row(row)
        })
    }

    fn delete(&self, task: &Task) -> RepositoryFuture<()> {
        let pool = self.pool.clone();
        let task = task.clone();
        Box::pin(async move {
            let revision = revision_column(&task)?;

            let result = sqlx::query(
                "DELETE FROM tasks WHERE id = $1 AND title = $2 AND description = $3 \
                 AND done = $4 AND revision = $5",
            )
            .bind(task.task_id.value())
            .bind(&task.title)
            .bind(&task.description)
            .bind(task.done)
            .bind(revision)
            .execute(&pool)
            .await
            .map_err(database_error)?;

            if result.rows_affected() > 0 {
                return Ok(());
            }

            let (exists,): (bool,) =
                sqlx::query_as("SELECT EXISTS (SELECT 1 FROM tasks WHERE id = $1)")
                    .bind(task.task_id.value())
                    .fetch_one(&pool)
                    .await
                    .map_err(database_error)?;

            if exists {
                Err(RepositoryError::StaleRecord { id: task.task_id })
            } else {
                Err(RepositoryError::NotFound(task.task_id))
            }
        })
    }

    fn delete_by_id(&self, id: TaskId) -> RepositoryFuture<bool> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
                .bind(id.value())
                .execute(&pool)
                .await
                .map_err(database_error)?;

            Ok(result.rows_affected() > 0)
        })
    }

    fn count(&self) -> RepositoryFuture<u64> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tasks")
                .fetch_one(&pool)
                .await
                .map_err(database_error)?;

            Ok(count.unsigned_abs())
        })
    }
}

// =============================================================================
// PostgreSQL Credential Store
// =============================================================================

/// `PostgreSQL` implementation of `CredentialStore`.
#[derive(Debug, Clone)]
pub struct PostgresCredentialStore {
    pool: PgPool,
    cost: u32,
}

impl PostgresCredentialStore {
    /// Creates a credential store hashing at [`password::HASH_COST`].
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self {
            pool,
            cost: password::HASH_COST,
        }
    }

    /// Creates a credential store hashing at the given bcrypt cost.
    #[must_use]
    pub const fn with_cost(pool: PgPool, cost: u32) -> Self {
        Self { pool, cost }
    }
}

impl CredentialStore for PostgresCredentialStore {
    fn find_by_username(&self, username: &str) -> RepositoryFuture<Option<User>> {
        let pool = self.pool.clone();
        let username = username.to_owned();
        Box::pin(async move {
            let row: Option<(String, String)> =
                sqlx::query_as("SELECT username, password_hash FROM users WHERE username = $1")
                    .bind(&username)
                    .fetch_optional(&pool)
                    .await
                    .map_err(database_error)?;

            Ok(row.map(|(username, password_hash)| User::new(username, password_hash)))
        })
    }

    fn create_if_absent(&self, username: &str, password: &str) -> RepositoryFuture<bool> {
        let pool = self.pool.clone();
        let username = username.to_owned();
        let password = password.to_owned();
        let cost = self.cost;
        Box::pin(async move {
            let (exists,): (bool,) =
                sqlx::query_as("SELECT EXISTS (SELECT 1 FROM users WHERE username = $1)")
                    .bind(&username)
                    .fetch_one(&pool)
                    .await
                    .map_err(database_error)?;

            if exists {
                return Ok(false);
            }

            let password_hash = password::hash(password, cost).await?;

            let result = sqlx::query(
                "INSERT INTO users (username, password_hash) VALUES ($1, $2) \
                 ON CONFLICT (username) DO NOTHING",
            )
            .bind(&username)
            .bind(&password_hash)
            .execute(&pool)
            .await
            .map_err(database_error)?;

            Ok(result.rows_affected() > 0)
        })
    }

    fn count(&self) -> RepositoryFuture<u64> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
                .fetch_one(&pool)
                .await
                .map_err(database_error)?;

            Ok(count.unsigned_abs())
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
