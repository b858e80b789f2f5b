//! Repository factory for runtime backend selection.
//!
//! The backend is chosen from an explicit `RepositoryConfig` handed to the
//! factory; nothing is inferred from how the process was started. Separate
//! production and test databases are simply two different `DATABASE_URL`s.
//!
//! # Environment Variables
//!
//! - `STORAGE_MODE`: `in_memory` (default) | `postgres`
//! - `DATABASE_URL`: `PostgreSQL` connection URL (required when `STORAGE_MODE=postgres`)
//!
//! # Example
//!
//! ```ignore
//! let config = RepositoryConfig::from_env()?;
//! let repositories = RepositoryFactory::new(config).create().await?;
//! repositories.provision_users(&seeds).await?;
//! ```

use std::env;
use std::str::FromStr;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use super::postgres::ensure_schema;
use super::{
    CredentialStore, InMemoryCredentialStore, InMemoryTaskRepository, PostgresCredentialStore,
    PostgresTaskRepository, RepositoryError, TaskRepository,
};

/// Upper bound on pooled `PostgreSQL` connections.
const MAX_CONNECTIONS: u32 = 10;

// =============================================================================
// Configuration Types
// =============================================================================

/// Storage backend for tasks and users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageMode {
    /// Process-local storage, lost on restart.
    #[default]
    InMemory,
    /// `PostgreSQL` storage.
    Postgres,
}

impl FromStr for StorageMode {
    type Err = ConfigurationError;

    /// Parses a storage mode from a string.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::InvalidStorageMode` if the string is not recognized.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "in_memory" | "inmemory" | "memory" => Ok(Self::InMemory),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            _ => Err(ConfigurationError::InvalidStorageMode(value.to_string())),
        }
    }
}

/// Configuration for the repository factory.
#[derive(Debug, Clone, Default)]
pub struct RepositoryConfig {
    /// Storage backend.
    pub storage_mode: StorageMode,
    /// `PostgreSQL` connection URL (required when `storage_mode` is `Postgres`).
    pub database_url: Option<String>,
}

impl RepositoryConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> RepositoryConfigBuilder {
        RepositoryConfigBuilder::default()
    }

    /// Creates a configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if `STORAGE_MODE` is invalid or
    /// `DATABASE_URL` is missing when `STORAGE_MODE=postgres`.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        let storage_mode = match env::var("STORAGE_MODE") {
            Ok(value) => value.parse()?,
            Err(env::VarError::NotPresent) => StorageMode::default(),
            Err(env::VarError::NotUnicode(_)) => {
                return Err(ConfigurationError::InvalidStorageMode(
                    "<non-UTF-8 value>".to_string(),
                ));
            }
        };

        // Empty or whitespace-only URLs count as unset
        let database_url = env::var("DATABASE_URL")
            .ok()
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        let config = Self {
            storage_mode,
            database_url,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::MissingDatabaseUrl` if the `PostgreSQL`
    /// backend is selected without a URL.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if matches!(self.storage_mode, StorageMode::Postgres) && self.database_url.is_none() {
            return Err(ConfigurationError::MissingDatabaseUrl);
        }
        Ok(())
    }
}

/// Builder for `RepositoryConfig`.
#[derive(Debug, Clone, Default)]
pub struct RepositoryConfigBuilder {
    storage_mode: StorageMode,
    database_url: Option<String>,
}

impl RepositoryConfigBuilder {
    /// Sets the storage mode.
    #[must_use]
    pub const fn storage_mode(mut self, mode: StorageMode) -> Self {
        self.storage_mode = mode;
        self
    }

    /// Sets the `PostgreSQL` database URL.
    #[must_use]
    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if the configuration is invalid.
    pub fn build(self) -> Result<RepositoryConfig, ConfigurationError> {
        let config = RepositoryConfig {
            storage_mode: self.storage_mode,
            database_url: self.database_url,
        };

        config.validate()?;
        Ok(config)
    }
}

// =============================================================================
// Error Types
// =============================================================================

/// Errors in repository configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Invalid storage mode value.
    #[error("Invalid storage mode: '{0}'. Expected 'in_memory' or 'postgres'")]
    InvalidStorageMode(String),

    /// Missing `DATABASE_URL` when storage mode is Postgres.
    #[error("DATABASE_URL environment variable is required when STORAGE_MODE=postgres")]
    MissingDatabaseUrl,
}

/// Errors that can occur while creating or provisioning repositories.
#[derive(Debug, Error)]
pub enum FactoryError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// The database could not be reached or its schema could not be created.
    #[error("Database connection error: {0}")]
    DatabaseConnection(String),

    /// A provisioned user could not be stored.
    #[error("Provisioning user '{username}' failed: {source}")]
    Provisioning {
        username: String,
        #[source]
        source: RepositoryError,
    },
}

// =============================================================================
// Repository Factory
// =============================================================================

/// A user to create at startup if it does not exist yet.
#[derive(Clone, PartialEq, Eq)]
pub struct UserSeed {
    /// Login name.
    pub username: String,
    /// Plaintext password, hashed before it is stored.
    pub password: String,
}

impl UserSeed {
    /// Creates a seed from a username and plaintext password.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for UserSeed {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("UserSeed")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Initialized stores shared across request handlers.
#[derive(Clone)]
pub struct Repositories {
    /// Task store.
    pub task_repository: Arc<dyn TaskRepository + Send + Sync>,
    /// Credential store.
    pub credential_store: Arc<dyn CredentialStore + Send + Sync>,
}

impl std::fmt::Debug for Repositories {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Repositories")
            .field("task_repository", &"Arc<dyn TaskRepository>")
            .field("credential_store", &"Arc<dyn CredentialStore>")
            .finish()
    }
}

impl Repositories {
    /// Creates every seeded user that does not exist yet.
    ///
    /// Returns the number of users created.
    ///
    /// # Errors
    ///
    /// Returns `FactoryError::Provisioning` for the first seed that fails.
    pub async fn provision_users(&self, seeds: &[UserSeed]) -> Result<usize, FactoryError> {
        let mut created = 0;
        for seed in seeds {
            let was_created = self
                .credential_store
                .create_if_absent(&seed.username, &seed.password)
                .await
                .map_err(|source| FactoryError::Provisioning {
                    username: seed.username.clone(),
                    source,
                })?;

            if was_created {
                tracing::info!(username = %seed.username, "Provisioned user");
                created += 1;
            } else {
                tracing::debug!(username = %seed.username, "User already exists");
            }
        }
        Ok(created)
    }
}

/// Factory for creating stores based on configuration.
#[derive(Debug, Clone)]
pub struct RepositoryFactory {
    config: RepositoryConfig,
}

impl RepositoryFactory {
    /// Creates a new repository factory with the given configuration.
    #[must_use]
    pub const fn new(config: RepositoryConfig) -> Self {
        Self { config }
    }

    /// Creates a new repository factory from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `FactoryError::Configuration` if environment configuration is invalid.
    pub fn from_env() -> Result<Self, FactoryError> {
        let config = RepositoryConfig::from_env()?;
        Ok(Self::new(config))
    }

    /// Returns the configuration used by this factory.
    #[must_use]
    pub const fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// Creates the stores, connecting to the database when required.
    ///
    /// # Errors
    ///
    /// Returns `FactoryError` if the configuration is invalid, the database
    /// cannot be reached, or its schema cannot be created. None of these are
    /// recoverable; the caller is expected to abort startup.
    pub async fn create(&self) -> Result<Repositories, FactoryError> {
        self.config.validate()?;

        match self.config.storage_mode {
            StorageMode::InMemory => Ok(Self::create_in_memory_repositories()),
            StorageMode::Postgres => {
                let database_url = self
                    .config
                    .database_url
                    .as_deref()
                    .ok_or(ConfigurationError::MissingDatabaseUrl)?;

                let pool = PgPoolOptions::new()
                    .max_connections(MAX_CONNECTIONS)
                    .connect(database_url)
                    .await
                    .map_err(|error| FactoryError::DatabaseConnection(error.to_string()))?;

                ensure_schema(&pool)
                    .await
                    .map_err(|error| FactoryError::DatabaseConnection(error.to_string()))?;

                Ok(Repositories {
                    task_repository: Arc::new(PostgresTaskRepository::new(pool.clone())),
                    credential_store: Arc::new(PostgresCredentialStore::new(pool)),
                })
            }
        }
    }

    fn create_in_memory_repositories() -> Repositories {
        Repositories {
            task_repository: Arc::new(InMemoryTaskRepository::new()),
            credential_store: Arc::new(InMemoryCredentialStore::new()),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
