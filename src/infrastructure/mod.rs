//! Infrastructure module for persistence.
//!
//! This module contains the task and credential store traits, their
//! in-memory and `PostgreSQL` implementations, password hashing, and the
//! factory that picks a backend at startup.

pub mod factory;
pub mod in_memory;
pub mod password;
pub mod postgres;
pub mod repository;

pub use factory::{
    ConfigurationError, FactoryError, Repositories, RepositoryConfig, RepositoryFactory,
    StorageMode, UserSeed,
};
pub use in_memory::{InMemoryCredentialStore, InMemoryTaskRepository};
pub use postgres::{PostgresCredentialStore, PostgresTaskRepository};
pub use repository::{CredentialStore, RepositoryError, RepositoryFuture, TaskRepository};
