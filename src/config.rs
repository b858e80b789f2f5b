//! Server configuration.
//!
//! # Environment Variables
//!
//! - `HOST`: Server host address (default: `0.0.0.0`)
//! - `PORT`: Server port (default: `5000`)
//! - `PUBLIC_BASE_URL`: Base of rendered task URIs (default: derived from `Host`)
//! - `TODO_USERS`: Users to provision, as `username:password` pairs separated by commas
//! - `WORKER_THREADS`: Tokio worker threads (default: logical CPU count)
//!
//! Store selection lives in [`RepositoryConfig`](crate::infrastructure::RepositoryConfig).

use std::env;
use std::net::SocketAddr;
use std::num::NonZeroUsize;

use thiserror::Error;

use crate::api::AppConfig;
use crate::infrastructure::UserSeed;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 5000;

/// Default listening host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

// =============================================================================
// Error Types
// =============================================================================

/// Errors in server configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServerConfigError {
    /// `PORT` is not a valid port number.
    #[error("Invalid port: '{0}'")]
    InvalidPort(String),

    /// `HOST` and `PORT` do not form a socket address.
    #[error("Invalid server address: '{0}'")]
    InvalidAddress(String),

    /// A `TODO_USERS` entry is not of the form `username:password`.
    #[error("Invalid user entry at position {position}: expected 'username:password'")]
    InvalidUserEntry { position: usize },

    /// `WORKER_THREADS` is not a positive integer.
    #[error("Invalid worker thread count: '{0}'")]
    InvalidWorkerThreads(String),
}

// =============================================================================
// Server Configuration
// =============================================================================

/// Listening address, URI rendering and provisioned users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Base of rendered task URIs.
    pub public_base_url: Option<String>,
    /// Users created at startup unless they already exist.
    pub users: Vec<UserSeed>,
    /// Runtime worker threads; `None` leaves tokio's default.
    pub worker_threads: Option<NonZeroUsize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            public_base_url: None,
            users: Vec::new(),
            worker_threads: None,
        }
    }
}

impl ServerConfig {
    /// Creates a configuration from environment variables.
    ///
    /// Unset or blank variables fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ServerConfigError` if `PORT`, `TODO_USERS` or `WORKER_THREADS`
    /// cannot be parsed.
    pub fn from_env() -> Result<Self, ServerConfigError> {
        let host = non_blank_var("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = non_blank_var("PORT")
            .map(|port| parse_port(&port))
            .transpose()?
            .unwrap_or(DEFAULT_PORT);
        let public_base_url = non_blank_var("PUBLIC_BASE_URL");
        let users = non_blank_var("TODO_USERS")
            .map(|users| parse_user_seeds(&users))
            .transpose()?
            .unwrap_or_default();
        let worker_threads = non_blank_var("WORKER_THREADS")
            .map(|threads| parse_worker_threads(&threads))
            .transpose()?;

        Ok(Self {
            host,
            port,
            public_base_url,
            users,
            worker_threads,
        })
    }

    /// Returns the socket address to bind.
    ///
    /// # Errors
    ///
    /// Returns `ServerConfigError::InvalidAddress` if `host` is not an IP
    /// address.
    pub fn socket_address(&self) -> Result<SocketAddr, ServerConfigError> {
        let address = format!("{}:{}", self.host, self.port);
        address
            .parse()
            .map_err(|_| ServerConfigError::InvalidAddress(address))
    }

    /// Returns the handler configuration derived from this configuration.
    #[must_use]
    pub fn app_config(&self) -> AppConfig {
        AppConfig {
            public_base_url: self.public_base_url.clone(),
        }
    }
}

fn non_blank_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Parses a port number.
///
/// # Errors
///
/// Returns `ServerConfigError::InvalidPort` for anything but `1..=65535`.
pub fn parse_port(value: &str) -> Result<u16, ServerConfigError> {
    match value.trim().parse::<u16>() {
        Ok(0) | Err(_) => Err(ServerConfigError::InvalidPort(value.to_string())),
        Ok(port) => Ok(port),
    }
}

/// Parses a worker thread count.
///
/// # Errors
///
/// Returns `ServerConfigError::InvalidWorkerThreads` unless the value is a
/// positive integer.
pub fn parse_worker_threads(value: &str) -> Result<NonZeroUsize, ServerConfigError> {
    value
        .trim()
        .parse::<NonZeroUsize>()
        .map_err(|_| ServerConfigError::InvalidWorkerThreads(value.to_string()))
}

/// Parses `username:password` pairs separated by commas.
///
/// Blank entries are skipped. The password is everything after the first
/// `:`, so it may contain colons but not commas.
///
/// # Errors
///
/// Returns `ServerConfigError::InvalidUserEntry` for an entry without `:` or
/// with an empty username or password. The entry itself is not included in
/// the error since it holds a password.
pub fn parse_user_seeds(value: &str) -> Result<Vec<UserSeed>, ServerConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .enumerate()
        .map(|(position, entry)| match entry.split_once(':') {
            Some((username, password)) if !username.is_empty() && !password.is_empty() => {
                Ok(UserSeed::new(username, password))
            }
            _ => Err(ServerConfigError::InvalidUserEntry { position }),
        })
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
