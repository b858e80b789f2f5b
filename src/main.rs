//! To-do API server.
//!
//! # Environment Variables
//!
//! - `STORAGE_MODE`: `in_memory` (default) | `postgres`
//! - `DATABASE_URL`: `PostgreSQL` connection URL (required when `STORAGE_MODE=postgres`)
//! - `HOST`: Server host address (default: `0.0.0.0`)
//! - `PORT`: Server port (default: `5000`)
//! - `PUBLIC_BASE_URL`: Base of rendered task URIs (default: derived from `Host`)
//! - `TODO_USERS`: Users to provision, e.g. `mojo:python,kojo:python`
//! - `RUST_LOG`: Logging level (e.g., `debug`, `info`, `todo_api=debug`)
//! - `LOG_FORMAT`: `text` (default) | `json`
//! - `WORKER_THREADS`: Number of tokio worker threads (default: logical CPU count)

use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use todo_api::api::{AppState, create_router};
use todo_api::config::ServerConfig;
use todo_api::infrastructure::{RepositoryConfig, RepositoryFactory};

fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let repository_config = match RepositoryConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            tracing::error!("Configuration error: {}", error);
            std::process::exit(1);
        }
    };
    let server_config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            tracing::error!("Configuration error: {}", error);
            std::process::exit(1);
        }
    };

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(threads) = server_config.worker_threads {
        builder.worker_threads(threads.get());
    }
    let runtime = match builder.build() {
        Ok(runtime) => runtime,
        Err(error) => {
            tracing::error!(%error, "Failed to create tokio runtime");
            std::process::exit(1);
        }
    };

    runtime.block_on(async_main(repository_config, server_config));
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "todo_api=debug,tower_http=debug".into());
    let json = std::env::var("LOG_FORMAT")
        .is_ok_and(|format| format.trim().eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn async_main(repository_config: RepositoryConfig, server_config: ServerConfig) {
    tracing::info!("Starting To-do API");

    tracing::info!(
        storage_mode = ?repository_config.storage_mode,
        port = server_config.port,
        public_base_url = ?server_config.public_base_url,
        worker_threads = ?server_config.worker_threads,
        "Configuration loaded"
    );

    let factory = RepositoryFactory::new(repository_config);
    let repositories = match factory.create().await {
        Ok(repositories) => {
            tracing::info!("Repositories initialized successfully");
            repositories
        }
        Err(error) => {
            tracing::error!("Failed to initialize repositories: {}", error);
            std::process::exit(1);
        }
    };

    match repositories.provision_users(&server_config.users).await {
        Ok(created) => tracing::info!(
            created,
            configured = server_config.users.len(),
            "Users provisioned"
        ),
        Err(error) => {
            tracing::error!("Failed to provision users: {}", error);
            std::process::exit(1);
        }
    }
    match repositories.task_repository.count().await {
        Ok(tasks) => tracing::info!(tasks, "Task store ready"),
        Err(error) => tracing::warn!(%error, "Could not count tasks"),
    }
    match repositories.credential_store.count().await {
        Ok(0) => tracing::warn!("No users exist; every API request will be rejected"),
        Ok(users) => tracing::info!(users, "Credential store ready"),
        Err(error) => tracing::warn!(%error, "Could not count users"),
    }

    let application_state = AppState::with_config(repositories, server_config.app_config());
    let application = create_router(application_state);

    let address = match server_config.socket_address() {
        Ok(address) => address,
        Err(error) => {
            tracing::error!(%error, "Invalid server address");
            std::process::exit(1);
        }
    };

    let listener = match TcpListener::bind(address).await {
        Ok(listener) => listener,
        Err(error) => {
            tracing::error!(%error, "Failed to bind to address {}", address);
            std::process::exit(1);
        }
    };

    match listener.local_addr() {
        Ok(address) => tracing::info!("Listening on {}", address),
        Err(error) => tracing::warn!(%error, "Could not determine local address"),
    }

    if let Err(error) = axum::serve(listener, application)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(%error, "Server error");
        std::process::exit(1);
    }

    tracing::info!("Server shutdown complete");
}

/// Completes when SIGINT (Ctrl+C) or, on Unix, SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::warn!(%error, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::warn!(%error, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
