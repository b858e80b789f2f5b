//! Common test helpers for integration tests.
//!
//! Builds an in-memory application seeded with two users (`mojo` and `kojo`,
//! both with password `python`) and the two classic tasks, and drives the
//! router with `tower::ServiceExt::oneshot`.
//!
//! # Note
//!
//! The `#![allow(dead_code)]` attribute is necessary because Rust compiles each
//! integration test file as a separate crate, and not every helper is used by
//! every test file.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use todo_api::api::{AppConfig, AppState, create_router};
use todo_api::domain::{Task, TaskId};
use todo_api::infrastructure::{
    CredentialStore, InMemoryCredentialStore, InMemoryTaskRepository, Repositories, TaskRepository,
};

/// Lowest bcrypt cost, so fixtures hash quickly.
pub const TEST_HASH_COST: u32 = 4;

/// Password of every seeded user.
pub const PASSWORD: &str = "python";

/// Host header sent with every request.
pub const HOST: &str = "localhost:5000";

/// Prefix of every task URI rendered for requests sent with [`HOST`].
pub const TASKS_URI: &str = "http://localhost:5000/todo/api/v1.0/tasks";

// =============================================================================
// AppState Creation Helpers
// =============================================================================

/// Application under test together with direct handles on its stores.
#[derive(Clone)]
pub struct TestApp {
    pub router: Router,
    pub task_repository: Arc<dyn TaskRepository + Send + Sync>,
    pub credential_store: Arc<dyn CredentialStore + Send + Sync>,
}

/// Creates an application with users but no tasks.
pub async fn create_empty_app() -> TestApp {
    let credential_store = InMemoryCredentialStore::with_cost(TEST_HASH_COST);
    for username in ["mojo", "kojo"] {
        credential_store
            .create_if_absent(username, PASSWORD)
            .await
            .expect("Failed to seed user");
    }

    let repositories = Repositories {
        task_repository: Arc::new(InMemoryTaskRepository::new()),
        credential_store: Arc::new(credential_store),
    };
    let task_repository = Arc::clone(&repositories.task_repository);
    let credential_store = Arc::clone(&repositories.credential_store);

    let state = AppState::with_config(repositories, AppConfig::default());
    TestApp {
        router: create_router(state),
        task_repository,
        credential_store,
    }
}

/// Creates an application with users and the two seed tasks.
pub async fn create_seeded_app() -> TestApp {
    let app = create_empty_app().await;
    for task in seed_tasks() {
        app.task_repository
            .insert(&task)
            .await
            .expect("Failed to seed task");
    }
    app
}

/// The two tasks every seeded application starts with.
pub fn seed_tasks() -> Vec<Task> {
    vec![
        Task::new(TaskId::new(1), "Buy groceries")
            .with_description("Milk, Cheese, Pizza, Fruit, Tylenol"),
        Task::new(TaskId::new(2), "Learn Python")
            .with_description("Need to find a good Python tutorial on the web"),
    ]
}

// =============================================================================
// Request Helpers
// =============================================================================

/// Builds an `Authorization: Basic` header value.
pub fn basic_auth(username: &str, password: &str) -> String {
    format!(
        "Basic {}",
        BASE64_STANDARD.encode(format!("{username}:{password}"))
    )
}

/// Request to send through the router.
#[derive(Debug, Clone)]
pub struct TestRequest {
    method: Method,
    uri: String,
    authorization: Option<String>,
    content_type: Option<&'static str>,
    body: Option<String>,
}

impl TestRequest {
    /// Creates a request authenticated as `mojo`.
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            authorization: Some(basic_auth("mojo", PASSWORD)),
            content_type: None,
            body: None,
        }
    }

    pub fn get(uri: impl Into<String>) -> Self {
        Self::new(Method::GET, uri)
    }

    pub fn post(uri: impl Into<String>) -> Self {
        Self::new(Method::POST, uri)
    }

    pub fn put(uri: impl Into<String>) -> Self {
        Self::new(Method::PUT, uri)
    }

    pub fn delete(uri: impl Into<String>) -> Self {
        Self::new(Method::DELETE, uri)
    }

    /// Replaces the credentials.
    pub fn credentials(mut self, username: &str, password: &str) -> Self {
        self.authorization = Some(basic_auth(username, password));
        self
    }

    /// Sets a raw `Authorization` header value.
    pub fn authorization(mut self, value: impl Into<String>) -> Self {
        self.authorization = Some(value.into());
        self
    }

    /// Drops the `Authorization` header.
    pub fn anonymous(mut self) -> Self {
        self.authorization = None;
        self
    }

    /// Sets a JSON body with `Content-Type: application/json`.
    pub fn json(mut self, body: &Value) -> Self {
        self.content_type = Some("application/json");
        self.body = Some(body.to_string());
        self
    }

    /// Sets a raw body with the given content type.
    pub fn raw(mut self, content_type: &'static str, body: impl Into<String>) -> Self {
        self.content_type = Some(content_type);
        self.body = Some(body.into());
        self
    }

    /// Sends the request and returns the status and JSON body.
    ///
    /// A body that is empty or not JSON is returned as `Value::Null`.
    pub async fn send(self, app: &TestApp) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(self.method)
            .uri(self.uri)
            .header(header::HOST, HOST);
        if let Some(authorization) = self.authorization {
            builder = builder.header(header::AUTHORIZATION, authorization);
        }
        if let Some(content_type) = self.content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        let request = builder
            .body(self.body.map_or_else(Body::empty, Body::from))
            .expect("Failed to build request");

        let response = app
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Router is infallible");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }
}

/// Returns the URI of the task with the given id.
pub fn task_uri(id: i64) -> String {
    format!("{TASKS_URI}/{id}")
}

/// Returns the path part of an absolute task URI.
pub fn path_of(uri: &str) -> &str {
    uri.strip_prefix("http://localhost:5000").unwrap_or(uri)
}
