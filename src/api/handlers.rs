//! HTTP handlers for the to-do API.
//!
//! Every task handler runs behind [`BasicAuthLayer`](super::auth::BasicAuthLayer)
//! and talks to the stores only through the traits held in [`AppState`].
//! Handlers never hold a lock across an await; each store call is atomic on
//! its own.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Json,
    extract::{
        FromRequestParts, Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::{StatusCode, header::HOST, request::Parts},
};
use serde::Serialize;
use serde_json::Value;

use super::auth::AuthenticatedUser;
use super::dto::{
    CreateTaskRequest, DeleteResponse, TaskEnvelope, TaskListEnvelope, TaskResponse,
    parse_update_request,
};
use super::error::ApiErrorResponse;
use crate::domain::{Task, TaskId};
use crate::infrastructure::{CredentialStore, Repositories, TaskRepository};

// =============================================================================
// Application Configuration
// =============================================================================

/// Application configuration for runtime settings.
#[derive(Clone, Debug, Default)]
pub struct AppConfig {
    /// Base URL used when rendering task URIs, e.g. `https://todo.example`.
    ///
    /// When unset, the base is derived from the request's `Host` header.
    pub public_base_url: Option<String>,
}

// =============================================================================
// Application State
// =============================================================================

/// Shared application dependencies.
///
/// Uses trait objects so the store backend can be chosen at runtime by
/// `RepositoryFactory`.
#[derive(Clone)]
pub struct AppState {
    /// Task store.
    pub task_repository: Arc<dyn TaskRepository + Send + Sync>,
    /// Credential store used by the authentication layer.
    pub credential_store: Arc<dyn CredentialStore + Send + Sync>,
    /// Application configuration.
    pub config: AppConfig,
}

impl AppState {
    /// Creates a new `AppState` from initialized repositories.
    #[must_use]
    pub fn from_repositories(repositories: Repositories) -> Self {
        Self::with_config(repositories, AppConfig::default())
    }

    /// Creates a new `AppState` from repositories and custom configuration.
    #[must_use]
    pub fn with_config(repositories: Repositories, config: AppConfig) -> Self {
        Self {
            task_repository: repositories.task_repository,
            credential_store: repositories.credential_store,
            config,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("AppState")
            .field("task_repository", &"Arc<dyn TaskRepository>")
            .field("credential_store", &"Arc<dyn CredentialStore>")
            .field("config", &self.config)
            .finish()
    }
}

// =============================================================================
// Base URL Extractor
// =============================================================================

/// Scheme and authority that task URIs are rendered under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl(String);

impl BaseUrl {
    /// Fallback when neither a configured base nor a `Host` header exists.
    pub const DEFAULT: &'static str = "http://localhost";

    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self(base_url.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolves the base URL from configuration, then the `Host` header.
    #[must_use]
    pub fn resolve(config: &AppConfig, host: Option<&str>) -> Self {
        if let Some(public_base_url) = &config.public_base_url {
            return Self::new(public_base_url.trim_end_matches('/'));
        }
        host.map(str::trim)
            .filter(|host| !host.is_empty())
            .map_or_else(|| Self::new(Self::DEFAULT), |host| Self(format!("http://{host}")))
    }
}

impl FromRequestParts<AppState> for BaseUrl {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let host = parts
            .headers
            .get(HOST)
            .and_then(|value| value.to_str().ok())
            .or_else(|| parts.uri.authority().map(axum::http::uri::Authority::as_str));
        Ok(Self::resolve(&state.config, host))
    }
}

// =============================================================================
// GET /tasks Handler
// =============================================================================

/// Lists every task.
///
/// # Response
///
/// - **200 OK**: `{"tasks": [...]}`
pub async fn list_tasks(
    State(state): State<AppState>,
    base_url: BaseUrl,
) -> Result<Json<TaskListEnvelope>, ApiErrorResponse> {
    let tasks = state.task_repository.list_all().await?;

    let tasks = tasks
        .iter()
        .map(|task| TaskResponse::render(task, base_url.as_str()))
        .collect();
    Ok(Json(TaskListEnvelope { tasks }))
}

// =============================================================================
// GET /tasks/{id} Handler
// =============================================================================

/// Fetches one task.
///
/// # Errors
///
/// - **404 Not Found**: No task with this id, or the id is not an integer
pub async fn get_task(
    State(state): State<AppState>,
    base_url: BaseUrl,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<TaskEnvelope>, ApiErrorResponse> {
    let task = load_task(&state, path).await?;

    Ok(Json(TaskEnvelope {
        task: TaskResponse::render(&task, base_url.as_str()),
    }))
}

// =============================================================================
// POST /tasks Handler
// =============================================================================

/// Creates a task.
///
/// # Request Body
///
/// ```json
/// {
///   "title": "Read a book",
///   "description": "optional",
///   "done": false
/// }
/// ```
///
/// # Response
///
/// - **201 Created**: `{"task": {...}}`
/// - **400 Bad Request**: Body missing, not JSON, or fails validation
pub async fn create_task(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    base_url: BaseUrl,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<TaskEnvelope>), ApiErrorResponse> {
    let Json(body) = body.map_err(reject_body)?;
    let request = CreateTaskRequest::from_json(&body)?;

    let task_id = state.task_repository.next_id().await?;
    state
        .task_repository
        .insert(&request.into_task(task_id))
        .await?;

    let Some(task) = state.task_repository.find_by_id(task_id).await? else {
        tracing::error!(%task_id, "Task vanished right after insert");
        return Err(ApiErrorResponse::internal_error());
    };
    tracing::info!(%task_id, %user, "Task created");

    Ok((
        StatusCode::CREATED,
        Json(TaskEnvelope {
            task: TaskResponse::render(&task, base_url.as_str()),
        }),
    ))
}

// =============================================================================
// PUT /tasks/{id} Handler
// =============================================================================

/// Updates some fields of a task.
///
/// Existence is checked before the body is looked at, so a bad body sent to a
/// missing task yields 404.
///
/// # Response
///
/// - **200 OK**: `{"task": {...}}` with the stored result
/// - **400 Bad Request**: Body is not a non-empty JSON object or a field has
///   the wrong type
/// - **404 Not Found**: No task with this id
pub async fn update_task(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    base_url: BaseUrl,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<TaskEnvelope>, ApiErrorResponse> {
    let current = load_task(&state, path).await?;

    let Json(body) = body.map_err(reject_body)?;
    let patch = parse_update_request(&body)?;

    let updated = state.task_repository.update(&patch.apply(&current)).await?;
    tracing::info!(task_id = %updated.task_id, revision = updated.revision, %user, "Task updated");

    Ok(Json(TaskEnvelope {
        task: TaskResponse::render(&updated, base_url.as_str()),
    }))
}

// =============================================================================
// DELETE /tasks/{id} Handler
// =============================================================================

/// Deletes a task.
///
/// The delete only succeeds if the stored task is still the one just read.
///
/// # Response
///
/// - **200 OK**: `{"result": true}`
/// - **404 Not Found**: No task with this id
/// - **409 Conflict**: The task changed between read and delete
pub async fn delete_task(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<DeleteResponse>, ApiErrorResponse> {
    let task = load_task(&state, path).await?;

    state.task_repository.delete(&task).await?;
    tracing::info!(task_id = %task.task_id, %user, "Task deleted");

    Ok(Json(DeleteResponse { result: true }))
}

// =============================================================================
// Health Check and Fallbacks
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: &'static str,
    /// Service version.
    pub version: &'static str,
}

/// Health check endpoint. Not authenticated.
///
/// # Response
///
/// - **200 OK**: Service is healthy
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Answers requests that match no route.
pub async fn route_not_found() -> ApiErrorResponse {
    ApiErrorResponse::not_found()
}

/// Answers requests to a known route with an unsupported method.
pub async fn method_not_allowed() -> ApiErrorResponse {
    ApiErrorResponse::method_not_allowed()
}

// =============================================================================
// Helper Functions
// =============================================================================

async fn load_task(
    state: &AppState,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Task, ApiErrorResponse> {
    let Ok(Path(raw_id)) = path else {
        return Err(ApiErrorResponse::not_found());
    };
    state
        .task_repository
        .find_by_id(TaskId::new(raw_id))
        .await?
        .ok_or_else(ApiErrorResponse::not_found)
}

#[allow(clippy::needless_pass_by_value)]
fn reject_body(rejection: JsonRejection) -> ApiErrorResponse {
    tracing::debug!(%rejection, "Request body is not JSON");
    ApiErrorResponse::bad_request()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::{InMemoryCredentialStore, InMemoryTaskRepository};
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[fixture]
    fn config() -> AppConfig {
        AppConfig::default()
    }

    #[fixture]
    fn state() -> AppState {
        AppState::from_repositories(Repositories {
            task_repository: Arc::new(InMemoryTaskRepository::new()),
            credential_store: Arc::new(InMemoryCredentialStore::with_cost(4)),
        })
    }

    fn user() -> AuthenticatedUser {
        AuthenticatedUser::new("mojo")
    }

    fn base_url() -> BaseUrl {
        BaseUrl::new(BaseUrl::DEFAULT)
    }

    // -------------------------------------------------------------------------
    // BaseUrl Tests
    // -------------------------------------------------------------------------

    #[rstest]
    fn test_base_url_prefers_configured_value(mut config: AppConfig) {
        config.public_base_url = Some("https://todo.example/".to_string());

        let base_url = BaseUrl::resolve(&config, Some("internal:5000"));

        assert_eq!(base_url.as_str(), "https://todo.example");
    }

    #[rstest]
    #[case(Some("localhost:5000"), "http://localhost:5000")]
    #[case(Some("  "), "http://localhost")]
    #[case(None, "http://localhost")]
    fn test_base_url_from_host(
        config: AppConfig,
        #[case] host: Option<&str>,
        #[case] expected: &str,
    ) {
        assert_eq!(BaseUrl::resolve(&config, host).as_str(), expected);
    }

    // -------------------------------------------------------------------------
    // Handler Tests
    // -------------------------------------------------------------------------

    #[rstest]
    #[tokio::test]
    async fn test_create_task_on_empty_store_gets_first_id(state: AppState) {
        let (status, Json(envelope)) = create_task(
            State(state.clone()),
            user(),
            base_url(),
            Ok(Json(json!({"title": "Read a book"}))),
        )
        .await
        .unwrap();

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(envelope.task.uri, "http://localhost/todo/api/v1.0/tasks/1");
        assert_eq!(envelope.task.description, "");
        assert!(!envelope.task.done);
        assert_eq!(state.task_repository.count().await.unwrap(), 1);
    }

    #[rstest]
    #[tokio::test]
    async fn test_create_task_without_title_leaves_store_unchanged(state: AppState) {
        let result = create_task(
            State(state.clone()),
            user(),
            base_url(),
            Ok(Json(json!({"description": "fake_news"}))),
        )
        .await;

        assert_eq!(result.unwrap_err().status, StatusCode::BAD_REQUEST);
        assert_eq!(state.task_repository.count().await.unwrap(), 0);
    }

    #[rstest]
    #[tokio::test]
    async fn test_update_task_merges_present_fields(state: AppState) {
        state
            .task_repository
            .insert(&Task::new(TaskId::new(1), "Buy groceries").with_description("Milk"))
            .await
            .unwrap();

        let Json(envelope) = update_task(
            State(state.clone()),
            user(),
            base_url(),
            Ok(Path(1)),
            Ok(Json(json!({"done": true}))),
        )
        .await
        .unwrap();

        assert_eq!(envelope.task.title, "Buy groceries");
        assert_eq!(envelope.task.description, "Milk");
        assert!(envelope.task.done);
    }

    #[rstest]
    #[tokio::test]
    async fn test_update_missing_task_is_not_found_even_with_bad_body(state: AppState) {
        let result = update_task(
            State(state),
            user(),
            base_url(),
            Ok(Path(6)),
            Ok(Json(json!({"done": 1}))),
        )
        .await;

        assert_eq!(result.unwrap_err().status, StatusCode::NOT_FOUND);
    }

    #[rstest]
    #[tokio::test]
    async fn test_delete_task_then_get_is_not_found(state: AppState) {
        state
            .task_repository
            .insert(&Task::new(TaskId::new(2), "Learn Python"))
            .await
            .unwrap();

        let Json(response) = delete_task(State(state.clone()), user(), Ok(Path(2)))
            .await
            .unwrap();
        assert!(response.result);

        let result = get_task(State(state), base_url(), Ok(Path(2))).await;
        assert_eq!(result.unwrap_err().status, StatusCode::NOT_FOUND);
    }

    #[rstest]
    #[tokio::test]
    async fn test_delete_missing_task_is_not_found(state: AppState) {
        let result = delete_task(State(state), user(), Ok(Path(42))).await;

        assert_eq!(result.unwrap_err().status, StatusCode::NOT_FOUND);
    }

    #[rstest]
    #[tokio::test]
    async fn test_list_tasks_renders_uris(state: AppState) {
        state
            .task_repository
            .insert(&Task::new(TaskId::new(1), "Buy groceries"))
            .await
            .unwrap();

        let Json(envelope) = list_tasks(State(state), base_url()).await.unwrap();

        assert_eq!(envelope.tasks.len(), 1);
        assert_eq!(envelope.tasks[0].uri, "http://localhost/todo/api/v1.0/tasks/1");
    }

    #[rstest]
    #[tokio::test]
    async fn test_health_check_reports_version() {
        let Json(response) = health_check().await;

        assert_eq!(response.status, "healthy");
        assert_eq!(response.version, env!("CARGO_PKG_VERSION"));
    }
}
