//! API module for HTTP handlers.
//!
//! This module contains route definitions, authentication, and
//! request/response handlers.

pub mod auth;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod routes;

/// Path prefix of every task endpoint.
pub const API_PREFIX: &str = "/todo/api/v1.0";

pub use auth::{AuthenticatedUser, BasicAuthLayer, BasicCredentials};
pub use dto::{
    CreateTaskRequest, DeleteResponse, TaskEnvelope, TaskListEnvelope, TaskResponse,
    parse_update_request,
};
pub use error::{ApiError, ApiErrorResponse, FieldError, ValidationError};
pub use handlers::{
    AppConfig, AppState, BaseUrl, HealthResponse, create_task, delete_task, get_task,
    health_check, list_tasks, update_task,
};
pub use routes::create_router;
