//! Data Transfer Objects for API requests and responses.
//!
//! Request bodies are validated field by field from raw JSON so that a field
//! of the wrong type is reported as a validation error rather than a
//! deserialization failure, and so that a present-but-`null` field is told
//! apart from an absent one.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::API_PREFIX;
use super::error::{FieldError, ValidationError};
use crate::domain::{Task, TaskId, TaskPatch};

// =============================================================================
// Response DTOs
// =============================================================================

/// A task as returned by the API.
///
/// The identifier is replaced by the absolute URI of the task resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResponse {
    /// Absolute URI of this task.
    pub uri: String,
    /// Title of the task.
    pub title: String,
    /// Description of the task.
    pub description: String,
    /// Whether the task is done.
    pub done: bool,
}

impl TaskResponse {
    /// Renders `task` with its identifier replaced by a URI under `base_url`.
    #[must_use]
    pub fn render(task: &Task, base_url: &str) -> Self {
        Self {
            uri: task_uri(base_url, task.task_id),
            title: task.title.clone(),
            description: task.description.clone(),
            done: task.done,
        }
    }
}

/// Returns the absolute URI of the task with the given identifier.
#[must_use]
pub fn task_uri(base_url: &str, task_id: TaskId) -> String {
    format!("{}{API_PREFIX}/tasks/{task_id}", base_url.trim_end_matches('/'))
}

/// Body of single-task responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    /// The rendered task.
    pub task: TaskResponse,
}

/// Body of the task list response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskListEnvelope {
    /// Every rendered task.
    pub tasks: Vec<TaskResponse>,
}

/// Body of the delete response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResponse {
    /// Always `true` on success.
    pub result: bool,
}

// =============================================================================
// Request DTOs
// =============================================================================

/// Validated body of a create request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTaskRequest {
    /// Title of the new task.
    pub title: String,
    /// Description, empty when omitted.
    pub description: String,
}

impl CreateTaskRequest {
    /// Validates a create request body.
    ///
    /// # Validation Rules
    ///
    /// - The body must be a non-empty JSON object
    /// - `title` is required, must be a string, and must not be blank
    /// - `description`, if present, must be a string
    ///
    /// Any other field, `done` included, is ignored: new tasks start not done.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` listing every rule that was broken.
    pub fn from_json(body: &Value) -> Result<Self, ValidationError> {
        let object = require_object(body)?;
        let mut errors = Vec::new();

        let title = match optional_string(object, "title") {
            Ok(Some(title)) => validate_title(&title)
                .map_err(|error| errors.push(error))
                .ok(),
            Ok(None) => {
                errors.push(FieldError::new("title", "Title is required"));
                None
            }
            Err(error) => {
                errors.push(error);
                None
            }
        };
        let description = optional_string(object, "description")
            .map_err(|error| errors.push(error))
            .ok()
            .flatten();

        match title {
            Some(title) if errors.is_empty() => Ok(Self {
                title,
                description: description.unwrap_or_default(),
            }),
            _ => Err(ValidationError::new(errors)),
        }
    }

    /// Builds the not-done task to insert under the given identifier.
    #[must_use]
    pub fn into_task(self, task_id: TaskId) -> Task {
        Task::new(task_id, self.title).with_description(self.description)
    }
}

/// Validates an update request body into a patch.
///
/// # Validation Rules
///
/// - The body must be a non-empty JSON object
/// - `title` and `description`, if present, must be strings
/// - `done`, if present, must be a boolean (`0` and `1` are rejected)
///
/// Unknown fields are ignored.
///
/// # Errors
///
/// Returns a `ValidationError` listing every rule that was broken.
pub fn parse_update_request(body: &Value) -> Result<TaskPatch, ValidationError> {
    let object = require_object(body)?;
    let mut errors = Vec::new();

    let title = optional_string(object, "title")
        .map_err(|error| errors.push(error))
        .ok()
        .flatten();
    let description = optional_string(object, "description")
        .map_err(|error| errors.push(error))
        .ok()
        .flatten();
    let done = optional_bool(object, "done")
        .map_err(|error| errors.push(error))
        .ok()
        .flatten();

    if errors.is_empty() {
        Ok(TaskPatch {
            title,
            description,
            done,
        })
    } else {
        Err(ValidationError::new(errors))
    }
}

// =============================================================================
// Validation
// =============================================================================

/// Validates a task title for creation.
///
/// The title is kept as given; a title consisting only of whitespace counts
/// as empty.
///
/// # Errors
///
/// Returns a `FieldError` if the title is blank.
pub fn validate_title(title: &str) -> Result<String, FieldError> {
    if title.trim().is_empty() {
        return Err(FieldError::new("title", "Title must not be empty"));
    }
    Ok(title.to_string())
}

fn require_object(body: &Value) -> Result<&Map<String, Value>, ValidationError> {
    match body {
        Value::Object(object) if !object.is_empty() => Ok(object),
        Value::Object(_) => Err(ValidationError::single("body", "Body must not be empty")),
        _ => Err(ValidationError::single("body", "Body must be a JSON object")),
    }
}

fn optional_string(object: &Map<String, Value>, field: &str) -> Result<Option<String>, FieldError> {
    match object.get(field) {
        None => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(FieldError::new(field, "Must be a string")),
    }
}

fn optional_bool(object: &Map<String, Value>, field: &str) -> Result<Option<bool>, FieldError> {
    match object.get(field) {
        None => Ok(None),
        Some(Value::Bool(value)) => Ok(Some(*value)),
        Some(_) => Err(FieldError::new(field, "Must be a boolean")),
    }
}

// =============================================================================
// Tests
// =============================================================================
