//! Task domain model.
//!
//! A task is a to-do item with a title, a free-form description and a done
//! flag. Every stored task also carries a revision counter which the store
//! uses to reject deletes issued against a stale copy of the record.

use serde::{Deserialize, Serialize};

// =============================================================================
// Value Objects - Newtypes
// =============================================================================

/// Unique identifier for a task.
///
/// Identifiers are allocated by the task store and are never handed out twice
/// by the same store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(i64);

impl TaskId {
    /// The identifier allocated for the first task of an empty store.
    pub const FIRST: Self = Self(1);

    /// Creates a `TaskId` from a raw integer.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw integer value.
    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }

    /// Returns the identifier that follows this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

impl From<i64> for TaskId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

// =============================================================================
// Task Entity
// =============================================================================

/// A to-do task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Store-assigned identifier.
    pub task_id: TaskId,
    /// Short title, non-empty at creation.
    pub title: String,
    /// Free-form description, empty by default.
    pub description: String,
    /// Whether the task has been completed.
    pub done: bool,
    /// Revision counter, 1 on insert and bumped by every effective update.
    pub revision: u64,
}

impl Task {
    /// Creates a new task with an empty description that is not done.
    #[must_use]
    pub fn new(task_id: TaskId, title: impl Into<String>) -> Self {
        Self {
            task_id,
            title: title.into(),
            description: String::new(),
            done: false,
            revision: 1,
        }
    }

    /// Returns a copy of this task with the given description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Returns a copy of this task with the given done flag.
    #[must_use]
    pub const fn with_done(mut self, done: bool) -> Self {
        self.done = done;
        self
    }

    /// Returns true if the user-visible fields of both tasks are equal.
    ///
    /// The identifier and revision are not compared.
    #[must_use]
    pub fn has_same_content(&self, other: &Self) -> bool {
        self.title == other.title && self.description == other.description && self.done == other.done
    }
}

// =============================================================================
// Task Patch
// =============================================================================

/// A partial update of a task's user-visible fields.
///
/// Fields set to `None` keep their current value when the patch is applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    /// Replacement title.
    pub title: Option<String>,
    /// Replacement description.
    pub description: Option<String>,
    /// Replacement done flag.
    pub done: Option<bool>,
}

impl TaskPatch {
    /// Returns true if the patch does not touch any field.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.done.is_none()
    }

    /// Merges this patch into `task`, returning the merged copy.
    ///
    /// The identifier and revision of `task` are preserved.
    #[must_use]
    pub fn apply(&self, task: &Task) -> Task {
        Task {
            task_id: task.task_id,
            title: self.title.clone().unwrap_or_else(|| task.title.clone()),
            description: self
                .description
                .clone()
                .unwrap_or_else(|| task.description.clone()),
            done: self.done.unwrap_or(task.done),
            revision: task.revision,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
