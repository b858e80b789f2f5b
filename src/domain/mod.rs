//! Domain module for to-do task management.
//!
//! This module contains the task and user models shared by the store and
//! HTTP layers.

pub mod task;
pub mod user;

pub use task::{Task, TaskId, TaskPatch};
pub use user::User;
