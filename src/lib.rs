//! To-do list REST API.
//!
//! Authenticated CRUD over tasks under `/todo/api/v1.0`, backed by an
//! in-memory or `PostgreSQL` store.

pub mod api;
pub mod config;
pub mod domain;
pub mod infrastructure;
