// School Ideas - idea submission, two-stage review, voting and discussion

// Core types and primitives
pub mod core;

// Row types for the seven relations
pub mod models;

// Infrastructure - database, caching, change feed, viewer context
pub mod infrastructure;

// Domain services
pub mod domains;

// HTTP surface and wiring
pub mod api;
pub mod app_state;
pub mod config;

// Common utilities
pub mod error;

// Re-exports for convenience
pub use error::{AppError, AppResult};
