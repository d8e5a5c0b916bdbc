//! Portal domain model.
//!
//! # Responsibility
//! - Define canonical records shared by repositories, services and HTTP.
//! - Own field-level validation for user-submitted drafts.
//!
//! # Invariants
//! - Every persisted record is identified by its SQLite row id.
//! - Drafts must pass `validate()` before they reach a repository.

pub mod account;
pub mod chat;
pub mod committee;
pub mod post;
pub mod validation;

/// Unix epoch milliseconds, the timestamp unit used across storage.
pub type EpochMillis = i64;
