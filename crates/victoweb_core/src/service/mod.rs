//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep the HTTP and CLI layers decoupled from storage details.

pub mod account_service;
pub mod admin_seed;
pub mod chat_service;
pub mod password;
pub mod post_service;
pub mod video_service;
