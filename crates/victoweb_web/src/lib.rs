//! HTTP surface of the VictoWeb portal.
//!
//! # Responsibility
//! - Map routes onto core services and render JSON.
//! - Own cookie sessions and the live admin event stream.

pub mod error;
pub mod events;
pub mod routes;
pub mod server;
pub mod session;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use events::AdminEventHub;
pub use server::{build_router, serve, ServerError};
pub use state::{AppState, Database};
