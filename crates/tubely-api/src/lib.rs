//! Axum HTTP API server.
//!
//! This crate provides:
//! - Video and thumbnail upload endpoints
//! - Bearer token verification
//! - Security headers, request IDs and request logging
//! - Prometheus metrics

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use auth::{AuthUser, TokenVerifier};
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
