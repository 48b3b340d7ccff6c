//! # API Shared
//!
//! Shared utilities and definitions for HSR APIs.
//!
//! Contains:
//! - Request and response types with OpenAPI schemas (`dto` module)
//! - Shared services like `HealthService`
//! - Authentication utilities
//!
//! Used by `api-rest`; kept free of any HTTP framework so other front ends can reuse it.

pub mod auth;
pub mod dto;
pub mod health;

pub use dto::*;
pub use health::HealthService;
