//! # API Shared
//!
//! Shared definitions for the habit service APIs.
//!
//! Contains:
//! - Request and response bodies with OpenAPI schemas (`dto` module)
//! - Conversions between those bodies and `habit-core` records
//! - Shared services like `HealthService`
//!
//! Used by `api-rest` and the workspace binary.

pub mod dto;
pub mod health;

pub use dto::*;
pub use health::HealthService;
