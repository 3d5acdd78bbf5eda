//! Shared types for the clinic platform
//!
//! Domain models, the unified error system and small utilities used by
//! the cloud services. Nothing in this crate performs I/O.

pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use axum::Json;
pub use http;
pub use serde::{Deserialize, Serialize};
