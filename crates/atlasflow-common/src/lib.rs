//! AtlasFlow Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the AtlasFlow project.
//!
//! # Overview
//!
//! This crate provides common functionality used across all AtlasFlow
//! workspace members:
//!
//! - **Error Handling**: Custom error types and result types
//! - **Content Hashing**: Deterministic payload digests for deduplication
//! - **Logging**: Centralized tracing subscriber configuration
//!
//! # Example
//!
//! ```
//! use atlasflow_common::hash::content_hash;
//!
//! let payload = serde_json::json!({"id": 42, "status": "faturado"});
//! let digest = content_hash(&payload);
//! assert_eq!(digest.len(), 64);
//! ```

pub mod error;
pub mod hash;
pub mod logging;

// Re-export commonly used types
pub use error::{AtlasError, Result};
