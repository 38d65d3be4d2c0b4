//! Common utilities and types for LLM Manager
//!
//! This crate provides shared functionality used across the LLM Manager,
//! including error types, platform data models, resource naming and retries.

pub mod error;
pub mod models;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use error::{Error, Result};
pub use models::*;
pub use types::*;
