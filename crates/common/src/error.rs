//! Error types for the common crate
//!
//! This module defines the error types shared by every LLM Manager component,
//! from the platform adapters up to the request handlers.

use thiserror::Error;

/// Result type for LLM Manager operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for LLM Manager operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Short model name has no catalog entry
    #[error("Model not known: {0}")]
    UnknownModel(String),

    /// Execution identity could not be created or inspected
    #[error("Identity provisioning failed: {0}")]
    IdentityProvisioning(String),

    /// Registration, serving configuration or endpoint creation failed
    #[error("Provisioning failed: {0}")]
    Provisioning(String),

    /// Delete requested while the endpoint is still being created
    #[error("Model is still creating: {0}")]
    StillCreating(String),

    /// Query against an endpoint that is not in service
    #[error("Model not in service: {0}")]
    NotInService(String),

    /// Not found error
    #[error("Not found: {0}")]
    NotFound(String),

    /// Already exists error
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Invalid argument error
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// External service error
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns true if the error is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Returns true if the error is an already exists error
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Error::AlreadyExists(_))
    }

    /// Returns true if the error is an unknown model error
    pub fn is_unknown_model(&self) -> bool {
        matches!(self, Error::UnknownModel(_))
    }

    /// Returns true if the error is a still creating error
    pub fn is_still_creating(&self) -> bool {
        matches!(self, Error::StillCreating(_))
    }

    /// Returns true if the error is a not in service error
    pub fn is_not_in_service(&self) -> bool {
        matches!(self, Error::NotInService(_))
    }

    /// HTTP-style status code used when the error crosses the request boundary
    pub fn status_code(&self) -> u16 {
        match self {
            Error::UnknownModel(_)
            | Error::InvalidArgument(_)
            | Error::StillCreating(_)
            | Error::NotInService(_)
            | Error::Serialization(_) => 400,
            Error::NotFound(_) => 404,
            Error::AlreadyExists(_) => 409,
            Error::IdentityProvisioning(_)
            | Error::Provisioning(_)
            | Error::ExternalService(_) => 502,
            Error::Io(_) | Error::Config(_) | Error::Internal(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicates() {
        assert!(Error::NotFound("x".into()).is_not_found());
        assert!(Error::AlreadyExists("x".into()).is_already_exists());
        assert!(Error::UnknownModel("x".into()).is_unknown_model());
        assert!(Error::StillCreating("x".into()).is_still_creating());
        assert!(Error::NotInService("x".into()).is_not_in_service());
        assert!(!Error::Internal("x".into()).is_not_found());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::StillCreating("demo".into()).status_code(), 400);
        assert_eq!(Error::NotFound("demo".into()).status_code(), 404);
        assert_eq!(Error::Provisioning("demo".into()).status_code(), 502);
        assert_eq!(Error::Internal("demo".into()).status_code(), 500);
    }

    #[test]
    fn test_display() {
        let err = Error::UnknownModel("unknown-model-xyz".into());
        assert_eq!(err.to_string(), "Model not known: unknown-model-xyz");
    }
}
