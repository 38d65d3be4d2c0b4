//! Configuration management for LLM Manager
//!
//! This crate loads the manager configuration from defaults, an optional file
//! and the environment, and validates it before any component starts.

pub mod manager;
pub mod schema;
pub mod validation;

// Re-export commonly used types
pub use manager::ConfigManager;
pub use schema::{
    IdentityConfig, LogFormat, LoggingConfig, ManagerConfig, NamingConfig, ProvisioningConfig,
    QueryConfig, ReaperConfig, SimulationConfig, StorageBackend, StorageConfig, TimeoutDefaults,
};
