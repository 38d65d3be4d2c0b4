//! Served model lifecycle management for LLM Manager
//!
//! This crate drives the platform resources behind a served model: catalog
//! resolution, identity, registration, serving configuration and endpoint on
//! the way up, the reverse teardown on the way down, plus status and query.

pub mod catalog;
pub mod deprovisioner;
pub mod identity;
pub mod inspector;
pub mod invoker;
pub mod locks;
pub mod manager;
pub mod provisioner;

// Re-export commonly used types
pub use catalog::CatalogResolver;
pub use deprovisioner::EndpointDeprovisioner;
pub use identity::IdentityProvisioner;
pub use inspector::StatusInspector;
pub use invoker::QueryInvoker;
pub use locks::NameLocks;
pub use manager::{CreateModelRequest, Deprovision, ModelManager};
pub use provisioner::EndpointProvisioner;
