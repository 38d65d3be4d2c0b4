//! Timeout policy persistence for LLM Manager
//!
//! This crate provides the persisted registry of per-model idle teardown
//! policies, with an in-memory and a JSON file backend.

pub mod file;
pub mod memory;
pub mod registry;

// Re-export commonly used types
pub use file::JsonFilePolicyStore;
pub use memory::InMemoryPolicyStore;
pub use registry::PolicyStore;
