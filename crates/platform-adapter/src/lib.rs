//! External platform interfaces for LLM Manager
//!
//! The manager never talks to a cloud SDK directly: every collaborator it
//! drives (managed inference, identity, metrics, model hub) sits behind one of
//! the traits in this crate. The `memory` module provides a process-local
//! implementation used by tests and by the simulated runtime.

pub mod hub;
pub mod identity;
pub mod inference;
pub mod memory;
pub mod metrics;

// Re-export commonly used types
pub use hub::{ModelHub, StaticModelHub};
pub use identity::IdentityPlatform;
pub use inference::InferencePlatform;
pub use memory::{FaultPoint, InMemoryPlatform, PlatformOperation};
pub use metrics::MetricsSource;
