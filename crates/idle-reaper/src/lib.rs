//! Idle endpoint reclamation for LLM Manager
//!
//! This crate tears down served models whose endpoints stayed below their
//! utilization threshold for their whole idle window, on a fixed schedule.

pub mod reaper;
pub mod scheduler;

// Re-export commonly used types
pub use reaper::{is_idle, IdleReaper, ReapReport};
pub use scheduler::ReaperScheduler;
