//! Timeout policy registry interface

use async_trait::async_trait;

use common::error::Result;
use common::models::TimeoutPolicy;

/// Persistent key/value store of timeout policies, keyed by served model name
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Inserts or replaces the policy for `policy.name`
    async fn put(&self, policy: TimeoutPolicy) -> Result<()>;

    /// Policy for `name`, if any
    async fn get(&self, name: &str) -> Result<Option<TimeoutPolicy>>;

    /// All policies, ordered by name
    async fn scan(&self) -> Result<Vec<TimeoutPolicy>>;

    /// Removes the policy for `name`; returns whether a row existed
    async fn delete(&self, name: &str) -> Result<bool>;
}
