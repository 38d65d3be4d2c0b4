//! Identity platform interface

use async_trait::async_trait;
use serde_json::Value;

use common::error::Result;
use common::models::IdentityHandle;

/// Role management on the identity platform
#[async_trait]
pub trait IdentityPlatform: Send + Sync {
    /// Looks up a role, `None` if it does not exist
    async fn get_role(&self, role_name: &str) -> Result<Option<IdentityHandle>>;

    /// Creates a role with the given trust policy; `Error::AlreadyExists` if present
    async fn create_role(
        &self,
        role_name: &str,
        trust_policy: &Value,
        description: &str,
    ) -> Result<IdentityHandle>;

    /// Attaches a managed policy to a role
    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<()>;

    /// Detaches a managed policy; `Error::NotFound` if it was not attached
    async fn detach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<()>;

    /// Deletes a role; policies must be detached first
    async fn delete_role(&self, role_name: &str) -> Result<()>;
}
