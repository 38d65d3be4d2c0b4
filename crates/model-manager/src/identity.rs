//! Execution identity provisioning
//!
//! Every served model runs under its own role, named deterministically from
//! the served model name. This module is the only place that creates or
//! removes those roles.

use std::sync::Arc;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use common::error::{Error, Result};
use common::models::IdentityHandle;
use common::types::ResourceNames;
use platform_adapter::IdentityPlatform;
use settings::IdentityConfig;

/// Creates and removes execution identities
pub struct IdentityProvisioner {
    /// Identity platform
    identity: Arc<dyn IdentityPlatform>,

    /// Trust and policy settings
    config: IdentityConfig,

    /// Resource name prefix
    prefix: String,
}

impl IdentityProvisioner {
    /// Creates a new identity provisioner
    pub fn new(identity: Arc<dyn IdentityPlatform>, config: IdentityConfig, prefix: impl Into<String>) -> Self {
        Self {
            identity,
            config,
            prefix: prefix.into(),
        }
    }

    fn role_name(&self, served_name: &str) -> String {
        ResourceNames::new(&self.prefix, served_name).role
    }

    /// Trust policy allowing the inference service to assume the role
    pub fn trust_policy(&self) -> Value {
        json!({
            "Version": "2012-10-17",
            "Statement": [
                {
                    "Effect": "Allow",
                    "Principal": { "Service": self.config.service_principal },
                    "Action": "sts:AssumeRole"
                }
            ]
        })
    }

    /// Returns the execution identity for `served_name`, creating it if absent
    pub async fn ensure_identity(&self, served_name: &str) -> Result<IdentityHandle> {
        let role_name = self.role_name(served_name);

        let existing = self
            .identity
            .get_role(&role_name)
            .await
            .map_err(|e| Error::IdentityProvisioning(format!("Failed to look up role {}: {}", role_name, e)))?;

        if let Some(handle) = existing {
            debug!("Execution role {} already exists", role_name);
            return Ok(handle);
        }

        info!("Creating execution role {}", role_name);

        let handle = match self
            .identity
            .create_role(&role_name, &self.trust_policy(), &self.config.description)
            .await
        {
            Ok(handle) => handle,
            Err(e) if e.is_already_exists() => {
                // Lost a race with a concurrent creator
                return self
                    .identity
                    .get_role(&role_name)
                    .await
                    .map_err(|e| Error::IdentityProvisioning(e.to_string()))?
                    .ok_or_else(|| {
                        Error::IdentityProvisioning(format!("Role {} vanished after creation", role_name))
                    });
            }
            Err(e) => {
                return Err(Error::IdentityProvisioning(format!(
                    "Failed to create role {}: {}",
                    role_name, e
                )))
            }
        };

        for policy_arn in &self.config.policy_arns {
            if let Err(e) = self.identity.attach_role_policy(&role_name, policy_arn).await {
                // A role without its policies would be reused as-is later
                warn!("Failed to attach {} to {}, rolling back role: {}", policy_arn, role_name, e);
                if let Err(rollback) = self.remove_role(&role_name).await {
                    warn!("Rollback of role {} failed: {}", role_name, rollback);
                }
                return Err(Error::IdentityProvisioning(format!(
                    "Failed to attach policy {} to {}: {}",
                    policy_arn, role_name, e
                )));
            }
        }

        info!("Execution role {} created", role_name);

        Ok(handle)
    }

    /// Detaches the managed policies and deletes the role.
    ///
    /// Returns false when the role did not exist.
    pub async fn remove_identity(&self, served_name: &str) -> Result<bool> {
        let role_name = self.role_name(served_name);
        self.remove_role(&role_name).await
    }

    async fn remove_role(&self, role_name: &str) -> Result<bool> {
        for policy_arn in &self.config.policy_arns {
            match self.identity.detach_role_policy(role_name, policy_arn).await {
                Ok(()) => debug!("Detached {} from {}", policy_arn, role_name),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }

        match self.identity.delete_role(role_name).await {
            Ok(()) => {
                info!("Deleted execution role {}", role_name);
                Ok(true)
            }
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}
