//! Endpoint deprovisioning
//!
//! Teardown runs in reverse creation order: endpoint, serving configuration,
//! model registration, identity. Each step tolerates the resource already
//! being gone, and nothing waits for the endpoint deletion to finish.

use std::sync::Arc;
use tracing::{debug, info};

use common::error::{Error, Result};
use common::models::DeleteOutcome;
use common::types::{EndpointStatus, ResourceNames};
use platform_adapter::InferencePlatform;

use crate::identity::IdentityProvisioner;
use crate::inspector::StatusInspector;

/// Removes the resources behind a served model
pub struct EndpointDeprovisioner {
    /// Inference platform
    inference: Arc<dyn InferencePlatform>,

    /// Identity provisioner, owner of role removal
    identity: Arc<IdentityProvisioner>,

    /// Existence checks
    inspector: Arc<StatusInspector>,
}

impl EndpointDeprovisioner {
    /// Creates a new endpoint deprovisioner
    pub fn new(
        inference: Arc<dyn InferencePlatform>,
        identity: Arc<IdentityProvisioner>,
        inspector: Arc<StatusInspector>,
    ) -> Self {
        Self {
            inference,
            identity,
            inspector,
        }
    }

    /// Tears down `served_name`.
    ///
    /// Fails with `Error::StillCreating` while the endpoint is coming up, in
    /// which case nothing is removed.
    pub async fn deprovision(&self, served_name: &str) -> Result<DeleteOutcome> {
        let names = self.inspector.names(served_name);
        let status = self.inspector.inspect(served_name).await?;

        if status.is_absent() {
            debug!("Nothing to delete for {}", served_name);
            return Ok(DeleteOutcome::NothingToDelete);
        }

        match status.endpoint {
            Some(endpoint_status) if endpoint_status.is_transitioning() => {
                return Err(Error::StillCreating(format!(
                    "Endpoint {} is {}",
                    names.endpoint, endpoint_status
                )));
            }
            Some(EndpointStatus::Deleting) => {
                debug!("Endpoint {} is already being deleted", names.endpoint);
            }
            Some(endpoint_status) => {
                info!("Deleting endpoint {} ({})", names.endpoint, endpoint_status);
                tolerate_missing(self.inference.delete_endpoint(&names.endpoint).await)?;
            }
            None => {
                debug!("Endpoint {} absent, removing leftovers", names.endpoint);
            }
        }

        self.remove_leftovers(&names, status.serving_config, status.model_registered, status.identity)
            .await?;

        info!("Deletion of {} requested", served_name);

        Ok(DeleteOutcome::Deleted)
    }

    async fn remove_leftovers(
        &self,
        names: &ResourceNames,
        serving_config: bool,
        model_registered: bool,
        identity: bool,
    ) -> Result<()> {
        if serving_config {
            info!("Deleting endpoint config {}", names.endpoint_config);
            tolerate_missing(self.inference.delete_endpoint_config(&names.endpoint_config).await)?;
        }

        if model_registered {
            info!("Deleting model {}", names.model);
            tolerate_missing(self.inference.delete_model(&names.model).await)?;
        }

        if identity {
            self.identity.remove_identity(&names.served_name).await?;
        }

        Ok(())
    }
}

fn tolerate_missing(result: Result<()>) -> Result<()> {
    match result {
        Err(e) if e.is_not_found() => Ok(()),
        other => other,
    }
}
