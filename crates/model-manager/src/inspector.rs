//! Status inspection
//!
//! Point-in-time queries against the platforms. Nothing here is cached: every
//! call re-queries, so the platforms remain the only source of truth for a
//! served model's lifecycle.

use std::sync::Arc;
use futures::try_join;
use tracing::trace;

use common::error::Result;
use common::models::{EndpointSummary, IdentityHandle, ListFilter, ResourceStatus};
use common::types::{EndpointStatus, ResourceNames};
use platform_adapter::{IdentityPlatform, InferencePlatform};

/// Answers existence and readiness queries for served models
pub struct StatusInspector {
    /// Inference platform
    inference: Arc<dyn InferencePlatform>,

    /// Identity platform
    identity: Arc<dyn IdentityPlatform>,

    /// Resource name prefix
    prefix: String,
}

impl StatusInspector {
    /// Creates a new status inspector
    pub fn new(
        inference: Arc<dyn InferencePlatform>,
        identity: Arc<dyn IdentityPlatform>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            inference,
            identity,
            prefix: prefix.into(),
        }
    }

    /// Platform resource names of a served model
    pub fn names(&self, served_name: &str) -> ResourceNames {
        ResourceNames::new(&self.prefix, served_name)
    }

    /// Execution identity, if it exists
    pub async fn identity(&self, served_name: &str) -> Result<Option<IdentityHandle>> {
        self.identity.get_role(&self.names(served_name).role).await
    }

    /// Whether the model registration exists
    pub async fn model_registered(&self, served_name: &str) -> Result<bool> {
        let model = self.names(served_name).model;
        let models = self.inference.list_models(&ListFilter::name_contains(&model)).await?;
        Ok(models.iter().any(|m| m.name == model))
    }

    /// Whether the serving configuration exists
    pub async fn serving_config_exists(&self, served_name: &str) -> Result<bool> {
        let config = self.names(served_name).endpoint_config;
        let configs = self
            .inference
            .list_endpoint_configs(&ListFilter::name_contains(&config))
            .await?;
        Ok(configs.iter().any(|c| c.name == config))
    }

    /// The endpoint in whatever status the platform reports
    pub async fn endpoint(&self, served_name: &str) -> Result<Option<EndpointSummary>> {
        let endpoint = self.names(served_name).endpoint;
        let endpoints = self
            .inference
            .list_endpoints(&ListFilter::name_contains(&endpoint))
            .await?;
        Ok(endpoints.into_iter().find(|e| e.name == endpoint))
    }

    /// Whether the endpoint exists and is in service
    pub async fn endpoint_in_service(&self, served_name: &str) -> Result<bool> {
        let endpoint = self.names(served_name).endpoint;
        let filter = ListFilter::name_contains(&endpoint).with_status(EndpointStatus::InService);
        let endpoints = self.inference.list_endpoints(&filter).await?;
        Ok(endpoints.iter().any(|e| e.name == endpoint))
    }

    /// Queries all four resources concurrently
    pub async fn inspect(&self, served_name: &str) -> Result<ResourceStatus> {
        let (identity, model_registered, serving_config, endpoint) = try_join!(
            self.identity(served_name),
            self.model_registered(served_name),
            self.serving_config_exists(served_name),
            self.endpoint(served_name),
        )?;

        let status = ResourceStatus {
            name: served_name.to_string(),
            identity: identity.is_some(),
            model_registered,
            serving_config,
            endpoint: endpoint.map(|e| e.status),
        };

        trace!("Inspected {}: {:?}", served_name, status);

        Ok(status)
    }
}
