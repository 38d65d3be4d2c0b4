//! Managed inference platform interface

use async_trait::async_trait;
use serde_json::Value;

use common::error::Result;
use common::models::{EndpointSummary, ListFilter, ModelRegistration, ResourceSummary, ServingConfig};

/// Operations the manager needs from the managed inference platform.
///
/// Create calls fail with `Error::AlreadyExists` when the resource exists;
/// delete calls fail with `Error::NotFound` when it does not. Endpoint
/// creation and deletion return once the request is accepted.
#[async_trait]
pub trait InferencePlatform: Send + Sync {
    /// Registers a model artifact, returning its platform identifier
    async fn create_model(&self, registration: &ModelRegistration) -> Result<String>;

    /// Deletes a model registration
    async fn delete_model(&self, model_name: &str) -> Result<()>;

    /// Lists model registrations
    async fn list_models(&self, filter: &ListFilter) -> Result<Vec<ResourceSummary>>;

    /// Creates a serving configuration, returning its platform identifier
    async fn create_endpoint_config(&self, config: &ServingConfig) -> Result<String>;

    /// Deletes a serving configuration
    async fn delete_endpoint_config(&self, config_name: &str) -> Result<()>;

    /// Lists serving configurations
    async fn list_endpoint_configs(&self, filter: &ListFilter) -> Result<Vec<ResourceSummary>>;

    /// Requests creation of an endpoint from a serving configuration
    async fn create_endpoint(&self, endpoint_name: &str, config_name: &str) -> Result<String>;

    /// Requests deletion of an endpoint
    async fn delete_endpoint(&self, endpoint_name: &str) -> Result<()>;

    /// Lists endpoints
    async fn list_endpoints(&self, filter: &ListFilter) -> Result<Vec<EndpointSummary>>;

    /// Invokes an in-service endpoint with a JSON payload
    async fn invoke_endpoint(&self, endpoint_name: &str, payload: &Value) -> Result<Value>;
}
