//! Model manager
//!
//! Entry point for the lifecycle operations. Wires the catalog, provisioners,
//! inspector and invoker together, serializes create and delete per name, and
//! keeps the timeout policy registry in step with what exists.

use std::collections::HashMap;
use std::sync::Arc;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, instrument, warn};

use common::error::{Error, Result};
use common::models::{ArtifactSpec, DeleteOutcome, ModelDescriptor, ResourceStatus, StatusReport, TimeoutPolicy};
use platform_adapter::{IdentityPlatform, InferencePlatform, ModelHub};
use settings::{ManagerConfig, TimeoutDefaults};
use storage_adapter::PolicyStore;

use crate::catalog::CatalogResolver;
use crate::deprovisioner::EndpointDeprovisioner;
use crate::identity::IdentityProvisioner;
use crate::inspector::StatusInspector;
use crate::invoker::QueryInvoker;
use crate::locks::NameLocks;
use crate::provisioner::EndpointProvisioner;

/// Longest resource name the platform accepts
const MAX_RESOURCE_NAME_LEN: usize = 63;

/// Longest idle timeout a model may register, in minutes (7 days)
const MAX_IDLE_TIMEOUT_MINUTES: u64 = 7 * 24 * 60;

/// Longest suffix appended to a served model name
const LONGEST_SUFFIX: &str = "-endpoint-config";

/// Request to make a model servable under a name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateModelRequest {
    /// Served model name
    pub name: String,

    /// Catalog short name, or artifact id when `instance_type` is given
    pub model: String,

    /// Explicit hardware class
    #[serde(default)]
    pub instance_type: Option<String>,

    /// Weights bucket
    #[serde(default)]
    pub bucket: Option<String>,

    /// Weights key
    #[serde(default)]
    pub key: Option<String>,

    /// Container environment
    #[serde(default)]
    pub env_vars: Option<HashMap<String, String>>,

    /// Container image
    #[serde(default)]
    pub docker_img: Option<String>,

    /// Opt into idle teardown
    #[serde(default, rename = "enableTimeout")]
    pub enable_timeout: bool,

    /// Utilization threshold in percent
    #[serde(default, rename = "timeoutGPUThreshold")]
    pub timeout_threshold: Option<f64>,

    /// Idle minutes before teardown
    #[serde(default, rename = "timeout")]
    pub timeout_minutes: Option<u64>,
}

impl CreateModelRequest {
    /// Request for a catalog model with every option left at its default
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            ..Self::default()
        }
    }

    /// Timeout policy implied by the request, if idle teardown was requested
    pub fn timeout_policy(&self, defaults: &TimeoutDefaults) -> Option<TimeoutPolicy> {
        if !self.enable_timeout {
            return None;
        }

        Some(TimeoutPolicy {
            name: self.name.clone(),
            idle_timeout_minutes: self.timeout_minutes.unwrap_or(defaults.idle_timeout_minutes),
            utilization_threshold: self.timeout_threshold.unwrap_or(defaults.utilization_threshold),
        })
    }
}

/// Teardown of a served model, as invoked by the idle reaper
#[async_trait]
pub trait Deprovision: Send + Sync {
    /// Deletes the served model `name`
    async fn deprovision(&self, name: &str) -> Result<DeleteOutcome>;
}

/// Lifecycle manager for served models
pub struct ModelManager {
    /// Catalog resolver
    catalog: CatalogResolver,

    /// Model hub
    hub: Arc<dyn ModelHub>,

    /// Status inspector
    inspector: Arc<StatusInspector>,

    /// Endpoint provisioner
    provisioner: EndpointProvisioner,

    /// Endpoint deprovisioner
    deprovisioner: EndpointDeprovisioner,

    /// Query invoker
    invoker: QueryInvoker,

    /// Timeout policy registry
    policies: Arc<dyn PolicyStore>,

    /// Per-name create/delete locks
    locks: NameLocks,

    /// Resource name prefix
    prefix: String,

    /// Defaults for timeout policies
    timeout_defaults: TimeoutDefaults,
}

impl ModelManager {
    /// Creates a new model manager
    pub fn new(
        config: &ManagerConfig,
        inference: Arc<dyn InferencePlatform>,
        identity_platform: Arc<dyn IdentityPlatform>,
        hub: Arc<dyn ModelHub>,
        policies: Arc<dyn PolicyStore>,
    ) -> Self {
        let prefix = config.naming.resource_prefix.clone();

        let identity = Arc::new(IdentityProvisioner::new(
            identity_platform.clone(),
            config.identity.clone(),
            prefix.clone(),
        ));
        let inspector = Arc::new(StatusInspector::new(
            inference.clone(),
            identity_platform,
            prefix.clone(),
        ));
        let provisioner = EndpointProvisioner::new(
            inference.clone(),
            identity.clone(),
            inspector.clone(),
            config.naming.clone(),
            config.provisioning.clone(),
        );
        let deprovisioner = EndpointDeprovisioner::new(inference.clone(), identity, inspector.clone());
        let invoker = QueryInvoker::new(inference, inspector.clone(), config.query.clone());

        Self {
            catalog: CatalogResolver::new(),
            hub,
            inspector,
            provisioner,
            deprovisioner,
            invoker,
            policies,
            locks: NameLocks::new(),
            prefix,
            timeout_defaults: config.timeouts.clone(),
        }
    }

    /// Makes `request.model` servable as `request.name`.
    ///
    /// Model and artifact resolution happen before any platform resource is
    /// touched. Returns once the endpoint creation request is accepted.
    #[instrument(skip(self, request), fields(name = %request.name, model = %request.model))]
    pub async fn create(&self, request: &CreateModelRequest) -> Result<()> {
        self.validate_name(&request.name)?;

        let policy = request.timeout_policy(&self.timeout_defaults);
        if let Some(policy) = &policy {
            validate_timeout_policy(policy)?;
        }

        let descriptor = self
            .catalog
            .resolve(&request.model, request.instance_type.as_deref())?;
        let artifact = self.resolve_artifact(&descriptor, request).await?;

        let _guard = self.locks.lock(&request.name).await;

        self.provisioner
            .provision(&request.name, &descriptor.hardware_class, &artifact)
            .await?;

        if let Some(policy) = policy {
            info!(
                "Registering idle timeout for {}: {} minutes below {}%",
                policy.name, policy.idle_timeout_minutes, policy.utilization_threshold
            );
            self.policies.put(policy).await?;
        }

        Ok(())
    }

    /// Whether the endpoint of `name` is in service
    #[instrument(skip(self))]
    pub async fn status(&self, name: &str) -> Result<StatusReport> {
        let is_up = self.inspector.endpoint_in_service(name).await?;
        Ok(StatusReport { is_up })
    }

    /// Detailed view of every resource behind `name`
    pub async fn inspect(&self, name: &str) -> Result<ResourceStatus> {
        self.inspector.inspect(name).await
    }

    /// Tears down `name` and forgets its timeout policy
    #[instrument(skip(self))]
    pub async fn delete(&self, name: &str) -> Result<DeleteOutcome> {
        let _guard = self.locks.lock(name).await;

        let outcome = self.deprovisioner.deprovision(name).await?;

        if let Err(e) = self.policies.delete(name).await {
            warn!("Failed to remove timeout policy for {}: {}", name, e);
        }

        Ok(outcome)
    }

    /// Sends `prompt` to `name` and returns the generated text
    #[instrument(skip(self, prompt, parameters))]
    pub async fn query(&self, name: &str, prompt: &str, parameters: Option<Map<String, Value>>) -> Result<String> {
        self.invoker.query(name, prompt, parameters).await
    }

    /// Built-in catalog
    pub fn catalog(&self) -> Vec<ModelDescriptor> {
        self.catalog.descriptors()
    }

    /// Resource name prefix
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn validate_name(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidArgument("Model name must not be empty".to_string()));
        }

        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(Error::InvalidArgument(format!(
                "Model name {} may only contain letters, digits and hyphens",
                name
            )));
        }

        let max_len = MAX_RESOURCE_NAME_LEN.saturating_sub(self.prefix.len() + 1 + LONGEST_SUFFIX.len());
        if name.len() > max_len {
            return Err(Error::InvalidArgument(format!(
                "Model name {} exceeds {} characters",
                name, max_len
            )));
        }

        Ok(())
    }

    async fn resolve_artifact(&self, descriptor: &ModelDescriptor, request: &CreateModelRequest) -> Result<ArtifactSpec> {
        match (&request.docker_img, &request.bucket, &request.key) {
            (Some(image), Some(bucket), Some(key)) => Ok(ArtifactSpec {
                image: image.clone(),
                bucket: bucket.clone(),
                key: key.clone(),
                environment: request.env_vars.clone().unwrap_or_default(),
            }),
            (None, None, None) if request.env_vars.is_none() => {
                self.hub
                    .lookup(&descriptor.backing_artifact_id, &descriptor.hardware_class)
                    .await
            }
            _ => Err(Error::InvalidArgument(
                "docker_img, bucket and key must be given together".to_string(),
            )),
        }
    }
}

fn validate_timeout_policy(policy: &TimeoutPolicy) -> Result<()> {
    if policy.idle_timeout_minutes == 0 || policy.idle_timeout_minutes > MAX_IDLE_TIMEOUT_MINUTES {
        return Err(Error::InvalidArgument(format!(
            "Idle timeout must be between 1 and {} minutes, got {}",
            MAX_IDLE_TIMEOUT_MINUTES, policy.idle_timeout_minutes
        )));
    }

    if !policy.utilization_threshold.is_finite() {
        return Err(Error::InvalidArgument(format!(
            "Utilization threshold must be a finite number, got {}",
            policy.utilization_threshold
        )));
    }

    Ok(())
}

#[async_trait]
impl Deprovision for ModelManager {
    async fn deprovision(&self, name: &str) -> Result<DeleteOutcome> {
        self.delete(name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::types::EndpointStatus;
    use common::utils::RetryPolicy;
    use platform_adapter::{InMemoryPlatform, StaticModelHub};
    use std::time::Duration;
    use storage_adapter::InMemoryPolicyStore;

    struct Fixture {
        platform: Arc<InMemoryPlatform>,
        policies: Arc<InMemoryPolicyStore>,
        manager: ModelManager,
    }

    fn fixture() -> Fixture {
        let platform = Arc::new(InMemoryPlatform::new());
        let policies = Arc::new(InMemoryPolicyStore::new());
        let mut config = ManagerConfig::default();
        config.provisioning.registration_retry = RetryPolicy::immediate(2);

        let manager = ModelManager::new(
            &config,
            platform.clone(),
            platform.clone(),
            Arc::new(StaticModelHub::with_defaults()),
            policies.clone(),
        );

        Fixture {
            platform,
            policies,
            manager,
        }
    }

    #[tokio::test]
    async fn test_status_follows_endpoint() {
        let f = fixture();
        f.manager.create(&CreateModelRequest::new("demo", "mistral-7b")).await.unwrap();
        assert!(!f.manager.status("demo").await.unwrap().is_up);

        f.platform
            .set_endpoint_status("LLManager-demo-endpoint", EndpointStatus::InService)
            .unwrap();
        assert!(f.manager.status("demo").await.unwrap().is_up);

        let config = f.platform.serving_config("LLManager-demo-endpoint-config").unwrap();
        assert_eq!(config.hardware_class, "ml.g5.2xlarge");
    }

    #[tokio::test]
    async fn test_unknown_model_creates_nothing() {
        let f = fixture();
        let err = f
            .manager
            .create(&CreateModelRequest::new("demo", "unknown-model-xyz"))
            .await
            .unwrap_err();
        assert!(err.is_unknown_model());
        assert!(f.platform.operations().is_empty());
        assert_eq!(f.platform.resource_counts(), (0, 0, 0, 0));
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let f = fixture();
        let request = CreateModelRequest::new("demo", "mistral-7b");
        f.manager.create(&request).await.unwrap();
        f.platform.clear_operations();

        f.manager.create(&request).await.unwrap();
        assert!(f.platform.operations().is_empty());
    }

    #[tokio::test]
    async fn test_timeout_policy_lifecycle() {
        let f = fixture();
        let request = CreateModelRequest {
            enable_timeout: true,
            timeout_minutes: Some(15),
            ..CreateModelRequest::new("demo", "mistral-7b")
        };
        f.manager.create(&request).await.unwrap();

        let policy = f.policies.get("demo").await.unwrap().unwrap();
        assert_eq!(policy.idle_timeout_minutes, 15);
        assert_eq!(policy.utilization_threshold, 0.05);

        // Still creating: policy stays
        assert!(f.manager.delete("demo").await.unwrap_err().is_still_creating());
        assert!(f.policies.get("demo").await.unwrap().is_some());

        f.platform
            .set_endpoint_status("LLManager-demo-endpoint", EndpointStatus::InService)
            .unwrap();
        assert_eq!(f.manager.delete("demo").await.unwrap(), DeleteOutcome::Deleted);
        assert!(f.policies.get("demo").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_no_policy_without_opt_in() {
        let f = fixture();
        f.manager.create(&CreateModelRequest::new("demo", "mistral-7b")).await.unwrap();
        assert!(f.policies.scan().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_explicit_artifact_bypasses_hub() {
        let f = fixture();
        let mut env = HashMap::new();
        env.insert("HF_TASK".to_string(), "text-generation".to_string());
        let request = CreateModelRequest {
            instance_type: Some("ml.g5.12xlarge".to_string()),
            bucket: Some("my-weights".to_string()),
            key: Some("custom/".to_string()),
            docker_img: Some("registry/custom:1".to_string()),
            env_vars: Some(env),
            ..CreateModelRequest::new("custom", "my-custom-model")
        };
        f.manager.create(&request).await.unwrap();

        let registration = f.platform.model_registration("LLManager-custom-model").unwrap();
        assert_eq!(registration.image, "registry/custom:1");
        assert_eq!(registration.artifact_uri, "s3://my-weights/custom/");
        assert_eq!(
            registration.environment.get("HF_TASK").map(String::as_str),
            Some("text-generation")
        );
    }

    #[tokio::test]
    async fn test_partial_artifact_is_rejected() {
        let f = fixture();
        let request = CreateModelRequest {
            bucket: Some("my-weights".to_string()),
            ..CreateModelRequest::new("demo", "mistral-7b")
        };
        let err = f.manager.create(&request).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(f.platform.resource_counts(), (0, 0, 0, 0));
    }

    #[tokio::test]
    async fn test_invalid_names_are_rejected() {
        let f = fixture();
        let too_long = "x".repeat(40);
        for name in ["", "has space", "under_score", too_long.as_str()] {
            let err = f
                .manager
                .create(&CreateModelRequest::new(name, "mistral-7b"))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)), "{:?}", name);
        }
        assert!(f.platform.operations().is_empty());
    }

    #[tokio::test]
    async fn test_out_of_range_timeouts_are_rejected() {
        let f = fixture();
        for minutes in [0, MAX_IDLE_TIMEOUT_MINUTES + 1, 1_000_000_000_000] {
            let request = CreateModelRequest {
                enable_timeout: true,
                timeout_minutes: Some(minutes),
                ..CreateModelRequest::new("demo", "mistral-7b")
            };
            let err = f.manager.create(&request).await.unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)), "{}", minutes);
        }
        assert!(f.platform.operations().is_empty());
        assert!(f.policies.scan().await.unwrap().is_empty());

        let request = CreateModelRequest {
            enable_timeout: true,
            timeout_minutes: Some(MAX_IDLE_TIMEOUT_MINUTES),
            ..CreateModelRequest::new("demo", "mistral-7b")
        };
        f.manager.create(&request).await.unwrap();
        assert!(f.policies.get("demo").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_timeout_minutes_ignored_without_opt_in() {
        let f = fixture();
        let request = CreateModelRequest {
            timeout_minutes: Some(0),
            ..CreateModelRequest::new("demo", "mistral-7b")
        };
        f.manager.create(&request).await.unwrap();
        assert!(f.policies.scan().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_waits_for_create_of_same_name() {
        let platform = Arc::new(InMemoryPlatform::new());
        platform.set_registration_latency(Duration::from_millis(200));
        let manager = Arc::new(ModelManager::new(
            &ManagerConfig::default(),
            platform.clone(),
            platform.clone(),
            Arc::new(StaticModelHub::with_defaults()),
            Arc::new(InMemoryPolicyStore::new()),
        ));

        let creating = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.create(&CreateModelRequest::new("demo", "mistral-7b")).await })
        };

        // Create holds the name lock while registration stalls
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(platform.resource_counts(), (1, 0, 0, 0));

        let err = manager.delete("demo").await.unwrap_err();
        assert!(err.is_still_creating(), "{:?}", err);
        assert!(creating.is_finished());
        creating.await.unwrap().unwrap();

        assert_eq!(platform.resource_counts(), (1, 1, 1, 1));
    }

    #[tokio::test]
    async fn test_delete_unknown_name() {
        let f = fixture();
        assert_eq!(f.manager.delete("ghost").await.unwrap(), DeleteOutcome::NothingToDelete);
    }

    #[tokio::test]
    async fn test_query_through_manager() {
        let f = fixture();
        assert!(f.manager.query("demo", "Hi", None).await.unwrap_err().is_not_in_service());

        f.manager.create(&CreateModelRequest::new("demo", "mistral-7b")).await.unwrap();
        f.platform
            .set_endpoint_status("LLManager-demo-endpoint", EndpointStatus::InService)
            .unwrap();
        assert_eq!(
            f.manager.query("demo", "Hi", None).await.unwrap(),
            "Hi [simulated completion]"
        );
    }
}
