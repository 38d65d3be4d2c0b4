//! Endpoint provisioning
//!
//! Drives identity, model registration, serving configuration and endpoint
//! into existence, in that order. Every step first checks whether it is
//! already satisfied, so re-running a partially failed create picks up where
//! the previous run stopped.

use std::sync::Arc;
use tracing::{debug, info, warn};

use common::error::{Error, Result};
use common::models::{ArtifactSpec, ModelRegistration, ServingConfig};
use common::types::ResourceNames;
use common::utils::retry_with_backoff;
use platform_adapter::InferencePlatform;
use settings::{NamingConfig, ProvisioningConfig};

use crate::identity::IdentityProvisioner;
use crate::inspector::StatusInspector;

/// Creates the resources behind a served model
pub struct EndpointProvisioner {
    /// Inference platform
    inference: Arc<dyn InferencePlatform>,

    /// Identity provisioner
    identity: Arc<IdentityProvisioner>,

    /// Existence checks
    inspector: Arc<StatusInspector>,

    /// Resource naming
    naming: NamingConfig,

    /// Retry and capacity settings
    config: ProvisioningConfig,
}

impl EndpointProvisioner {
    /// Creates a new endpoint provisioner
    pub fn new(
        inference: Arc<dyn InferencePlatform>,
        identity: Arc<IdentityProvisioner>,
        inspector: Arc<StatusInspector>,
        naming: NamingConfig,
        config: ProvisioningConfig,
    ) -> Self {
        Self {
            inference,
            identity,
            inspector,
            naming,
            config,
        }
    }

    /// Provisions `served_name` on `hardware_class` from `artifact`.
    ///
    /// Returns once the endpoint creation request has been accepted; the
    /// endpoint itself comes up asynchronously.
    pub async fn provision(&self, served_name: &str, hardware_class: &str, artifact: &ArtifactSpec) -> Result<()> {
        let names = ResourceNames::new(&self.naming.resource_prefix, served_name);

        // Step 1: execution identity
        let identity = self.identity.ensure_identity(served_name).await?;

        // Step 2: model registration, the only retried step
        if self.inspector.model_registered(served_name).await? {
            debug!("Model {} already registered", names.model);
        } else {
            let registration = ModelRegistration {
                model_name: names.model.clone(),
                container_hostname: names.model.clone(),
                image: artifact.image.clone(),
                artifact_uri: artifact.artifact_uri(),
                environment: artifact.environment.clone(),
                execution_role_arn: identity.arn.clone(),
            };
            self.register_model(&registration).await?;
        }

        // Step 3: serving configuration
        if self.inspector.serving_config_exists(served_name).await? {
            debug!("Endpoint config {} already exists", names.endpoint_config);
        } else {
            let serving_config = ServingConfig {
                config_name: names.endpoint_config.clone(),
                variant_name: self.naming.variant_name.clone(),
                model_name: names.model.clone(),
                hardware_class: hardware_class.to_string(),
                initial_instance_count: self.config.initial_instance_count,
                initial_variant_weight: self.config.initial_variant_weight,
            };

            info!("Creating endpoint config {}", names.endpoint_config);
            tolerate_existing(self.inference.create_endpoint_config(&serving_config).await).map_err(|e| {
                Error::Provisioning(format!(
                    "Failed to create endpoint config {}: {}",
                    names.endpoint_config, e
                ))
            })?;
        }

        // Step 4: endpoint
        if self.inspector.endpoint(served_name).await?.is_some() {
            debug!("Endpoint {} already exists", names.endpoint);
        } else {
            info!("Creating endpoint {}", names.endpoint);
            tolerate_existing(
                self.inference
                    .create_endpoint(&names.endpoint, &names.endpoint_config)
                    .await,
            )
            .map_err(|e| Error::Provisioning(format!("Failed to create endpoint {}: {}", names.endpoint, e)))?;
        }

        info!("Provisioning of {} requested", served_name);

        Ok(())
    }

    async fn register_model(&self, registration: &ModelRegistration) -> Result<()> {
        info!("Registering model {}", registration.model_name);

        let inference = &self.inference;
        let operation_name = format!("register model {}", registration.model_name);

        retry_with_backoff(&self.config.registration_retry, &operation_name, || async move {
            tolerate_existing(inference.create_model(registration).await)
        })
        .await
        .map_err(|e| {
            warn!("Giving up on model {}: {}", registration.model_name, e);
            Error::Provisioning(format!("Failed to register model {}: {}", registration.model_name, e))
        })
    }
}

/// Treats "already exists" as success; a concurrent creator got there first
fn tolerate_existing(result: Result<String>) -> Result<()> {
    match result {
        Ok(_) => Ok(()),
        Err(e) if e.is_already_exists() => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::utils::RetryPolicy;
    use platform_adapter::{FaultPoint, InMemoryPlatform, PlatformOperation};
    use settings::IdentityConfig;
    use std::collections::HashMap;

    fn provisioner(platform: &Arc<InMemoryPlatform>, attempts: u32) -> EndpointProvisioner {
        let naming = NamingConfig::default();
        let identity = Arc::new(IdentityProvisioner::new(
            platform.clone(),
            IdentityConfig::default(),
            naming.resource_prefix.clone(),
        ));
        let inspector = Arc::new(StatusInspector::new(
            platform.clone(),
            platform.clone(),
            naming.resource_prefix.clone(),
        ));
        let config = ProvisioningConfig {
            registration_retry: RetryPolicy::immediate(attempts),
            ..ProvisioningConfig::default()
        };
        EndpointProvisioner::new(platform.clone(), identity, inspector, naming, config)
    }

    fn artifact() -> ArtifactSpec {
        let mut environment = HashMap::new();
        environment.insert("SM_NUM_GPUS".to_string(), "1".to_string());
        ArtifactSpec {
            image: "registry/tgi:latest".to_string(),
            bucket: "weights".to_string(),
            key: "mistral/".to_string(),
            environment,
        }
    }

    #[tokio::test]
    async fn test_provision_creates_resources_in_order() {
        let platform = Arc::new(InMemoryPlatform::new());
        provisioner(&platform, 5)
            .provision("demo", "ml.g5.2xlarge", &artifact())
            .await
            .unwrap();

        let creates: Vec<PlatformOperation> = platform
            .operations()
            .into_iter()
            .filter(|op| !matches!(op, PlatformOperation::AttachRolePolicy(..)))
            .collect();
        assert_eq!(
            creates,
            vec![
                PlatformOperation::CreateRole("LLManager-demo-role".to_string()),
                PlatformOperation::CreateModel("LLManager-demo-model".to_string()),
                PlatformOperation::CreateEndpointConfig("LLManager-demo-endpoint-config".to_string()),
                PlatformOperation::CreateEndpoint("LLManager-demo-endpoint".to_string()),
            ]
        );

        let registration = platform.model_registration("LLManager-demo-model").unwrap();
        assert_eq!(registration.container_hostname, "LLManager-demo-model");
        assert_eq!(registration.artifact_uri, "s3://weights/mistral/");

        let config = platform.serving_config("LLManager-demo-endpoint-config").unwrap();
        assert_eq!(config.variant_name, "dev");
        assert_eq!(config.hardware_class, "ml.g5.2xlarge");
        assert_eq!(config.initial_instance_count, 1);
        assert_eq!(
            platform.endpoint_config_name("LLManager-demo-endpoint").as_deref(),
            Some("LLManager-demo-endpoint-config")
        );
    }

    #[tokio::test]
    async fn test_second_provision_mutates_nothing() {
        let platform = Arc::new(InMemoryPlatform::new());
        let provisioner = provisioner(&platform, 5);
        provisioner.provision("demo", "ml.g5.2xlarge", &artifact()).await.unwrap();
        platform.clear_operations();

        provisioner.provision("demo", "ml.g5.2xlarge", &artifact()).await.unwrap();
        assert!(platform.operations().is_empty());
        assert_eq!(platform.resource_counts(), (1, 1, 1, 1));
    }

    #[tokio::test]
    async fn test_registration_retries_until_success() {
        let platform = Arc::new(InMemoryPlatform::new());
        platform.fail_next(FaultPoint::CreateModel, 3);

        provisioner(&platform, 5)
            .provision("demo", "ml.g5.2xlarge", &artifact())
            .await
            .unwrap();
        assert_eq!(platform.resource_counts(), (1, 1, 1, 1));
    }

    #[tokio::test]
    async fn test_exhausted_registration_stops_before_config() {
        let platform = Arc::new(InMemoryPlatform::new());
        platform.fail_next(FaultPoint::CreateModel, 5);

        let err = provisioner(&platform, 5)
            .provision("demo", "ml.g5.2xlarge", &artifact())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Provisioning(_)));

        // Identity exists, nothing downstream of the registration does
        assert_eq!(platform.resource_counts(), (1, 0, 0, 0));
    }

    #[tokio::test]
    async fn test_rerun_after_failure_completes() {
        let platform = Arc::new(InMemoryPlatform::new());
        let provisioner = provisioner(&platform, 1);
        platform.fail_next(FaultPoint::CreateEndpoint, 1);

        let err = provisioner
            .provision("demo", "ml.g5.2xlarge", &artifact())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Provisioning(_)));
        assert_eq!(platform.resource_counts(), (1, 1, 1, 0));

        platform.clear_operations();
        provisioner.provision("demo", "ml.g5.2xlarge", &artifact()).await.unwrap();
        assert_eq!(
            platform.operations(),
            vec![PlatformOperation::CreateEndpoint("LLManager-demo-endpoint".to_string())]
        );
    }
}
