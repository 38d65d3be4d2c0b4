//! In-memory platform
//!
//! A single process-local stand-in for the inference, identity and metrics
//! platforms. It enforces the same dependency rules as the managed services
//! (a model needs its role, a serving configuration needs its model, an
//! endpoint needs its serving configuration), moves endpoints through
//! `Creating -> InService` and `Deleting -> gone` after configurable delays,
//! and records every mutating call so callers can observe side effects.

use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use common::error::{Error, Result};
use common::models::{
    EndpointSummary, IdentityHandle, ListFilter, MetricQuery, ModelRegistration, ResourceSummary,
    ServingConfig,
};
use common::types::EndpointStatus;

use crate::identity::IdentityPlatform;
use crate::inference::InferencePlatform;
use crate::metrics::MetricsSource;

/// Mutating platform call, as recorded by the in-memory platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformOperation {
    CreateRole(String),
    AttachRolePolicy(String, String),
    DetachRolePolicy(String, String),
    DeleteRole(String),
    CreateModel(String),
    DeleteModel(String),
    CreateEndpointConfig(String),
    DeleteEndpointConfig(String),
    CreateEndpoint(String),
    DeleteEndpoint(String),
}

/// Call that can be made to fail on demand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    GetRole,
    CreateRole,
    AttachRolePolicy,
    CreateModel,
    CreateEndpointConfig,
    CreateEndpoint,
    DeleteEndpoint,
    DeleteEndpointConfig,
    DeleteModel,
    DeleteRole,
    ListEndpoints,
    QueryMetrics,
    InvokeEndpoint,
}

#[derive(Debug, Clone)]
struct RoleRecord {
    handle: IdentityHandle,
    trust_policy: Value,
    policies: BTreeSet<String>,
}

#[derive(Debug, Clone)]
struct EndpointRecord {
    config_name: String,
    status: EndpointStatus,
    created_at: DateTime<Utc>,
    changed_at: Instant,
}

#[derive(Debug, Default)]
struct PlatformState {
    roles: HashMap<String, RoleRecord>,
    models: HashMap<String, (ModelRegistration, ResourceSummary)>,
    configs: HashMap<String, (ServingConfig, ResourceSummary)>,
    endpoints: HashMap<String, EndpointRecord>,
    samples: HashMap<String, Vec<f64>>,
    responses: HashMap<String, Value>,
    faults: HashMap<FaultPoint, u32>,
    operations: Vec<PlatformOperation>,
    metric_queries: Vec<MetricQuery>,
    registration_latency: Option<Duration>,
}

impl PlatformState {
    /// Consumes one injected failure for `point`, if any
    fn take_fault(&mut self, point: FaultPoint) -> Result<()> {
        match self.faults.get_mut(&point) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(Error::ExternalService(format!("injected failure at {:?}", point)))
            }
            _ => Ok(()),
        }
    }

    /// Applies time-based endpoint transitions
    fn advance(&mut self, provisioning_delay: Option<Duration>, deletion_delay: Option<Duration>) {
        let now = Instant::now();
        self.endpoints.retain(|name, record| {
            let elapsed = now.duration_since(record.changed_at);
            match record.status {
                EndpointStatus::Creating => {
                    if provisioning_delay.map_or(false, |d| elapsed >= d) {
                        debug!("Endpoint {} is now in service", name);
                        record.status = EndpointStatus::InService;
                        record.changed_at = now;
                    }
                    true
                }
                EndpointStatus::Deleting => !deletion_delay.map_or(false, |d| elapsed >= d),
                _ => true,
            }
        });
    }
}

fn matches_name(filter: &ListFilter, name: &str) -> bool {
    filter
        .name_contains
        .as_deref()
        .map_or(true, |fragment| name.contains(fragment))
}

fn arn(kind: &str, name: &str) -> String {
    format!("arn:aws:sagemaker:local:000000000000:{}/{}", kind, name.to_lowercase())
}

/// Process-local inference, identity and metrics platform
#[derive(Debug)]
pub struct InMemoryPlatform {
    /// Platform state
    state: Mutex<PlatformState>,
    /// Time an endpoint spends in `Creating`; `None` keeps it there until changed explicitly
    provisioning_delay: Option<Duration>,
    /// Time an endpoint spends in `Deleting`; `None` keeps it there until changed explicitly
    deletion_delay: Option<Duration>,
}

impl Default for InMemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryPlatform {
    /// Endpoints stay `Creating` until [`set_endpoint_status`](Self::set_endpoint_status)
    /// is called; deletions complete immediately.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PlatformState::default()),
            provisioning_delay: None,
            deletion_delay: Some(Duration::ZERO),
        }
    }

    /// Platform whose endpoints come up and go away on their own
    pub fn simulated(provisioning_delay: Duration, deletion_delay: Duration) -> Self {
        Self {
            state: Mutex::new(PlatformState::default()),
            provisioning_delay: Some(provisioning_delay),
            deletion_delay: Some(deletion_delay),
        }
    }

    /// Forces an endpoint into `status`
    pub fn set_endpoint_status(&self, endpoint_name: &str, status: EndpointStatus) -> Result<()> {
        let mut state = self.state.lock();
        let record = state
            .endpoints
            .get_mut(endpoint_name)
            .ok_or_else(|| Error::NotFound(format!("Endpoint {}", endpoint_name)))?;
        record.status = status;
        record.changed_at = Instant::now();
        Ok(())
    }

    /// Sets the utilization samples returned for an endpoint
    pub fn set_samples(&self, endpoint_name: &str, samples: Vec<f64>) {
        self.state.lock().samples.insert(endpoint_name.to_string(), samples);
    }

    /// Sets the raw response returned when an endpoint is invoked
    pub fn set_invoke_response(&self, endpoint_name: &str, response: Value) {
        self.state.lock().responses.insert(endpoint_name.to_string(), response);
    }

    /// Makes the next `times` calls at `point` fail
    pub fn fail_next(&self, point: FaultPoint, times: u32) {
        self.state.lock().faults.insert(point, times);
    }

    /// Delays every model registration call by `latency`
    pub fn set_registration_latency(&self, latency: Duration) {
        self.state.lock().registration_latency = Some(latency);
    }

    /// Mutating calls made so far, in order
    pub fn operations(&self) -> Vec<PlatformOperation> {
        self.state.lock().operations.clone()
    }

    /// Forgets recorded operations
    pub fn clear_operations(&self) {
        self.state.lock().operations.clear();
    }

    /// Metric queries received so far
    pub fn metric_queries(&self) -> Vec<MetricQuery> {
        self.state.lock().metric_queries.clone()
    }

    /// Trust policy and attached policies of a role
    pub fn role_details(&self, role_name: &str) -> Option<(Value, Vec<String>)> {
        self.state
            .lock()
            .roles
            .get(role_name)
            .map(|r| (r.trust_policy.clone(), r.policies.iter().cloned().collect()))
    }

    /// Registration request of a model
    pub fn model_registration(&self, model_name: &str) -> Option<ModelRegistration> {
        self.state.lock().models.get(model_name).map(|(m, _)| m.clone())
    }

    /// Serving configuration request
    pub fn serving_config(&self, config_name: &str) -> Option<ServingConfig> {
        self.state.lock().configs.get(config_name).map(|(c, _)| c.clone())
    }

    /// Serving configuration an endpoint was created from
    pub fn endpoint_config_name(&self, endpoint_name: &str) -> Option<String> {
        self.state
            .lock()
            .endpoints
            .get(endpoint_name)
            .map(|e| e.config_name.clone())
    }

    /// Number of roles, models, serving configurations and endpoints
    pub fn resource_counts(&self) -> (usize, usize, usize, usize) {
        let state = self.state.lock();
        (
            state.roles.len(),
            state.models.len(),
            state.configs.len(),
            state.endpoints.len(),
        )
    }

    fn lock_advanced(&self) -> parking_lot::MutexGuard<'_, PlatformState> {
        let mut state = self.state.lock();
        state.advance(self.provisioning_delay, self.deletion_delay);
        state
    }
}

#[async_trait]
impl InferencePlatform for InMemoryPlatform {
    async fn create_model(&self, registration: &ModelRegistration) -> Result<String> {
        let latency = self.state.lock().registration_latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.lock_advanced();
        state.take_fault(FaultPoint::CreateModel)?;

        if state.models.contains_key(&registration.model_name) {
            return Err(Error::AlreadyExists(format!("Model {}", registration.model_name)));
        }

        if !state
            .roles
            .values()
            .any(|r| r.handle.arn == registration.execution_role_arn)
        {
            return Err(Error::InvalidArgument(format!(
                "Could not assume role {}",
                registration.execution_role_arn
            )));
        }

        let summary = ResourceSummary {
            name: registration.model_name.clone(),
            arn: arn("model", &registration.model_name),
            created_at: Utc::now(),
        };
        let model_arn = summary.arn.clone();
        state
            .models
            .insert(registration.model_name.clone(), (registration.clone(), summary));
        state
            .operations
            .push(PlatformOperation::CreateModel(registration.model_name.clone()));

        Ok(model_arn)
    }

    async fn delete_model(&self, model_name: &str) -> Result<()> {
        let mut state = self.lock_advanced();
        state.take_fault(FaultPoint::DeleteModel)?;

        state
            .models
            .remove(model_name)
            .ok_or_else(|| Error::NotFound(format!("Model {}", model_name)))?;
        state
            .operations
            .push(PlatformOperation::DeleteModel(model_name.to_string()));

        Ok(())
    }

    async fn list_models(&self, filter: &ListFilter) -> Result<Vec<ResourceSummary>> {
        let state = self.lock_advanced();
        Ok(state
            .models
            .values()
            .filter(|(_, s)| matches_name(filter, &s.name))
            .map(|(_, s)| s.clone())
            .collect())
    }

    async fn create_endpoint_config(&self, config: &ServingConfig) -> Result<String> {
        let mut state = self.lock_advanced();
        state.take_fault(FaultPoint::CreateEndpointConfig)?;

        if state.configs.contains_key(&config.config_name) {
            return Err(Error::AlreadyExists(format!("Endpoint config {}", config.config_name)));
        }

        if !state.models.contains_key(&config.model_name) {
            return Err(Error::InvalidArgument(format!("Could not find model {}", config.model_name)));
        }

        let summary = ResourceSummary {
            name: config.config_name.clone(),
            arn: arn("endpoint-config", &config.config_name),
            created_at: Utc::now(),
        };
        let config_arn = summary.arn.clone();
        state
            .configs
            .insert(config.config_name.clone(), (config.clone(), summary));
        state
            .operations
            .push(PlatformOperation::CreateEndpointConfig(config.config_name.clone()));

        Ok(config_arn)
    }

    async fn delete_endpoint_config(&self, config_name: &str) -> Result<()> {
        let mut state = self.lock_advanced();
        state.take_fault(FaultPoint::DeleteEndpointConfig)?;

        state
            .configs
            .remove(config_name)
            .ok_or_else(|| Error::NotFound(format!("Endpoint config {}", config_name)))?;
        state
            .operations
            .push(PlatformOperation::DeleteEndpointConfig(config_name.to_string()));

        Ok(())
    }

    async fn list_endpoint_configs(&self, filter: &ListFilter) -> Result<Vec<ResourceSummary>> {
        let state = self.lock_advanced();
        Ok(state
            .configs
            .values()
            .filter(|(_, s)| matches_name(filter, &s.name))
            .map(|(_, s)| s.clone())
            .collect())
    }

    async fn create_endpoint(&self, endpoint_name: &str, config_name: &str) -> Result<String> {
        let mut state = self.lock_advanced();
        state.take_fault(FaultPoint::CreateEndpoint)?;

        if state.endpoints.contains_key(endpoint_name) {
            return Err(Error::AlreadyExists(format!("Endpoint {}", endpoint_name)));
        }

        if !state.configs.contains_key(config_name) {
            return Err(Error::InvalidArgument(format!(
                "Could not find endpoint configuration {}",
                config_name
            )));
        }

        state.endpoints.insert(
            endpoint_name.to_string(),
            EndpointRecord {
                config_name: config_name.to_string(),
                status: EndpointStatus::Creating,
                created_at: Utc::now(),
                changed_at: Instant::now(),
            },
        );
        state
            .operations
            .push(PlatformOperation::CreateEndpoint(endpoint_name.to_string()));

        // A zero delay takes effect on the next read, not inside the create call.
        Ok(arn("endpoint", endpoint_name))
    }

    async fn delete_endpoint(&self, endpoint_name: &str) -> Result<()> {
        let mut state = self.lock_advanced();
        state.take_fault(FaultPoint::DeleteEndpoint)?;

        let record = state
            .endpoints
            .get_mut(endpoint_name)
            .ok_or_else(|| Error::NotFound(format!("Endpoint {}", endpoint_name)))?;
        record.status = EndpointStatus::Deleting;
        record.changed_at = Instant::now();
        state
            .operations
            .push(PlatformOperation::DeleteEndpoint(endpoint_name.to_string()));

        if self.deletion_delay == Some(Duration::ZERO) {
            state.endpoints.remove(endpoint_name);
        }

        Ok(())
    }

    async fn list_endpoints(&self, filter: &ListFilter) -> Result<Vec<EndpointSummary>> {
        let mut state = self.lock_advanced();
        state.take_fault(FaultPoint::ListEndpoints)?;

        let mut endpoints: Vec<EndpointSummary> = state
            .endpoints
            .iter()
            .filter(|(name, record)| {
                matches_name(filter, name) && filter.status.map_or(true, |s| s == record.status)
            })
            .map(|(name, record)| EndpointSummary {
                name: name.clone(),
                status: record.status,
                created_at: record.created_at,
            })
            .collect();
        endpoints.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(endpoints)
    }

    async fn invoke_endpoint(&self, endpoint_name: &str, payload: &Value) -> Result<Value> {
        let mut state = self.lock_advanced();
        state.take_fault(FaultPoint::InvokeEndpoint)?;

        match state.endpoints.get(endpoint_name) {
            Some(record) if record.status.is_in_service() => {}
            Some(record) => {
                return Err(Error::ExternalService(format!(
                    "Endpoint {} is {}",
                    endpoint_name, record.status
                )))
            }
            None => return Err(Error::NotFound(format!("Endpoint {}", endpoint_name))),
        }

        if let Some(response) = state.responses.get(endpoint_name) {
            return Ok(response.clone());
        }

        let inputs = payload.get("inputs").and_then(Value::as_str).unwrap_or_default();
        Ok(json!([{ "generated_text": format!("{} [simulated completion]", inputs) }]))
    }
}

#[async_trait]
impl IdentityPlatform for InMemoryPlatform {
    async fn get_role(&self, role_name: &str) -> Result<Option<IdentityHandle>> {
        let mut state = self.state.lock();
        state.take_fault(FaultPoint::GetRole)?;
        Ok(state.roles.get(role_name).map(|r| r.handle.clone()))
    }

    async fn create_role(
        &self,
        role_name: &str,
        trust_policy: &Value,
        _description: &str,
    ) -> Result<IdentityHandle> {
        let mut state = self.state.lock();
        state.take_fault(FaultPoint::CreateRole)?;

        if state.roles.contains_key(role_name) {
            return Err(Error::AlreadyExists(format!("Role {}", role_name)));
        }

        let handle = IdentityHandle {
            name: role_name.to_string(),
            arn: format!("arn:aws:iam::000000000000:role/{}-{}", role_name, Uuid::new_v4().simple()),
        };
        state.roles.insert(
            role_name.to_string(),
            RoleRecord {
                handle: handle.clone(),
                trust_policy: trust_policy.clone(),
                policies: BTreeSet::new(),
            },
        );
        state
            .operations
            .push(PlatformOperation::CreateRole(role_name.to_string()));

        Ok(handle)
    }

    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.take_fault(FaultPoint::AttachRolePolicy)?;

        let role = state
            .roles
            .get_mut(role_name)
            .ok_or_else(|| Error::NotFound(format!("Role {}", role_name)))?;
        role.policies.insert(policy_arn.to_string());
        state.operations.push(PlatformOperation::AttachRolePolicy(
            role_name.to_string(),
            policy_arn.to_string(),
        ));

        Ok(())
    }

    async fn detach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<()> {
        let mut state = self.state.lock();

        let role = state
            .roles
            .get_mut(role_name)
            .ok_or_else(|| Error::NotFound(format!("Role {}", role_name)))?;
        if !role.policies.remove(policy_arn) {
            return Err(Error::NotFound(format!(
                "Policy {} not attached to {}",
                policy_arn, role_name
            )));
        }
        state.operations.push(PlatformOperation::DetachRolePolicy(
            role_name.to_string(),
            policy_arn.to_string(),
        ));

        Ok(())
    }

    async fn delete_role(&self, role_name: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.take_fault(FaultPoint::DeleteRole)?;

        match state.roles.get(role_name) {
            None => return Err(Error::NotFound(format!("Role {}", role_name))),
            Some(role) if !role.policies.is_empty() => {
                return Err(Error::InvalidArgument(format!(
                    "Role {} still has {} attached policies",
                    role_name,
                    role.policies.len()
                )))
            }
            Some(_) => {}
        }

        state.roles.remove(role_name);
        state
            .operations
            .push(PlatformOperation::DeleteRole(role_name.to_string()));

        Ok(())
    }
}

#[async_trait]
impl MetricsSource for InMemoryPlatform {
    async fn query_samples(&self, query: &MetricQuery) -> Result<Vec<f64>> {
        let mut state = self.state.lock();
        state.take_fault(FaultPoint::QueryMetrics)?;
        state.metric_queries.push(query.clone());

        let samples = query
            .dimension("EndpointName")
            .and_then(|endpoint| state.samples.get(endpoint))
            .cloned()
            .unwrap_or_default();

        Ok(samples)
    }
}
