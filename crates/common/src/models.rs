//! Common data models for LLM Manager
//!
//! This module defines the data exchanged between the lifecycle components and
//! the external platforms they drive.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::types::{EndpointStatus, LifecycleState};

/// Catalog entry mapping a short model name to its backing artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Short name used by callers (e.g. "mistral-7b")
    pub short_name: String,
    /// Model hub identifier of the backing artifact
    pub backing_artifact_id: String,
    /// Recommended hardware class
    pub hardware_class: String,
}

/// Location and runtime of a model artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSpec {
    /// Serving container image reference
    pub image: String,
    /// Object storage bucket holding the weights
    pub bucket: String,
    /// Object key (prefix) of the weights
    pub key: String,
    /// Container environment
    pub environment: HashMap<String, String>,
}

impl ArtifactSpec {
    /// Object storage URI of the weights
    pub fn artifact_uri(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }
}

/// Handle to an execution identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityHandle {
    /// Role name
    pub name: String,
    /// Platform identifier of the role
    pub arn: String,
}

/// Model registration request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRegistration {
    /// Registered model name
    pub model_name: String,
    /// Container hostname
    pub container_hostname: String,
    /// Serving container image
    pub image: String,
    /// Object storage URI of the weights
    pub artifact_uri: String,
    /// Container environment
    pub environment: HashMap<String, String>,
    /// Identity the platform assumes to run the model
    pub execution_role_arn: String,
}

/// Serving configuration request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServingConfig {
    /// Serving configuration name
    pub config_name: String,
    /// Production variant name
    pub variant_name: String,
    /// Registered model the variant serves
    pub model_name: String,
    /// Instance type
    pub hardware_class: String,
    /// Initial instance count
    pub initial_instance_count: u32,
    /// Initial variant weight
    pub initial_variant_weight: f64,
}

/// Filter for platform list calls
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    /// Only resources whose name contains this string
    pub name_contains: Option<String>,
    /// Only endpoints in this status
    pub status: Option<EndpointStatus>,
}

impl ListFilter {
    /// Filter on a name fragment
    pub fn name_contains(fragment: impl Into<String>) -> Self {
        Self {
            name_contains: Some(fragment.into()),
            status: None,
        }
    }

    /// Restricts the filter to a status
    pub fn with_status(mut self, status: EndpointStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// Summary of a registered model or serving configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSummary {
    /// Resource name
    pub name: String,
    /// Platform identifier
    pub arn: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Summary of an endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSummary {
    /// Endpoint name
    pub name: String,
    /// Current platform status
    pub status: EndpointStatus,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Point-in-time view of a served model's resources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceStatus {
    /// Served model name
    pub name: String,
    /// Execution identity exists
    pub identity: bool,
    /// Model registration exists
    pub model_registered: bool,
    /// Serving configuration exists
    pub serving_config: bool,
    /// Endpoint status if an endpoint exists
    pub endpoint: Option<EndpointStatus>,
}

impl ResourceStatus {
    /// Returns true if the endpoint is in service
    pub fn is_up(&self) -> bool {
        self.endpoint.map_or(false, |s| s.is_in_service())
    }

    /// Returns true if no resource exists
    pub fn is_absent(&self) -> bool {
        !self.identity && !self.model_registered && !self.serving_config && self.endpoint.is_none()
    }

    /// Derives the lifecycle state from the inspected resources
    pub fn lifecycle_state(&self) -> LifecycleState {
        match self.endpoint {
            Some(EndpointStatus::InService) => LifecycleState::InService,
            Some(EndpointStatus::Deleting) => LifecycleState::Deleting,
            Some(EndpointStatus::Failed) | Some(EndpointStatus::OutOfService) => LifecycleState::Failed,
            Some(_) => LifecycleState::Creating,
            None if self.is_absent() => LifecycleState::Absent,
            None => LifecycleState::Partial,
        }
    }
}

/// Per-model idle teardown policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeoutPolicy {
    /// Served model name
    pub name: String,
    /// Minutes of idleness before teardown
    pub idle_timeout_minutes: u64,
    /// Utilization (percent) below which a sample counts as idle
    pub utilization_threshold: f64,
}

impl TimeoutPolicy {
    /// Length of the trailing idleness window
    pub fn window(&self) -> Result<Duration> {
        self.idle_timeout_minutes
            .checked_mul(60)
            .map(Duration::from_secs)
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "Idle timeout of {} minutes is out of range",
                    self.idle_timeout_minutes
                ))
            })
    }
}

/// Windowed metric query against the metrics platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricQuery {
    /// Metric namespace
    pub namespace: String,
    /// Metric name
    pub metric_name: String,
    /// Dimension name/value pairs
    pub dimensions: Vec<(String, String)>,
    /// Aggregation period in seconds
    pub period_secs: u64,
    /// Statistic (e.g. "Average")
    pub statistic: String,
    /// Unit (e.g. "Percent")
    pub unit: String,
    /// Window start
    pub start: DateTime<Utc>,
    /// Window end
    pub end: DateTime<Utc>,
}

impl MetricQuery {
    /// Value of a dimension, if present
    pub fn dimension(&self, name: &str) -> Option<&str> {
        self.dimensions
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Result of a delete request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeleteOutcome {
    /// Teardown was requested
    Deleted,
    /// No resource existed
    NothingToDelete,
}

/// Answer to a status request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    /// Endpoint is in service
    pub is_up: bool,
}
