//! Common types for LLM Manager
//!
//! Endpoint status values reported by the inference platform, the derived
//! lifecycle state of a served model, and the deterministic naming scheme that
//! ties a served model to its platform resources.

use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};

/// Endpoint status as reported by the managed inference platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EndpointStatus {
    /// Endpoint is being created
    Creating,
    /// Endpoint is being updated
    Updating,
    /// Platform maintenance in progress
    SystemUpdating,
    /// Update is being rolled back
    RollingBack,
    /// Endpoint accepts invocations
    InService,
    /// Endpoint exists but does not accept invocations
    OutOfService,
    /// Deletion has been requested
    Deleting,
    /// Creation or update failed
    Failed,
}

impl EndpointStatus {
    /// Returns true if the endpoint accepts invocations
    pub fn is_in_service(&self) -> bool {
        matches!(self, EndpointStatus::InService)
    }

    /// Returns true while the platform is still bringing the endpoint up
    pub fn is_transitioning(&self) -> bool {
        matches!(
            self,
            EndpointStatus::Creating
                | EndpointStatus::Updating
                | EndpointStatus::SystemUpdating
                | EndpointStatus::RollingBack
        )
    }
}

impl fmt::Display for EndpointStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EndpointStatus::Creating => "Creating",
            EndpointStatus::Updating => "Updating",
            EndpointStatus::SystemUpdating => "SystemUpdating",
            EndpointStatus::RollingBack => "RollingBack",
            EndpointStatus::InService => "InService",
            EndpointStatus::OutOfService => "OutOfService",
            EndpointStatus::Deleting => "Deleting",
            EndpointStatus::Failed => "Failed",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for EndpointStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "creating" => Ok(EndpointStatus::Creating),
            "updating" => Ok(EndpointStatus::Updating),
            "systemupdating" => Ok(EndpointStatus::SystemUpdating),
            "rollingback" => Ok(EndpointStatus::RollingBack),
            "inservice" | "in-service" | "in_service" => Ok(EndpointStatus::InService),
            "outofservice" => Ok(EndpointStatus::OutOfService),
            "deleting" => Ok(EndpointStatus::Deleting),
            "failed" => Ok(EndpointStatus::Failed),
            _ => Err(format!("Unknown endpoint status: {}", s)),
        }
    }
}

/// Lifecycle state of a served model, always derived from a fresh inspection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    /// No resource exists
    Absent,
    /// Some resources exist but no endpoint
    Partial,
    /// Endpoint is being created or updated
    Creating,
    /// Endpoint is in service
    InService,
    /// Endpoint deletion has been requested
    Deleting,
    /// Endpoint failed or is out of service
    Failed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Absent => write!(f, "Absent"),
            LifecycleState::Partial => write!(f, "Partial"),
            LifecycleState::Creating => write!(f, "Creating"),
            LifecycleState::InService => write!(f, "InService"),
            LifecycleState::Deleting => write!(f, "Deleting"),
            LifecycleState::Failed => write!(f, "Failed"),
        }
    }
}

/// Deterministic platform resource names for one served model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceNames {
    /// Served model name chosen by the caller
    pub served_name: String,
    /// Execution identity (role) name
    pub role: String,
    /// Model registration name, also used as container hostname
    pub model: String,
    /// Serving configuration name
    pub endpoint_config: String,
    /// Endpoint name
    pub endpoint: String,
}

const ENDPOINT_SUFFIX: &str = "-endpoint";

impl ResourceNames {
    /// Builds the resource names for `served_name` under `prefix`
    pub fn new(prefix: &str, served_name: &str) -> Self {
        let base = format!("{}-{}", prefix, served_name);
        Self {
            served_name: served_name.to_string(),
            role: format!("{}-role", base),
            model: format!("{}-model", base),
            endpoint_config: format!("{}-endpoint-config", base),
            endpoint: format!("{}{}", base, ENDPOINT_SUFFIX),
        }
    }

    /// Recovers the served model name from a platform endpoint name.
    ///
    /// Returns `None` for endpoints that were not created under `prefix`.
    pub fn served_name_from_endpoint(prefix: &str, endpoint_name: &str) -> Option<String> {
        let rest = endpoint_name.strip_prefix(prefix)?.strip_prefix('-')?;
        let served = rest.strip_suffix(ENDPOINT_SUFFIX)?;
        if served.is_empty() {
            None
        } else {
            Some(served.to_string())
        }
    }
}
