//! Configuration schema
//!
//! Every section carries serde defaults so an empty source yields the
//! reference deployment values.

use std::path::PathBuf;
use std::time::Duration;
use serde::{Deserialize, Serialize};

use common::utils::RetryPolicy;

/// Root configuration for the LLM Manager
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Platform resource naming
    pub naming: NamingConfig,
    /// Execution identity settings
    pub identity: IdentityConfig,
    /// Provisioning settings
    pub provisioning: ProvisioningConfig,
    /// Defaults applied when a caller opts into idle teardown
    pub timeouts: TimeoutDefaults,
    /// Idle reaper settings
    pub reaper: ReaperConfig,
    /// Query defaults
    pub query: QueryConfig,
    /// Timeout policy registry storage
    pub storage: StorageConfig,
    /// Logging settings
    pub logging: LoggingConfig,
    /// Simulated platform settings
    pub simulation: SimulationConfig,
}

/// Platform resource naming
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// Prefix of every resource name
    pub resource_prefix: String,
    /// Production variant name used for serving configurations and metrics
    pub variant_name: String,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            resource_prefix: "LLManager".to_string(),
            variant_name: "dev".to_string(),
        }
    }
}

/// Execution identity settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Service principal allowed to assume the role
    pub service_principal: String,
    /// Policies attached to every execution role
    pub policy_arns: Vec<String>,
    /// Role description
    pub description: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            service_principal: "sagemaker.amazonaws.com".to_string(),
            policy_arns: vec![
                "arn:aws:iam::aws:policy/AmazonSageMakerFullAccess".to_string(),
                "arn:aws:iam::aws:policy/AmazonS3FullAccess".to_string(),
            ],
            description: "Custom SageMaker execution role".to_string(),
        }
    }
}

/// Provisioning settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisioningConfig {
    /// Retry policy for model registration
    pub registration_retry: RetryPolicy,
    /// Instances started per endpoint
    pub initial_instance_count: u32,
    /// Weight of the single production variant
    pub initial_variant_weight: f64,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            registration_retry: RetryPolicy::default(),
            initial_instance_count: 1,
            initial_variant_weight: 1.0,
        }
    }
}

/// Defaults for timeout policies written at creation time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutDefaults {
    /// Idle minutes before teardown
    pub idle_timeout_minutes: u64,
    /// Utilization threshold in percent
    pub utilization_threshold: f64,
}

impl Default for TimeoutDefaults {
    fn default() -> Self {
        Self {
            idle_timeout_minutes: 300,
            utilization_threshold: 0.05,
        }
    }
}

/// Idle reaper settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaperConfig {
    /// Whether the scheduler runs
    pub enabled: bool,
    /// Seconds between ticks
    pub interval_secs: u64,
    /// Metric aggregation period in seconds, capped at the policy window
    pub sample_period_secs: u64,
    /// Metric namespace
    pub metric_namespace: String,
    /// Utilization metric name
    pub metric_name: String,
    /// Metric unit
    pub metric_unit: String,
    /// Aggregation statistic
    pub statistic: String,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 300,
            sample_period_secs: 60,
            metric_namespace: "/aws/sagemaker/Endpoints".to_string(),
            metric_name: "GPUUtilization".to_string(),
            metric_unit: "Percent".to_string(),
            statistic: "Average".to_string(),
        }
    }
}

impl ReaperConfig {
    /// Interval between ticks
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Generation parameters filled in when a query omits them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Sampling temperature
    pub temperature: f64,
    /// Nucleus sampling mass
    pub top_p: f64,
    /// Repetition penalty
    pub repetition_penalty: f64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            top_p: 0.15,
            repetition_penalty: 1.1,
        }
    }
}

/// Timeout policy registry backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local map
    Memory,
    /// JSON file on disk
    File,
}

/// Timeout policy registry storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend kind
    pub backend: StorageBackend,
    /// File path for the file backend
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            path: PathBuf::from("timeout-policies.json"),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable
    Pretty,
    /// One JSON object per line
    Json,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,
    /// Output format
    pub format: LogFormat,
    /// Directory for daily-rolling log files; stderr only when unset
    pub directory: Option<PathBuf>,
    /// Log file name prefix
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            directory: None,
            file_prefix: "llm-manager.log".to_string(),
        }
    }
}

/// Simulated platform settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Seconds an endpoint stays in `Creating`
    pub provisioning_delay_secs: u64,
    /// Seconds an endpoint stays in `Deleting`
    pub deletion_delay_secs: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            provisioning_delay_secs: 30,
            deletion_delay_secs: 5,
        }
    }
}
