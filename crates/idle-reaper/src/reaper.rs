//! Idle endpoint reaper
//!
//! One sweep loads every timeout policy, intersects it with the endpoints
//! currently in service, samples each candidate's utilization over its idle
//! window and tears down the ones that stayed below their threshold. The
//! sweep reads first and acts afterwards; the per-name lock is only taken by
//! the teardown itself.

use std::collections::BTreeSet;
use std::sync::Arc;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use common::error::{Error, Result};
use common::models::{DeleteOutcome, ListFilter, MetricQuery, TimeoutPolicy};
use common::types::{EndpointStatus, ResourceNames};
use model_manager::Deprovision;
use platform_adapter::{InferencePlatform, MetricsSource};
use settings::{NamingConfig, ReaperConfig};
use storage_adapter::PolicyStore;

/// Smallest aggregation period the metrics platform accepts
const MIN_PERIOD_SECS: u64 = 60;

/// Outcome of one sweep
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReapReport {
    /// When the sweep started
    pub started_at: Option<DateTime<Utc>>,

    /// Number of timeout policies
    pub policies: usize,

    /// Policies whose endpoint is in service
    pub candidates: Vec<String>,

    /// Candidates found idle
    pub idle: Vec<String>,

    /// Idle candidates whose teardown was requested
    pub deleted: Vec<String>,

    /// Candidates that failed, with the error
    pub failures: Vec<(String, String)>,
}

/// Returns true if every sample is below `threshold`.
///
/// An empty sample set is never idle.
pub fn is_idle(samples: &[f64], threshold: f64) -> bool {
    !samples.is_empty() && samples.iter().all(|sample| *sample < threshold)
}

/// Tears down endpoints idle past their policy
pub struct IdleReaper {
    /// Inference platform
    inference: Arc<dyn InferencePlatform>,

    /// Utilization source
    metrics: Arc<dyn MetricsSource>,

    /// Timeout policy registry
    policies: Arc<dyn PolicyStore>,

    /// Teardown entry point
    deprovisioner: Arc<dyn Deprovision>,

    /// Resource naming
    naming: NamingConfig,

    /// Metric settings
    config: ReaperConfig,
}

impl IdleReaper {
    /// Creates a new idle reaper
    pub fn new(
        inference: Arc<dyn InferencePlatform>,
        metrics: Arc<dyn MetricsSource>,
        policies: Arc<dyn PolicyStore>,
        deprovisioner: Arc<dyn Deprovision>,
        naming: NamingConfig,
        config: ReaperConfig,
    ) -> Self {
        Self {
            inference,
            metrics,
            policies,
            deprovisioner,
            naming,
            config,
        }
    }

    /// Runs one sweep.
    ///
    /// Fails only when the policies or the endpoint list cannot be read;
    /// per-candidate failures are recorded in the report.
    pub async fn reap(&self) -> Result<ReapReport> {
        let started_at = Utc::now();
        let mut report = ReapReport {
            started_at: Some(started_at),
            ..ReapReport::default()
        };

        let policies = self.policies.scan().await?;
        report.policies = policies.len();

        if policies.is_empty() {
            debug!("No timeout policies registered");
            return Ok(report);
        }

        let in_service = self.in_service_models().await?;
        let candidates: Vec<TimeoutPolicy> = policies
            .into_iter()
            .filter(|policy| in_service.contains(&policy.name))
            .collect();
        report.candidates = candidates.iter().map(|p| p.name.clone()).collect();

        debug!(
            "{} of {} policies have an endpoint in service",
            candidates.len(),
            report.policies
        );

        let verdicts = join_all(candidates.iter().map(|policy| self.check_idle(policy, started_at))).await;

        for (policy, verdict) in candidates.iter().zip(verdicts) {
            match verdict {
                Ok(true) => report.idle.push(policy.name.clone()),
                Ok(false) => {}
                Err(e) => {
                    warn!("Failed to sample utilization of {}: {}", policy.name, e);
                    report.failures.push((policy.name.clone(), e.to_string()));
                }
            }
        }

        for name in &report.idle {
            info!("Tearing down idle model {}", name);
            match self.deprovisioner.deprovision(name).await {
                Ok(DeleteOutcome::Deleted) => report.deleted.push(name.clone()),
                Ok(DeleteOutcome::NothingToDelete) => debug!("{} was already gone", name),
                Err(e) => {
                    warn!("Failed to tear down {}: {}", name, e);
                    report.failures.push((name.clone(), e.to_string()));
                }
            }
        }

        info!(
            "Reaper sweep done: {} candidates, {} idle, {} deleted, {} failures",
            report.candidates.len(),
            report.idle.len(),
            report.deleted.len(),
            report.failures.len()
        );

        Ok(report)
    }

    /// Served model names with an in-service endpoint
    async fn in_service_models(&self) -> Result<BTreeSet<String>> {
        let prefix = &self.naming.resource_prefix;
        let filter = ListFilter::name_contains(prefix.as_str()).with_status(EndpointStatus::InService);
        let endpoints = self.inference.list_endpoints(&filter).await?;

        Ok(endpoints
            .iter()
            .filter_map(|e| ResourceNames::served_name_from_endpoint(prefix, &e.name))
            .collect())
    }

    /// Utilization query covering the policy's trailing window
    pub fn metric_query(&self, policy: &TimeoutPolicy, end: DateTime<Utc>) -> Result<MetricQuery> {
        let window_secs = policy.window()?.as_secs().max(MIN_PERIOD_SECS);
        let start = i64::try_from(window_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|window| end.checked_sub_signed(window))
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "Idle window of {} seconds for {} is out of range",
                    window_secs, policy.name
                ))
            })?;
        let period_secs = self.config.sample_period_secs.clamp(MIN_PERIOD_SECS, window_secs);
        let endpoint = ResourceNames::new(&self.naming.resource_prefix, &policy.name).endpoint;

        Ok(MetricQuery {
            namespace: self.config.metric_namespace.clone(),
            metric_name: self.config.metric_name.clone(),
            dimensions: vec![
                ("EndpointName".to_string(), endpoint),
                ("VariantName".to_string(), self.naming.variant_name.clone()),
            ],
            period_secs,
            statistic: self.config.statistic.clone(),
            unit: self.config.metric_unit.clone(),
            start,
            end,
        })
    }

    async fn check_idle(&self, policy: &TimeoutPolicy, end: DateTime<Utc>) -> Result<bool> {
        let query = self.metric_query(policy, end)?;
        let samples = self.metrics.query_samples(&query).await?;
        let idle = is_idle(&samples, policy.utilization_threshold);

        debug!(
            "{}: {} samples, threshold {}%, idle: {}",
            policy.name,
            samples.len(),
            policy.utilization_threshold,
            idle
        );

        Ok(idle)
    }
}
