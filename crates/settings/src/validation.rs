//! Configuration validation

use common::error::{Error, Result};

use crate::schema::ManagerConfig;

/// Longest default idle timeout, in minutes (7 days)
const MAX_IDLE_TIMEOUT_MINUTES: u64 = 7 * 24 * 60;

/// Rejects configurations the manager cannot run with
pub fn validate(config: &ManagerConfig) -> Result<()> {
    if config.naming.resource_prefix.trim().is_empty() {
        return Err(Error::Config("naming.resource_prefix must not be empty".to_string()));
    }

    if config.naming.variant_name.trim().is_empty() {
        return Err(Error::Config("naming.variant_name must not be empty".to_string()));
    }

    if config.provisioning.registration_retry.max_attempts == 0 {
        return Err(Error::Config(
            "provisioning.registration_retry.max_attempts must be at least 1".to_string(),
        ));
    }

    let multiplier = config.provisioning.registration_retry.backoff_multiplier;
    if !(multiplier.is_finite() && multiplier >= 1.0) {
        return Err(Error::Config(
            "provisioning.registration_retry.backoff_multiplier must be >= 1.0".to_string(),
        ));
    }

    if config.provisioning.initial_instance_count == 0 {
        return Err(Error::Config("provisioning.initial_instance_count must be at least 1".to_string()));
    }

    if config.reaper.interval_secs == 0 {
        return Err(Error::Config("reaper.interval_secs must be greater than zero".to_string()));
    }

    if config.reaper.sample_period_secs == 0 {
        return Err(Error::Config("reaper.sample_period_secs must be greater than zero".to_string()));
    }

    if config.timeouts.idle_timeout_minutes == 0 || config.timeouts.idle_timeout_minutes > MAX_IDLE_TIMEOUT_MINUTES {
        return Err(Error::Config(format!(
            "timeouts.idle_timeout_minutes must be between 1 and {}",
            MAX_IDLE_TIMEOUT_MINUTES
        )));
    }

    Ok(())
}
