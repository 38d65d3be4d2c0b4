//! Metrics platform interface

use async_trait::async_trait;

use common::error::Result;
use common::models::MetricQuery;

/// Time-series query capability of the external metrics platform
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Returns one aggregated value per period inside the query window.
    ///
    /// An empty vector means the platform had no datapoints.
    async fn query_samples(&self, query: &MetricQuery) -> Result<Vec<f64>>;
}
