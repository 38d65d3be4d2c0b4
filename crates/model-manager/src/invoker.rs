//! Query invocation against in-service endpoints

use std::sync::Arc;
use serde_json::{json, Map, Value};
use tracing::debug;

use common::error::{Error, Result};
use platform_adapter::InferencePlatform;
use settings::QueryConfig;

use crate::inspector::StatusInspector;

/// Sends prompts to served models
pub struct QueryInvoker {
    /// Inference platform
    inference: Arc<dyn InferencePlatform>,

    /// Readiness checks
    inspector: Arc<StatusInspector>,

    /// Default generation parameters
    defaults: QueryConfig,
}

impl QueryInvoker {
    /// Creates a new query invoker
    pub fn new(inference: Arc<dyn InferencePlatform>, inspector: Arc<StatusInspector>, defaults: QueryConfig) -> Self {
        Self {
            inference,
            inspector,
            defaults,
        }
    }

    /// Fills in the default generation parameters the caller left out
    pub fn with_defaults(&self, parameters: Option<Map<String, Value>>) -> Map<String, Value> {
        let mut parameters = parameters.unwrap_or_default();
        for (key, value) in [
            ("temperature", self.defaults.temperature),
            ("top_p", self.defaults.top_p),
            ("repetition_penalty", self.defaults.repetition_penalty),
        ] {
            parameters.entry(key).or_insert_with(|| json!(value));
        }
        parameters
    }

    /// Sends `prompt` to `served_name` and returns the generated text
    pub async fn query(
        &self,
        served_name: &str,
        prompt: &str,
        parameters: Option<Map<String, Value>>,
    ) -> Result<String> {
        if !self.inspector.endpoint_in_service(served_name).await? {
            return Err(Error::NotInService(served_name.to_string()));
        }

        let payload = json!({
            "inputs": prompt,
            "parameters": self.with_defaults(parameters),
        });

        let endpoint = self.inspector.names(served_name).endpoint;
        debug!("Invoking {} with {}", endpoint, payload);

        let response = self.inference.invoke_endpoint(&endpoint, &payload).await?;
        generated_text(&response)
    }
}

/// Extracts the answer from `[{"generated_text": ...}]` or `{"generated_text": ...}`
fn generated_text(response: &Value) -> Result<String> {
    let first = match response {
        Value::Array(items) => items.first(),
        other => Some(other),
    };

    first
        .and_then(|item| item.get("generated_text"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::ExternalService(format!("Unexpected inference response: {}", response)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::types::EndpointStatus;
    use platform_adapter::InMemoryPlatform;

    fn invoker(platform: &Arc<InMemoryPlatform>) -> QueryInvoker {
        let inspector = Arc::new(StatusInspector::new(platform.clone(), platform.clone(), "LLManager"));
        QueryInvoker::new(platform.clone(), inspector, QueryConfig::default())
    }

    #[test]
    fn test_defaults_fill_only_missing_parameters() {
        let platform = Arc::new(InMemoryPlatform::new());
        let mut given = Map::new();
        given.insert("temperature".to_string(), json!(0.9));
        given.insert("max_new_tokens".to_string(), json!(64));

        let parameters = invoker(&platform).with_defaults(Some(given));
        assert_eq!(parameters["temperature"], json!(0.9));
        assert_eq!(parameters["top_p"], json!(0.15));
        assert_eq!(parameters["repetition_penalty"], json!(1.1));
        assert_eq!(parameters["max_new_tokens"], json!(64));
    }

    #[test]
    fn test_generated_text_shapes() {
        assert_eq!(generated_text(&json!([{"generated_text": "hi"}])).unwrap(), "hi");
        assert_eq!(generated_text(&json!({"generated_text": "hi"})).unwrap(), "hi");
        assert!(generated_text(&json!([])).is_err());
        assert!(generated_text(&json!({"text": "hi"})).is_err());
    }

    #[tokio::test]
    async fn test_query_requires_in_service_endpoint() {
        let platform = Arc::new(InMemoryPlatform::new());
        let err = invoker(&platform).query("demo", "Hello", None).await.unwrap_err();
        assert!(err.is_not_in_service());
    }

    #[tokio::test]
    async fn test_query_returns_generated_text() {
        use common::models::{ModelRegistration, ServingConfig};
        use platform_adapter::IdentityPlatform;
        use std::collections::HashMap;

        let platform = Arc::new(InMemoryPlatform::new());
        let role = platform.create_role("LLManager-demo-role", &json!({}), "").await.unwrap();
        platform
            .create_model(&ModelRegistration {
                model_name: "LLManager-demo-model".to_string(),
                container_hostname: "LLManager-demo-model".to_string(),
                image: "img".to_string(),
                artifact_uri: "s3://b/k".to_string(),
                environment: HashMap::new(),
                execution_role_arn: role.arn,
            })
            .await
            .unwrap();
        platform
            .create_endpoint_config(&ServingConfig {
                config_name: "LLManager-demo-endpoint-config".to_string(),
                variant_name: "dev".to_string(),
                model_name: "LLManager-demo-model".to_string(),
                hardware_class: "ml.g5.2xlarge".to_string(),
                initial_instance_count: 1,
                initial_variant_weight: 1.0,
            })
            .await
            .unwrap();
        platform
            .create_endpoint("LLManager-demo-endpoint", "LLManager-demo-endpoint-config")
            .await
            .unwrap();
        platform
            .set_endpoint_status("LLManager-demo-endpoint", EndpointStatus::InService)
            .unwrap();

        let answer = invoker(&platform).query("demo", "Hello", None).await.unwrap();
        assert_eq!(answer, "Hello [simulated completion]");
    }
}
