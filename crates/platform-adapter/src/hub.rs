//! Model hub lookup
//!
//! Resolves a backing artifact identifier to its container image, weights
//! location and default environment.

use std::collections::HashMap;
use async_trait::async_trait;

use common::error::{Error, Result};
use common::models::ArtifactSpec;

/// External model hub
#[async_trait]
pub trait ModelHub: Send + Sync {
    /// Looks up the artifact for `artifact_id` as served on `hardware_class`
    async fn lookup(&self, artifact_id: &str, hardware_class: &str) -> Result<ArtifactSpec>;
}

const TGI_IMAGE: &str = "763104351884.dkr.ecr.us-east-1.amazonaws.com/huggingface-pytorch-tgi-inference:2.1.1-tgi1.4.0-gpu-py310-cu121-ubuntu22.04";
const DJL_IMAGE: &str = "763104351884.dkr.ecr.us-east-1.amazonaws.com/djl-inference:0.26.0-deepspeed0.12.6-cu121";
const HUB_BUCKET: &str = "jumpstart-cache-prod-us-east-1";

/// Model hub backed by a fixed table
#[derive(Debug, Clone, Default)]
pub struct StaticModelHub {
    /// Artifact id -> (image, bucket, key)
    artifacts: HashMap<String, (String, String, String)>,
}

impl StaticModelHub {
    /// Creates an empty hub
    pub fn new() -> Self {
        Self::default()
    }

    /// Hub pre-populated with the artifacts behind the built-in catalog
    pub fn with_defaults() -> Self {
        let mut hub = Self::new();
        for (artifact_id, image, family) in [
            ("huggingface-llm-mistral-7b", TGI_IMAGE, "huggingface-llm"),
            ("huggingface-llm-mixtral-8x7b", TGI_IMAGE, "huggingface-llm"),
            ("meta-textgeneration-llama-2-7b", DJL_IMAGE, "meta-textgeneration"),
            ("meta-textgeneration-llama-2-70b", DJL_IMAGE, "meta-textgeneration"),
        ] {
            hub.register(
                artifact_id,
                image,
                HUB_BUCKET,
                &format!("{}/{}/artifacts/inference-prepack/v1.0.0/", family, artifact_id),
            );
        }
        hub
    }

    /// Adds or replaces an artifact
    pub fn register(&mut self, artifact_id: &str, image: &str, bucket: &str, key: &str) {
        self.artifacts.insert(
            artifact_id.to_string(),
            (image.to_string(), bucket.to_string(), key.to_string()),
        );
    }
}

/// Accelerators per instance for the hardware classes the catalog uses
fn accelerator_count(hardware_class: &str) -> u32 {
    match hardware_class {
        "ml.g5.48xlarge" | "ml.p4d.24xlarge" => 8,
        "ml.g5.12xlarge" | "ml.g5.24xlarge" => 4,
        _ => 1,
    }
}

#[async_trait]
impl ModelHub for StaticModelHub {
    async fn lookup(&self, artifact_id: &str, hardware_class: &str) -> Result<ArtifactSpec> {
        let (image, bucket, key) = self
            .artifacts
            .get(artifact_id)
            .ok_or_else(|| Error::UnknownModel(artifact_id.to_string()))?;

        let mut environment = HashMap::new();
        environment.insert("HF_MODEL_ID".to_string(), "/opt/ml/model".to_string());
        environment.insert("SM_NUM_GPUS".to_string(), accelerator_count(hardware_class).to_string());
        environment.insert("MAX_INPUT_LENGTH".to_string(), "4095".to_string());
        environment.insert("MAX_TOTAL_TOKENS".to_string(), "4096".to_string());
        environment.insert("ENDPOINT_SERVER_TIMEOUT".to_string(), "3600".to_string());

        Ok(ArtifactSpec {
            image: image.clone(),
            bucket: bucket.clone(),
            key: key.clone(),
            environment,
        })
    }
}
