//! Model catalog
//!
//! Maps the short model names callers use to the model hub artifact and the
//! hardware class it is served on. Pure lookup, no I/O.

use std::collections::BTreeMap;

use common::error::{Error, Result};
use common::models::ModelDescriptor;

/// Built-in catalog: (short name, backing artifact, hardware class)
const BUILTIN_MODELS: &[(&str, &str, &str)] = &[
    ("mistral-7b", "huggingface-llm-mistral-7b", "ml.g5.2xlarge"),
    ("mixtral-8x7b", "huggingface-llm-mixtral-8x7b", "ml.g5.48xlarge"),
    ("llama-2-7b", "meta-textgeneration-llama-2-7b", "ml.g5.2xlarge"),
    ("llama-2-70b", "meta-textgeneration-llama-2-70b", "ml.g5.48xlarge"),
];

/// Resolves short model names to catalog descriptors
#[derive(Debug, Clone)]
pub struct CatalogResolver {
    /// Descriptors by short name
    entries: BTreeMap<String, ModelDescriptor>,
}

impl Default for CatalogResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogResolver {
    /// Catalog with the built-in models
    pub fn new() -> Self {
        let entries = BUILTIN_MODELS
            .iter()
            .map(|(short_name, artifact, hardware)| {
                (
                    short_name.to_string(),
                    ModelDescriptor {
                        short_name: short_name.to_string(),
                        backing_artifact_id: artifact.to_string(),
                        hardware_class: hardware.to_string(),
                    },
                )
            })
            .collect();

        Self { entries }
    }

    /// Resolves `short_name`.
    ///
    /// An explicit hardware class bypasses the table: `short_name` is then
    /// taken to already be a backing artifact identifier.
    pub fn resolve(&self, short_name: &str, explicit_hardware_class: Option<&str>) -> Result<ModelDescriptor> {
        let short_name = short_name.trim();
        if short_name.is_empty() {
            return Err(Error::UnknownModel("<empty>".to_string()));
        }

        match explicit_hardware_class.map(str::trim).filter(|h| !h.is_empty()) {
            Some(hardware_class) => Ok(ModelDescriptor {
                short_name: short_name.to_string(),
                backing_artifact_id: short_name.to_string(),
                hardware_class: hardware_class.to_string(),
            }),
            None => self
                .entries
                .get(short_name)
                .cloned()
                .ok_or_else(|| Error::UnknownModel(short_name.to_string())),
        }
    }

    /// All catalog entries, ordered by short name
    pub fn descriptors(&self) -> Vec<ModelDescriptor> {
        self.entries.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_model() {
        let catalog = CatalogResolver::new();
        let descriptor = catalog.resolve("mistral-7b", None).unwrap();
        assert_eq!(descriptor.backing_artifact_id, "huggingface-llm-mistral-7b");
        assert_eq!(descriptor.hardware_class, "ml.g5.2xlarge");

        let descriptor = catalog.resolve("llama-2-70b", None).unwrap();
        assert_eq!(descriptor.hardware_class, "ml.g5.48xlarge");
    }

    #[test]
    fn test_explicit_hardware_class_passes_through() {
        let catalog = CatalogResolver::new();
        let descriptor = catalog.resolve("my-custom-model", Some("ml.g5.12xlarge")).unwrap();
        assert_eq!(descriptor.backing_artifact_id, "my-custom-model");
        assert_eq!(descriptor.hardware_class, "ml.g5.12xlarge");
    }

    #[test]
    fn test_blank_hardware_class_falls_back_to_table() {
        let catalog = CatalogResolver::new();
        let descriptor = catalog.resolve("mixtral-8x7b", Some("")).unwrap();
        assert_eq!(descriptor.hardware_class, "ml.g5.48xlarge");
    }

    #[test]
    fn test_unknown_model() {
        let catalog = CatalogResolver::new();
        let err = catalog.resolve("unknown-model-xyz", None).unwrap_err();
        assert!(err.is_unknown_model());
        assert!(catalog.resolve("", None).unwrap_err().is_unknown_model());
    }

    #[test]
    fn test_descriptors_sorted() {
        let names: Vec<String> = CatalogResolver::new()
            .descriptors()
            .into_iter()
            .map(|d| d.short_name)
            .collect();
        assert_eq!(names, vec!["llama-2-70b", "llama-2-7b", "mistral-7b", "mixtral-8x7b"]);
    }
}
