//! JSON file policy store
//!
//! The whole registry is kept in memory and rewritten on every mutation.
//! Writes go to a sibling temporary file that is renamed over the target, so
//! a crash never leaves a truncated registry behind.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use common::error::{Error, Result};
use common::models::TimeoutPolicy;

use crate::registry::PolicyStore;

/// On-disk document
#[derive(Debug, Default, Serialize, Deserialize)]
struct PolicyDocument {
    /// Format version
    version: u32,
    /// Policies by served model name
    policies: BTreeMap<String, TimeoutPolicy>,
}

const DOCUMENT_VERSION: u32 = 1;

/// Policy store persisted as a JSON document
#[derive(Debug)]
pub struct JsonFilePolicyStore {
    /// Registry file
    path: PathBuf,
    /// Cached contents; the write lock also serializes file writes
    policies: RwLock<BTreeMap<String, TimeoutPolicy>>,
}

impl JsonFilePolicyStore {
    /// Opens the registry at `path`, starting empty if the file does not exist
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let policies = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let document: PolicyDocument = serde_json::from_slice(&bytes)?;
                if document.version != DOCUMENT_VERSION {
                    return Err(Error::Config(format!(
                        "Unsupported policy registry version {} in {:?}",
                        document.version, path
                    )));
                }
                document.policies
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        info!("Opened policy registry {:?} with {} policies", path, policies.len());

        Ok(Self {
            path,
            policies: RwLock::new(policies),
        })
    }

    /// Registry file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, policies: &BTreeMap<String, TimeoutPolicy>) -> Result<()> {
        let document = PolicyDocument {
            version: DOCUMENT_VERSION,
            policies: policies.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&document)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, bytes).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;

        debug!("Persisted {} policies to {:?}", policies.len(), self.path);

        Ok(())
    }
}

#[async_trait]
impl PolicyStore for JsonFilePolicyStore {
    async fn put(&self, policy: TimeoutPolicy) -> Result<()> {
        let mut policies = self.policies.write().await;
        let previous = policies.insert(policy.name.clone(), policy.clone());

        if let Err(e) = self.persist(&policies).await {
            // Keep the cache consistent with the file
            match previous {
                Some(previous) => policies.insert(policy.name.clone(), previous),
                None => policies.remove(&policy.name),
            };
            return Err(e);
        }

        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Option<TimeoutPolicy>> {
        Ok(self.policies.read().await.get(name).cloned())
    }

    async fn scan(&self) -> Result<Vec<TimeoutPolicy>> {
        Ok(self.policies.read().await.values().cloned().collect())
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let mut policies = self.policies.write().await;
        let removed = match policies.remove(name) {
            Some(removed) => removed,
            None => return Ok(false),
        };

        if let Err(e) = self.persist(&policies).await {
            policies.insert(name.to_string(), removed);
            return Err(e);
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(name: &str) -> TimeoutPolicy {
        TimeoutPolicy {
            name: name.to_string(),
            idle_timeout_minutes: 15,
            utilization_threshold: 2.5,
        }
    }

    #[tokio::test]
    async fn test_missing_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFilePolicyStore::open(dir.path().join("policies.json")).await.unwrap();
        assert!(store.scan().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_policies_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("policies.json");

        {
            let store = JsonFilePolicyStore::open(&path).await.unwrap();
            store.put(policy("demo")).await.unwrap();
            store.put(policy("other")).await.unwrap();
            assert!(store.delete("other").await.unwrap());
        }

        let reopened = JsonFilePolicyStore::open(&path).await.unwrap();
        let rows = reopened.scan().await.unwrap();
        assert_eq!(rows, vec![policy("demo")]);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policies.json");
        tokio::fs::write(&path, b"not json").await.unwrap();

        let err = JsonFilePolicyStore::open(&path).await.unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
