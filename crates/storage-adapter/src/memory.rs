//! Process-local policy store

use async_trait::async_trait;
use dashmap::DashMap;

use common::error::Result;
use common::models::TimeoutPolicy;

use crate::registry::PolicyStore;

/// Policy store held in a concurrent map; contents are lost on exit
#[derive(Debug, Default)]
pub struct InMemoryPolicyStore {
    /// Policies by served model name
    policies: DashMap<String, TimeoutPolicy>,
}

impl InMemoryPolicyStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PolicyStore for InMemoryPolicyStore {
    async fn put(&self, policy: TimeoutPolicy) -> Result<()> {
        self.policies.insert(policy.name.clone(), policy);
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Option<TimeoutPolicy>> {
        Ok(self.policies.get(name).map(|entry| entry.value().clone()))
    }

    async fn scan(&self) -> Result<Vec<TimeoutPolicy>> {
        let mut policies: Vec<TimeoutPolicy> = self
            .policies
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        policies.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(policies)
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        Ok(self.policies.remove(name).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(name: &str, minutes: u64) -> TimeoutPolicy {
        TimeoutPolicy {
            name: name.to_string(),
            idle_timeout_minutes: minutes,
            utilization_threshold: 0.05,
        }
    }

    #[tokio::test]
    async fn test_put_replaces_existing_row() {
        let store = InMemoryPolicyStore::new();
        store.put(policy("demo", 30)).await.unwrap();
        store.put(policy("demo", 60)).await.unwrap();

        let rows = store.scan().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].idle_timeout_minutes, 60);
    }

    #[tokio::test]
    async fn test_scan_is_sorted_and_delete_reports_presence() {
        let store = InMemoryPolicyStore::new();
        store.put(policy("zeta", 5)).await.unwrap();
        store.put(policy("alpha", 5)).await.unwrap();

        let names: Vec<String> = store.scan().await.unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);

        assert!(store.delete("alpha").await.unwrap());
        assert!(!store.delete("alpha").await.unwrap());
        assert!(store.get("alpha").await.unwrap().is_none());
    }
}
