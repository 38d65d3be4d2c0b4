//! Main integration module for the LLM Manager
//!
//! This module wires the configuration, the platform, the timeout policy
//! registry, the model manager and the idle reaper into one application.

pub mod handlers;

use std::sync::Arc;
use std::time::Duration;
use anyhow::{Context, Result};
use tracing::info;

use idle_reaper::{IdleReaper, ReapReport, ReaperScheduler};
use model_manager::ModelManager;
use platform_adapter::{InMemoryPlatform, StaticModelHub};
use settings::{ConfigManager, StorageBackend, StorageConfig};
use storage_adapter::{InMemoryPolicyStore, JsonFilePolicyStore, PolicyStore};

pub use handlers::{Request, Response};

/// Main LLM manager application
pub struct LlmManager {
    /// Configuration manager
    config_manager: Arc<ConfigManager>,

    /// Simulated managed platform
    platform: Arc<InMemoryPlatform>,

    /// Timeout policy registry
    policies: Arc<dyn PolicyStore>,

    /// Model manager
    model_manager: Arc<ModelManager>,

    /// Idle reaper
    reaper: Arc<IdleReaper>,

    /// Reaper trigger
    scheduler: ReaperScheduler,
}

impl LlmManager {
    /// Creates the manager against the simulated platform
    pub async fn new(config_manager: Arc<ConfigManager>) -> Result<Self> {
        info!("Initializing LLM manager");

        let simulation = &config_manager.settings().simulation;
        let platform = Arc::new(InMemoryPlatform::simulated(
            Duration::from_secs(simulation.provisioning_delay_secs),
            Duration::from_secs(simulation.deletion_delay_secs),
        ));

        let policies = open_policy_store(&config_manager.settings().storage).await?;

        Ok(Self::with_platform(config_manager, platform, policies))
    }

    /// Creates the manager on an existing platform and policy registry
    pub fn with_platform(
        config_manager: Arc<ConfigManager>,
        platform: Arc<InMemoryPlatform>,
        policies: Arc<dyn PolicyStore>,
    ) -> Self {
        let settings = config_manager.settings();

        let model_manager = Arc::new(ModelManager::new(
            settings,
            platform.clone(),
            platform.clone(),
            Arc::new(StaticModelHub::with_defaults()),
            policies.clone(),
        ));

        let reaper = Arc::new(IdleReaper::new(
            platform.clone(),
            platform.clone(),
            policies.clone(),
            model_manager.clone(),
            settings.naming.clone(),
            settings.reaper.clone(),
        ));

        let scheduler = ReaperScheduler::new(reaper.clone(), settings.reaper.interval());

        Self {
            config_manager,
            platform,
            policies,
            model_manager,
            reaper,
            scheduler,
        }
    }

    /// Starts the reaper scheduler if enabled
    pub fn start(&self) -> Result<()> {
        info!("Starting LLM manager");

        if self.config_manager.settings().reaper.enabled {
            self.scheduler.start().context("failed to start reaper scheduler")?;
        } else {
            info!("Idle reaper disabled");
        }

        Ok(())
    }

    /// Stops the reaper scheduler
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping LLM manager");
        self.scheduler.stop().await.context("failed to stop reaper scheduler")?;
        Ok(())
    }

    /// Handles one request
    pub async fn handle(&self, request: Request) -> Response {
        handlers::dispatch(&self.model_manager, request).await
    }

    /// Parses and handles one request line
    pub async fn handle_line(&self, line: &str) -> Response {
        handlers::handle_line(&self.model_manager, line).await
    }

    /// Runs one reaper sweep immediately
    pub async fn reap_once(&self) -> Result<ReapReport> {
        self.reaper.reap().await.context("reaper sweep failed")
    }

    /// Gets the model manager
    pub fn model_manager(&self) -> Arc<ModelManager> {
        self.model_manager.clone()
    }

    /// Gets the platform
    pub fn platform(&self) -> Arc<InMemoryPlatform> {
        self.platform.clone()
    }

    /// Gets the timeout policy registry
    pub fn policies(&self) -> Arc<dyn PolicyStore> {
        self.policies.clone()
    }

    /// Gets the configuration manager
    pub fn config_manager(&self) -> Arc<ConfigManager> {
        self.config_manager.clone()
    }
}

/// Opens the timeout policy registry selected by `storage`
pub async fn open_policy_store(storage: &StorageConfig) -> Result<Arc<dyn PolicyStore>> {
    let store: Arc<dyn PolicyStore> = match storage.backend {
        StorageBackend::Memory => Arc::new(InMemoryPolicyStore::new()),
        StorageBackend::File => Arc::new(
            JsonFilePolicyStore::open(&storage.path)
                .await
                .with_context(|| format!("failed to open policy registry {:?}", storage.path))?,
        ),
    };

    Ok(store)
}
