//! Wiring between kiln.toml, the registry and the core services

use std::sync::Arc;

use color_eyre::eyre::{Result, WrapErr};
use kiln_core::{
    BuildOrchestrator, ConnectionPool, DeploymentManager, InvocationGateway, KilnDir,
    WalletProvider,
};
use kiln_db::Database;

use crate::build_client::RemoteBuildService;
use crate::chain::AlloyConnector;
use crate::config::KilnConfig;
use crate::keystore::KeystoreWallet;

/// Everything a command needs, opened once per invocation
pub struct Services {
    pub config: KilnConfig,
    pub db: Arc<Database>,
    pool: ConnectionPool,
}

impl Services {
    /// Load kiln.toml and open `.kiln/kiln.db` in the current directory
    pub async fn open() -> Result<Self> {
        let config = KilnConfig::load()?;
        let db = Database::open(&KilnDir::new())
            .await
            .wrap_err("Failed to open the kiln registry")?;
        Ok(Self::with(config, db))
    }

    pub fn with(config: KilnConfig, db: Database) -> Self {
        let pool = ConnectionPool::new(Arc::new(AlloyConnector::default()), config.timeouts.connect);
        Self {
            config,
            db: Arc::new(db),
            pool,
        }
    }

    pub fn wallet(&self) -> Arc<dyn WalletProvider> {
        Arc::new(KeystoreWallet::new(
            self.db.clone(),
            self.config.wallet.default.clone(),
        ))
    }

    pub fn builder(&self) -> Result<BuildOrchestrator> {
        let url = self.config.build_service_url()?;
        let service = RemoteBuildService::new(&url)?;
        Ok(BuildOrchestrator::new(
            Arc::new(service),
            self.config.timeouts.build,
        ))
    }

    pub fn deployer(&self, network: &str) -> Result<DeploymentManager> {
        let endpoint = self.config.endpoint(network)?;
        Ok(DeploymentManager::new(
            self.pool.clone(),
            self.wallet(),
            endpoint,
            self.config.timeouts,
        ))
    }

    pub fn gateway(&self, network: &str) -> Result<InvocationGateway> {
        let endpoint = self.config.endpoint(network)?;
        Ok(InvocationGateway::new(
            self.pool.clone(),
            self.wallet(),
            endpoint,
            self.config.timeouts,
        ))
    }
}
