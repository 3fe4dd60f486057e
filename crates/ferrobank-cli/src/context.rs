use std::path::{Path, PathBuf};
use std::sync::Arc;

use ferrobank_core::config::CONFIG_FILE_NAME;
use ferrobank_core::{
    AppConfig, FileSecretStore, HttpClient, ReqwestHttpClient, Repository, SecretStore,
    SyncOrchestrator,
};
use ferrobank_warehouse::{resolve_home, Warehouse, WarehouseConfig};

use crate::error::CliError;

pub const SECRETS_FILE_NAME: &str = "secrets.json";

/// Services shared by every command, wired from the home directory.
#[derive(Debug)]
pub struct AppContext {
    pub home: PathBuf,
    pub config: AppConfig,
    pub orchestrator: SyncOrchestrator,
}

impl AppContext {
    pub fn load(home: Option<&Path>) -> Result<Self, CliError> {
        let home = home.map(Path::to_path_buf).unwrap_or_else(resolve_home);
        let config = AppConfig::load(&home.join(CONFIG_FILE_NAME))?;
        let descriptors = config.descriptors()?;

        let warehouse = Warehouse::open(WarehouseConfig::in_home(&home))?;
        let repository: Arc<dyn Repository> = Arc::new(warehouse);
        let secrets: Arc<dyn SecretStore> =
            Arc::new(FileSecretStore::new(home.join(SECRETS_FILE_NAME)));
        let transport: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());

        let orchestrator =
            SyncOrchestrator::new(config.http.api_client(transport), repository, secrets)
                .with_providers(descriptors)
                .with_settings(config.sync.settings())
                .with_gateway_token_url(config.oauth.gateway_token_url.clone());

        tracing::debug!(home = %home.display(), "context loaded");
        Ok(Self {
            home,
            config,
            orchestrator,
        })
    }

    pub fn repository(&self) -> &Arc<dyn Repository> {
        self.orchestrator.repository()
    }
}
