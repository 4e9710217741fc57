//! Application State
//!
//! Shared state for the Clustergate API server

use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::db::Database;
use crate::kubernetes::factory::{ClusterClientFactory, KubeconfigClientFactory};
use crate::kubernetes::store::SqliteCredentialStore;
use crate::kubernetes::KubernetesGateway;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<KubernetesGateway>,
    pub database: Arc<Database>,
}

impl AppState {
    /// State backed by the credential database and real cluster clients
    pub fn new(config: &GatewayConfig, database: Arc<Database>) -> Self {
        Self::with_factory(config, database, Arc::new(KubeconfigClientFactory::new()))
    }

    /// Same as `new`, with the way clients get built swapped out
    pub fn with_factory(
        config: &GatewayConfig,
        database: Arc<Database>,
        factory: Arc<dyn ClusterClientFactory>,
    ) -> Self {
        let store = Arc::new(SqliteCredentialStore::new(database.clone()));
        let gateway = KubernetesGateway::new(store, factory, &config.kubernetes);

        Self {
            gateway: Arc::new(gateway),
            database,
        }
    }
}
