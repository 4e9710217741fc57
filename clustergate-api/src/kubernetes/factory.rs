//! Client construction from credential blobs
//!
//! `KubeconfigClientFactory` turns a kubeconfig document into a live
//! `ClusterClient`. `ClientCache` memoizes built clients per cluster, stamped
//! with the SHA-256 fingerprint of the blob they were built from, so a
//! changed credential is never served a stale client.

use async_trait::async_trait;
use clustergate_common::ClusterId;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OnceCell, RwLock};

use super::client::{ClusterClient, KubeClusterClient};
use super::error::{K8sError, K8sResult};
use super::types::ConnectionParameters;

/// Builds authenticated cluster clients from credential blobs
#[async_trait]
pub trait ClusterClientFactory: Send + Sync {
    async fn build(&self, credential: &str) -> K8sResult<Arc<dyn ClusterClient>>;
}

/// Factory for credential blobs that are kubeconfig documents
#[derive(Debug, Default, Clone, Copy)]
pub struct KubeconfigClientFactory;

impl KubeconfigClientFactory {
    pub fn new() -> Self {
        Self
    }

    /// Extract connection parameters without contacting the cluster
    pub fn parse_credential(credential: &str) -> K8sResult<ConnectionParameters> {
        Self::load(credential).map(|(_, params)| params)
    }

    fn load(credential: &str) -> K8sResult<(Kubeconfig, ConnectionParameters)> {
        let kubeconfig = Kubeconfig::from_yaml(credential).map_err(|e| {
            K8sError::CredentialInvalid(format!("Failed to parse kubeconfig: {}", e))
        })?;

        let context_name = match kubeconfig.current_context.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => match kubeconfig.contexts.as_slice() {
                [only] => only.name.clone(),
                [] => {
                    return Err(K8sError::CredentialInvalid(
                        "Kubeconfig defines no context".into(),
                    ))
                }
                _ => {
                    return Err(K8sError::CredentialInvalid(
                        "No current-context and several contexts to choose from".into(),
                    ))
                }
            },
        };

        let context = kubeconfig
            .contexts
            .iter()
            .find(|c| c.name == context_name)
            .and_then(|c| c.context.as_ref())
            .ok_or_else(|| {
                K8sError::CredentialInvalid(format!("Context '{}' not found", context_name))
            })?;

        let api_server = kubeconfig
            .clusters
            .iter()
            .find(|c| c.name == context.cluster)
            .ok_or_else(|| {
                K8sError::CredentialInvalid(format!("Cluster '{}' not found", context.cluster))
            })?
            .cluster
            .as_ref()
            .and_then(|c| c.server.clone())
            .filter(|server| !server.is_empty())
            .ok_or_else(|| K8sError::CredentialInvalid("Cluster has no server URL".into()))?;

        let params = ConnectionParameters {
            api_server,
            default_namespace: context.namespace.clone().filter(|ns| !ns.is_empty()),
            context: context_name,
        };

        Ok((kubeconfig, params))
    }
}

#[async_trait]
impl ClusterClientFactory for KubeconfigClientFactory {
    async fn build(&self, credential: &str) -> K8sResult<Arc<dyn ClusterClient>> {
        let (kubeconfig, params) = Self::load(credential)?;

        let config = Config::from_custom_kubeconfig(
            kubeconfig,
            &KubeConfigOptions {
                context: Some(params.context.clone()),
                ..Default::default()
            },
        )
        .await
        .map_err(|e| K8sError::CredentialInvalid(format!("Failed to create config: {}", e)))?;

        let client = Client::try_from(config)
            .map_err(|e| K8sError::CredentialInvalid(format!("Failed to create client: {}", e)))?;

        tracing::info!(
            api_server = %params.api_server,
            context = %params.context,
            "Built cluster client"
        );

        Ok(Arc::new(KubeClusterClient::new(client, params)))
    }
}

/// Hex SHA-256 of a credential blob
pub fn fingerprint(credential: &str) -> String {
    hex::encode(Sha256::digest(credential.as_bytes()))
}

struct Slot {
    fingerprint: String,
    client: OnceCell<Arc<dyn ClusterClient>>,
}

impl Slot {
    fn new(fingerprint: String) -> Arc<Self> {
        Arc::new(Self {
            fingerprint,
            client: OnceCell::new(),
        })
    }
}

/// Per-cluster memo of built clients
///
/// Construction is single-flight per slot: concurrent callers for the same
/// cluster and fingerprint wait on one build. A failed build leaves the slot
/// empty, so the next caller tries again.
pub struct ClientCache {
    factory: Arc<dyn ClusterClientFactory>,
    slots: RwLock<HashMap<ClusterId, Arc<Slot>>>,
    enabled: bool,
    build_timeout: Duration,
}

impl ClientCache {
    pub fn new(factory: Arc<dyn ClusterClientFactory>, build_timeout: Duration) -> Self {
        Self {
            factory,
            slots: RwLock::new(HashMap::new()),
            enabled: true,
            build_timeout,
        }
    }

    /// Build a fresh client on every call instead of memoizing
    pub fn disabled(factory: Arc<dyn ClusterClientFactory>, build_timeout: Duration) -> Self {
        Self {
            enabled: false,
            ..Self::new(factory, build_timeout)
        }
    }

    /// Client for `id`, built from `credential` unless a client built from
    /// the same blob is already cached
    pub async fn client(
        &self,
        id: ClusterId,
        credential: &str,
    ) -> K8sResult<Arc<dyn ClusterClient>> {
        if !self.enabled {
            return self.build(id, credential).await;
        }

        let slot = self.slot(id, fingerprint(credential)).await;
        slot.client
            .get_or_try_init(|| self.build(id, credential))
            .await
            .map(Arc::clone)
    }

    /// Number of clusters with a slot
    #[cfg(test)]
    async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    #[cfg(test)]
    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn slot(&self, id: ClusterId, fingerprint: String) -> Arc<Slot> {
        {
            let slots = self.slots.read().await;
            if let Some(slot) = slots.get(&id) {
                if slot.fingerprint == fingerprint {
                    return Arc::clone(slot);
                }
            }
        }

        let mut slots = self.slots.write().await;
        let replacing = match slots.get(&id) {
            // Another caller may have installed it between the two locks
            Some(slot) if slot.fingerprint == fingerprint => return Arc::clone(slot),
            existing => existing.is_some(),
        };
        if replacing {
            tracing::info!(cluster_id = %id, "Credential changed, replacing cached client");
        }

        let slot = Slot::new(fingerprint);
        slots.insert(id, Arc::clone(&slot));
        slot
    }

    async fn build(&self, id: ClusterId, credential: &str) -> K8sResult<Arc<dyn ClusterClient>> {
        tracing::debug!(cluster_id = %id, "Building cluster client");
        match tokio::time::timeout(self.build_timeout, self.factory.build(credential)).await {
            Ok(result) => result,
            Err(_) => Err(K8sError::Unavailable(format!(
                "Building client for cluster {} timed out after {:?}",
                id, self.build_timeout
            ))),
        }
    }
}
