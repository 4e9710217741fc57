//! Kubernetes gateway for Clustergate
//!
//! Provides generic resource access across registered clusters:
//! - Credential registration (kubeconfig blobs)
//! - Client construction and per-credential caching
//! - Manifest resolution for any resource kind, custom ones included
//! - Create/Update/Get/Delete dispatch with read-modify-write updates
//! - Pod reads

pub mod client;
pub mod dispatcher;
pub mod error;
pub mod factory;
pub mod manifest;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod pods;
pub mod store;
pub mod types;

use clustergate_common::{ClusterId, ClusterSummary};
use std::sync::Arc;
use std::time::Duration;

use crate::config::KubernetesConfig;
use client::ClusterClient;
use dispatcher::ResourceOperationDispatcher;
use error::{K8sError, K8sResult};
use factory::{ClientCache, ClusterClientFactory, KubeconfigClientFactory};
use manifest::{ManifestResolver, ResolveIntent};
use store::CredentialStore;
use types::{Operation, PodSelection, ResourceDocument};

/// Single entry point for every gateway operation
///
/// Sequences credential lookup, client construction, manifest resolution
/// and dispatch. Holds no per-request state beyond the client cache.
pub struct KubernetesGateway {
    store: Arc<dyn CredentialStore>,
    clients: ClientCache,
    resolver: ManifestResolver,
    dispatcher: ResourceOperationDispatcher,
}

impl KubernetesGateway {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        factory: Arc<dyn ClusterClientFactory>,
        config: &KubernetesConfig,
    ) -> Self {
        let timeout = Duration::from_secs(config.request_timeout_secs);
        let clients = if config.client_cache_enabled {
            ClientCache::new(factory, timeout)
        } else {
            ClientCache::disabled(factory, timeout)
        };

        Self {
            store,
            clients,
            resolver: ManifestResolver::new(config.default_namespace.clone())
                .with_plural_overrides(config.plural_overrides.clone()),
            dispatcher: ResourceOperationDispatcher::new(timeout),
        }
    }

    /// Register a cluster credential and return its identifier
    ///
    /// The blob is stored even when it does not parse; operations on the
    /// cluster then fail with `CredentialInvalid`.
    pub async fn add_cluster(&self, credential: &str) -> K8sResult<ClusterId> {
        let parsed = KubeconfigClientFactory::parse_credential(credential);
        let id = self.store.create(credential).await?;

        match parsed {
            Ok(params) => tracing::info!(
                cluster_id = %id,
                api_server = %params.api_server,
                context = %params.context,
                "Registered cluster"
            ),
            Err(e) => tracing::warn!(
                cluster_id = %id,
                error = %e,
                "Registered cluster with a credential that does not parse"
            ),
        }

        Ok(id)
    }

    pub async fn list_clusters(&self) -> K8sResult<Vec<ClusterSummary>> {
        self.store.list().await
    }

    /// Live client for a registered cluster
    pub async fn client_for(&self, id: ClusterId) -> K8sResult<Arc<dyn ClusterClient>> {
        let credential = self.store.get(id).await?;
        self.clients.client(id, &credential).await
    }

    pub async fn create_resource(
        &self,
        id: ClusterId,
        manifest: &str,
    ) -> K8sResult<ResourceDocument> {
        let client = self.client_for(id).await?;
        let (reference, document) = self
            .resolver
            .resolve(manifest.as_bytes(), ResolveIntent::Create)?;

        self.dispatcher
            .execute(client.as_ref(), &reference, Operation::Create, Some(&document))
            .await
    }

    /// Update the resource the manifest names
    pub async fn update_resource(
        &self,
        id: ClusterId,
        manifest: &str,
    ) -> K8sResult<ResourceDocument> {
        let client = self.client_for(id).await?;
        let (reference, document) = self
            .resolver
            .resolve(manifest.as_bytes(), ResolveIntent::Identify)?;

        self.dispatcher
            .execute(client.as_ref(), &reference, Operation::Update, Some(&document))
            .await
    }

    /// Update with identity supplied apart from the manifest
    ///
    /// A manifest that declares a different kind, name or namespace is
    /// rejected instead of one of them silently winning. An empty `kind`
    /// leaves the type to the manifest.
    pub async fn update_resource_at(
        &self,
        id: ClusterId,
        namespace: &str,
        kind: &str,
        name: &str,
        manifest: &str,
    ) -> K8sResult<ResourceDocument> {
        if name.is_empty() {
            return Err(K8sError::NameRequired("update".to_string()));
        }

        let client = self.client_for(id).await?;
        let mut document = manifest::parse_manifest(manifest.as_bytes())?;

        for (field, wanted) in [("name", name), ("namespace", namespace)] {
            let declared = document
                .get("metadata")
                .and_then(|m| m.get(field))
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            if !wanted.is_empty() && !declared.is_empty() && declared != wanted {
                return Err(K8sError::ManifestInvalid(format!(
                    "conflicting identity: manifest declares {} '{}' but '{}' was requested",
                    field, declared, wanted
                )));
            }
        }

        if !document.get("metadata").is_some_and(|m| m.is_object()) {
            document["metadata"] = serde_json::Value::Object(Default::default());
        }
        document["metadata"]["name"] = name.into();
        if !namespace.is_empty() {
            document["metadata"]["namespace"] = namespace.into();
        }

        let (reference, document) = self
            .resolver
            .resolve_document(document, ResolveIntent::Identify)?;
        if !kind.is_empty() && !self.resolver.matches_kind(kind, &reference) {
            return Err(K8sError::ManifestInvalid(format!(
                "conflicting identity: manifest declares kind '{}' but '{}' was requested",
                reference.kind, kind
            )));
        }

        self.dispatcher
            .execute(client.as_ref(), &reference, Operation::Update, Some(&document))
            .await
    }

    pub async fn get_resource(
        &self,
        id: ClusterId,
        namespace: &str,
        kind: &str,
        name: &str,
        api_version: Option<&str>,
    ) -> K8sResult<ResourceDocument> {
        self.query(id, namespace, kind, name, api_version, Operation::Get)
            .await
    }

    pub async fn delete_resource(
        &self,
        id: ClusterId,
        namespace: &str,
        kind: &str,
        name: &str,
        api_version: Option<&str>,
    ) -> K8sResult<ResourceDocument> {
        self.query(id, namespace, kind, name, api_version, Operation::Delete)
            .await
    }

    /// One named pod, or every pod in the namespace
    pub async fn list_pods(
        &self,
        id: ClusterId,
        namespace: &str,
        name: Option<&str>,
    ) -> K8sResult<PodSelection> {
        let client = self.client_for(id).await?;
        let namespace = self.query_namespace(client.as_ref(), namespace);

        match name.filter(|n| !n.is_empty()) {
            Some(name) => {
                let pod = self
                    .dispatcher
                    .bounded(Operation::Get, client.get_pod(&namespace, name))
                    .await?;
                Ok(PodSelection::One(pod))
            }
            None => {
                let pods = self
                    .dispatcher
                    .bounded(Operation::Get, client.list_pods(&namespace))
                    .await?;
                tracing::debug!(
                    cluster_id = %id,
                    namespace = %namespace,
                    count = pods.len(),
                    "Listed pods"
                );
                Ok(PodSelection::Many(pods))
            }
        }
    }

    async fn query(
        &self,
        id: ClusterId,
        namespace: &str,
        kind: &str,
        name: &str,
        api_version: Option<&str>,
        operation: Operation,
    ) -> K8sResult<ResourceDocument> {
        let client = self.client_for(id).await?;
        let namespace = self.query_namespace(client.as_ref(), namespace);
        let reference = self
            .resolver
            .resolve_query(kind, api_version, &namespace, name)?;

        self.dispatcher
            .execute(client.as_ref(), &reference, operation, None)
            .await
    }

    /// Empty namespaces fall back to the credential's context namespace,
    /// then to the configured default
    fn query_namespace(&self, client: &dyn ClusterClient, namespace: &str) -> String {
        if !namespace.is_empty() {
            return namespace.to_string();
        }
        client
            .default_namespace()
            .unwrap_or(self.resolver.default_namespace())
            .to_string()
    }
}
