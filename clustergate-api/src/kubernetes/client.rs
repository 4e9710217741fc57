//! Cluster client capability
//!
//! `ClusterClient` is the one handle the dispatcher talks to. Every resource
//! operation is addressed by a `ResourceReference` in generic mode, so no
//! kind needs to be known ahead of time. Pod reads use the typed mode.

use async_trait::async_trait;
use kube::api::{Api, DeleteParams, DynamicObject, PostParams};
use kube::Client;

use super::error::{K8sError, K8sResult};
use super::pods;
use super::types::{ConnectionParameters, PodInfo, ResourceDocument, ResourceReference};

/// Authenticated access to one cluster's control-plane API
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// API server URL this client talks to
    fn api_server(&self) -> &str;

    /// Namespace of the kubeconfig context the client was built from
    fn default_namespace(&self) -> Option<&str>;

    /// Fetch the object at `reference`
    async fn get(&self, reference: &ResourceReference) -> K8sResult<ResourceDocument>;

    /// Create `document` in the namespace of `reference`
    async fn create(
        &self,
        reference: &ResourceReference,
        document: &ResourceDocument,
    ) -> K8sResult<ResourceDocument>;

    /// Overwrite the object at `reference`. The document's
    /// `metadata.resourceVersion` is checked by the control plane.
    async fn replace(
        &self,
        reference: &ResourceReference,
        document: &ResourceDocument,
    ) -> K8sResult<ResourceDocument>;

    /// Delete the object at `reference`, returning what the control plane
    /// answered with (the object, or a status document)
    async fn delete(&self, reference: &ResourceReference) -> K8sResult<ResourceDocument>;

    async fn list_pods(&self, namespace: &str) -> K8sResult<Vec<PodInfo>>;

    async fn get_pod(&self, namespace: &str, name: &str) -> K8sResult<PodInfo>;
}

/// `ClusterClient` backed by kube-rs
#[derive(Clone)]
pub struct KubeClusterClient {
    inner: Client,
    params: ConnectionParameters,
}

impl KubeClusterClient {
    pub fn new(inner: Client, params: ConnectionParameters) -> Self {
        Self { inner, params }
    }

    fn api(&self, reference: &ResourceReference) -> Api<DynamicObject> {
        Api::namespaced_with(
            self.inner.clone(),
            &reference.namespace,
            &reference.api_resource(),
        )
    }
}

fn to_object(document: &ResourceDocument) -> K8sResult<DynamicObject> {
    serde_json::from_value(document.clone())
        .map_err(|e| K8sError::ManifestInvalid(format!("Not a resource document: {}", e)))
}

fn to_document<T: serde::Serialize>(value: T) -> K8sResult<ResourceDocument> {
    serde_json::to_value(value)
        .map_err(|e| K8sError::Internal(format!("Failed to encode control plane answer: {}", e)))
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    fn api_server(&self) -> &str {
        &self.params.api_server
    }

    fn default_namespace(&self) -> Option<&str> {
        self.params.default_namespace.as_deref()
    }

    async fn get(&self, reference: &ResourceReference) -> K8sResult<ResourceDocument> {
        let object = self
            .api(reference)
            .get(&reference.name)
            .await
            .map_err(|e| K8sError::from_kube(e, reference))?;
        to_document(object)
    }

    async fn create(
        &self,
        reference: &ResourceReference,
        document: &ResourceDocument,
    ) -> K8sResult<ResourceDocument> {
        let object = to_object(document)?;
        let created = self
            .api(reference)
            .create(&PostParams::default(), &object)
            .await
            .map_err(|e| K8sError::from_kube(e, reference))?;
        to_document(created)
    }

    async fn replace(
        &self,
        reference: &ResourceReference,
        document: &ResourceDocument,
    ) -> K8sResult<ResourceDocument> {
        let object = to_object(document)?;
        let replaced = self
            .api(reference)
            .replace(&reference.name, &PostParams::default(), &object)
            .await
            .map_err(|e| K8sError::from_kube(e, reference))?;
        to_document(replaced)
    }

    async fn delete(&self, reference: &ResourceReference) -> K8sResult<ResourceDocument> {
        let answer = self
            .api(reference)
            .delete(&reference.name, &DeleteParams::default())
            .await
            .map_err(|e| K8sError::from_kube(e, reference))?;
        answer.either(to_document, to_document)
    }

    async fn list_pods(&self, namespace: &str) -> K8sResult<Vec<PodInfo>> {
        pods::list_pods(&self.inner, namespace).await
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> K8sResult<PodInfo> {
        pods::get_pod(&self.inner, namespace, name).await
    }
}
