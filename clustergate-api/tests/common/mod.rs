//! Common test utilities and helpers

#![allow(dead_code)]

use async_trait::async_trait;
use clustergate_api::config::GatewayConfig;
use clustergate_api::db::Database;
use clustergate_api::kubernetes::client::ClusterClient;
use clustergate_api::kubernetes::error::K8sResult;
use clustergate_api::kubernetes::factory::{ClusterClientFactory, KubeconfigClientFactory};
use clustergate_api::kubernetes::memory::InMemoryCluster;
use clustergate_api::kubernetes::types::{PodInfo, ResourceDocument, ResourceReference};
use clustergate_api::kubernetes::KubernetesGateway;
use clustergate_api::AppState;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Kubeconfig for a cluster at `server`, optionally pinning a context namespace
pub fn kubeconfig(server: &str, namespace: Option<&str>) -> String {
    let namespace = namespace
        .map(|ns| format!("\n      namespace: {}", ns))
        .unwrap_or_default();
    format!(
        r#"apiVersion: v1
kind: Config
current-context: test
clusters:
  - name: test-cluster
    cluster:
      server: {server}
contexts:
  - name: test
    context:
      cluster: test-cluster
      user: tester{namespace}
users:
  - name: tester
    user:
      token: test-token
"#
    )
}

pub fn deployment_manifest(name: &str, namespace: Option<&str>, replicas: u32) -> String {
    let namespace = namespace
        .map(|ns| format!("\n  namespace: {}", ns))
        .unwrap_or_default();
    format!(
        r#"apiVersion: apps/v1
kind: Deployment
metadata:
  name: {name}{namespace}
  labels:
    app: {name}
spec:
  replicas: {replicas}
  selector:
    matchLabels:
      app: {name}
  template:
    metadata:
      labels:
        app: {name}
    spec:
      containers:
        - name: {name}
          image: nginx:1.25
"#
    )
}

pub fn pod(name: &str, namespace: &str) -> PodInfo {
    PodInfo {
        name: name.to_string(),
        namespace: namespace.to_string(),
        ..Default::default()
    }
}

/// Client that lets another writer touch the object right after every read
pub struct RacingClient {
    inner: Arc<InMemoryCluster>,
}

#[async_trait]
impl ClusterClient for RacingClient {
    fn api_server(&self) -> &str {
        self.inner.api_server()
    }

    fn default_namespace(&self) -> Option<&str> {
        self.inner.default_namespace()
    }

    async fn get(&self, reference: &ResourceReference) -> K8sResult<ResourceDocument> {
        let object = self.inner.get(reference).await?;
        self.inner.touch(reference).await?;
        Ok(object)
    }

    async fn create(
        &self,
        reference: &ResourceReference,
        document: &ResourceDocument,
    ) -> K8sResult<ResourceDocument> {
        self.inner.create(reference, document).await
    }

    async fn replace(
        &self,
        reference: &ResourceReference,
        document: &ResourceDocument,
    ) -> K8sResult<ResourceDocument> {
        self.inner.replace(reference, document).await
    }

    async fn delete(&self, reference: &ResourceReference) -> K8sResult<ResourceDocument> {
        self.inner.delete(reference).await
    }

    async fn list_pods(&self, namespace: &str) -> K8sResult<Vec<PodInfo>> {
        self.inner.list_pods(namespace).await
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> K8sResult<PodInfo> {
        self.inner.get_pod(namespace, name).await
    }
}

/// Factory that parses credentials like production but connects to
/// in-memory clusters, one per API server URL
#[derive(Default)]
pub struct MemoryFactory {
    clusters: Mutex<HashMap<String, Arc<InMemoryCluster>>>,
    builds: AtomicUsize,
    build_delay: Duration,
    latency: Duration,
    pods: Vec<PodInfo>,
    racing: bool,
}

impl MemoryFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_build_delay(mut self, delay: Duration) -> Self {
        self.build_delay = delay;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_pod(mut self, pod: PodInfo) -> Self {
        self.pods.push(pod);
        self
    }

    /// Hand out clients that race every read with a concurrent write
    pub fn racing(mut self) -> Self {
        self.racing = true;
        self
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    /// The cluster behind `server`, created on first use
    pub fn cluster(&self, server: &str, default_namespace: Option<&str>) -> Arc<InMemoryCluster> {
        let mut clusters = self.clusters.lock().unwrap();
        clusters
            .entry(server.to_string())
            .or_insert_with(|| {
                let mut cluster = InMemoryCluster::new(server).with_latency(self.latency);
                if let Some(ns) = default_namespace {
                    cluster = cluster.with_default_namespace(ns);
                }
                for pod in &self.pods {
                    cluster = cluster.with_pod(pod.clone());
                }
                Arc::new(cluster)
            })
            .clone()
    }
}

#[async_trait]
impl ClusterClientFactory for MemoryFactory {
    async fn build(&self, credential: &str) -> K8sResult<Arc<dyn ClusterClient>> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        let params = KubeconfigClientFactory::parse_credential(credential)?;
        if !self.build_delay.is_zero() {
            tokio::time::sleep(self.build_delay).await;
        }

        let cluster = self.cluster(&params.api_server, params.default_namespace.as_deref());
        if self.racing {
            Ok(Arc::new(RacingClient { inner: cluster }))
        } else {
            Ok(cluster)
        }
    }
}

/// Test environment setup
pub struct TestEnv {
    pub state: Arc<AppState>,
    pub factory: Arc<MemoryFactory>,
}

impl TestEnv {
    pub async fn new() -> Self {
        Self::with(GatewayConfig::default(), MemoryFactory::new()).await
    }

    pub async fn with_factory(factory: MemoryFactory) -> Self {
        Self::with(GatewayConfig::default(), factory).await
    }

    pub async fn with(config: GatewayConfig, factory: MemoryFactory) -> Self {
        let database = Database::new("sqlite::memory:", 1)
            .await
            .expect("Failed to open in-memory database");
        database.migrate().await.expect("Failed to run migrations");

        let factory = Arc::new(factory);
        let state = AppState::with_factory(&config, Arc::new(database), factory.clone());

        TestEnv {
            state: Arc::new(state),
            factory,
        }
    }

    pub fn gateway(&self) -> &KubernetesGateway {
        &self.state.gateway
    }
}
