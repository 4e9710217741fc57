//! Process-local control plane
//!
//! `InMemoryCluster` implements `ClusterClient` over an in-memory object map
//! with the control-plane behaviors the gateway depends on: server-assigned
//! `resourceVersion`, `uid` and `creationTimestamp`; `AlreadyExists` on name
//! collisions; optimistic-concurrency checks on replace; `status` owned by
//! the server. Built for unit tests and behind the `testing` feature.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::Mutex;

use super::client::ClusterClient;
use super::error::{K8sError, K8sResult};
use super::types::{PodInfo, ResourceDocument, ResourceReference};

/// (group, resource kind, namespace, name)
type ObjectKey = (String, String, String, String);

#[derive(Default)]
struct State {
    objects: BTreeMap<ObjectKey, ResourceDocument>,
    pods: Vec<PodInfo>,
    last_version: u64,
    creates: usize,
}

impl State {
    fn next_version(&mut self) -> String {
        self.last_version += 1;
        self.last_version.to_string()
    }
}

pub struct InMemoryCluster {
    api_server: String,
    default_namespace: Option<String>,
    latency: Duration,
    state: Mutex<State>,
}

impl InMemoryCluster {
    pub fn new(api_server: impl Into<String>) -> Self {
        Self {
            api_server: api_server.into(),
            default_namespace: None,
            latency: Duration::ZERO,
            state: Mutex::new(State::default()),
        }
    }

    /// Namespace reported as the credential's context namespace
    pub fn with_default_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.default_namespace = Some(namespace.into());
        self
    }

    /// Delay every call by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_pod(mut self, pod: PodInfo) -> Self {
        self.state.get_mut().pods.push(pod);
        self
    }

    /// Number of creates accepted so far
    pub async fn creates(&self) -> usize {
        self.state.lock().await.creates
    }

    pub async fn object_count(&self) -> usize {
        self.state.lock().await.objects.len()
    }

    /// Write `status` the way a controller would, bumping the resourceVersion
    pub async fn set_status(&self, reference: &ResourceReference, status: Value) -> K8sResult<()> {
        let mut state = self.state.lock().await;
        let version = state.next_version();
        let object = state
            .objects
            .get_mut(&key(reference))
            .ok_or_else(|| K8sError::not_found(reference))?;
        object["status"] = status;
        object["metadata"]["resourceVersion"] = Value::String(version);
        Ok(())
    }

    /// Simulate an unrelated writer touching the object
    pub async fn touch(&self, reference: &ResourceReference) -> K8sResult<()> {
        let mut state = self.state.lock().await;
        let version = state.next_version();
        let object = state
            .objects
            .get_mut(&key(reference))
            .ok_or_else(|| K8sError::not_found(reference))?;
        object["metadata"]["resourceVersion"] = Value::String(version);
        Ok(())
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

fn key(reference: &ResourceReference) -> ObjectKey {
    (
        reference.group.clone(),
        reference.resource_kind.clone(),
        reference.namespace.clone(),
        reference.name.clone(),
    )
}

fn metadata_str<'a>(document: &'a Value, field: &str) -> Option<&'a str> {
    document
        .get("metadata")
        .and_then(|m| m.get(field))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn as_object(document: &ResourceDocument) -> K8sResult<ResourceDocument> {
    match document {
        Value::Object(_) => Ok(document.clone()),
        _ => Err(K8sError::Rejected("object must be a mapping".to_string())),
    }
}

#[async_trait]
impl ClusterClient for InMemoryCluster {
    fn api_server(&self) -> &str {
        &self.api_server
    }

    fn default_namespace(&self) -> Option<&str> {
        self.default_namespace.as_deref()
    }

    async fn get(&self, reference: &ResourceReference) -> K8sResult<ResourceDocument> {
        self.simulate_latency().await;
        let state = self.state.lock().await;
        state
            .objects
            .get(&key(reference))
            .cloned()
            .ok_or_else(|| K8sError::not_found(reference))
    }

    async fn create(
        &self,
        reference: &ResourceReference,
        document: &ResourceDocument,
    ) -> K8sResult<ResourceDocument> {
        self.simulate_latency().await;
        let mut object = as_object(document)?;

        let name = match metadata_str(&object, "name") {
            Some(name) => name.to_string(),
            None => match metadata_str(&object, "generateName") {
                Some(prefix) => {
                    let suffix = uuid::Uuid::new_v4().simple().to_string();
                    format!("{}{}", prefix, &suffix[..5])
                }
                None => {
                    return Err(K8sError::Rejected(
                        "metadata.name or metadata.generateName is required".to_string(),
                    ))
                }
            },
        };
        let mut target = reference.clone();
        target.name = name.clone();

        let mut state = self.state.lock().await;
        if state.objects.contains_key(&key(&target)) {
            return Err(K8sError::AlreadyExists(format!(
                "{} \"{}\" already exists",
                reference.resource_kind, name
            )));
        }

        let version = state.next_version();
        if object.get("metadata").map_or(true, |m| !m.is_object()) {
            object["metadata"] = Value::Object(Default::default());
        }
        object["apiVersion"] = Value::String(reference.api_version());
        object["kind"] = Value::String(reference.kind.clone());
        let metadata = &mut object["metadata"];
        metadata["name"] = Value::String(name);
        metadata["namespace"] = Value::String(reference.namespace.clone());
        metadata["uid"] = Value::String(uuid::Uuid::new_v4().to_string());
        metadata["resourceVersion"] = Value::String(version);
        metadata["generation"] = Value::from(1);
        metadata["creationTimestamp"] = Value::String(
            chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        );
        // Status belongs to the server
        if let Some(map) = object.as_object_mut() {
            map.remove("status");
        }

        state.objects.insert(key(&target), object.clone());
        state.creates += 1;

        Ok(object)
    }

    async fn replace(
        &self,
        reference: &ResourceReference,
        document: &ResourceDocument,
    ) -> K8sResult<ResourceDocument> {
        self.simulate_latency().await;
        let mut object = as_object(document)?;

        if let Some(name) = metadata_str(&object, "name") {
            if name != reference.name {
                return Err(K8sError::Rejected(format!(
                    "metadata.name '{}' does not match '{}'",
                    name, reference.name
                )));
            }
        }

        let mut state = self.state.lock().await;
        let stored = state
            .objects
            .get(&key(reference))
            .cloned()
            .ok_or_else(|| K8sError::not_found(reference))?;

        let stored_version = metadata_str(&stored, "resourceVersion").unwrap_or_default();
        if let Some(version) = metadata_str(&object, "resourceVersion") {
            if version != stored_version {
                return Err(K8sError::Conflict(format!(
                    "Operation cannot be fulfilled on {} \"{}\": the object has been modified",
                    reference.resource_kind, reference.name
                )));
            }
        }

        let generation = stored["metadata"]["generation"].as_i64().unwrap_or(1);
        let generation = if stored.get("spec") != object.get("spec") {
            generation + 1
        } else {
            generation
        };

        let version = state.next_version();
        if object.get("metadata").map_or(true, |m| !m.is_object()) {
            object["metadata"] = Value::Object(Default::default());
        }
        for field in ["uid", "creationTimestamp"] {
            object["metadata"][field] = stored["metadata"][field].clone();
        }
        object["metadata"]["name"] = Value::String(reference.name.clone());
        object["metadata"]["namespace"] = Value::String(reference.namespace.clone());
        object["metadata"]["resourceVersion"] = Value::String(version);
        object["metadata"]["generation"] = Value::from(generation);
        match stored.get("status") {
            Some(status) => object["status"] = status.clone(),
            None => {
                if let Some(map) = object.as_object_mut() {
                    map.remove("status");
                }
            }
        }

        state.objects.insert(key(reference), object.clone());

        Ok(object)
    }

    async fn delete(&self, reference: &ResourceReference) -> K8sResult<ResourceDocument> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        state
            .objects
            .remove(&key(reference))
            .ok_or_else(|| K8sError::not_found(reference))
    }

    async fn list_pods(&self, namespace: &str) -> K8sResult<Vec<PodInfo>> {
        self.simulate_latency().await;
        let state = self.state.lock().await;
        Ok(state
            .pods
            .iter()
            .filter(|p| p.namespace == namespace)
            .cloned()
            .collect())
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> K8sResult<PodInfo> {
        self.simulate_latency().await;
        let state = self.state.lock().await;
        state
            .pods
            .iter()
            .find(|p| p.namespace == namespace && p.name == name)
            .cloned()
            .ok_or_else(|| K8sError::ResourceNotFound {
                kind: "Pod".to_string(),
                name: name.to_string(),
                namespace: namespace.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reference(name: &str) -> ResourceReference {
        ResourceReference {
            group: "apps".to_string(),
            version: "v1".to_string(),
            kind: "Deployment".to_string(),
            resource_kind: "deployments".to_string(),
            namespace: "default".to_string(),
            name: name.to_string(),
        }
    }

    fn deployment(name: &str, replicas: i64) -> Value {
        json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": name, "namespace": "default"},
            "spec": {"replicas": replicas}
        })
    }

    #[tokio::test]
    async fn test_create_assigns_server_fields() {
        let cluster = InMemoryCluster::new("memory://test");
        let created = cluster
            .create(&reference("web"), &deployment("web", 1))
            .await
            .unwrap();

        assert_eq!(created["metadata"]["resourceVersion"], "1");
        assert!(created["metadata"]["uid"].is_string());
        assert!(created["metadata"]["creationTimestamp"].is_string());
        assert_eq!(cluster.creates().await, 1);
    }

    #[tokio::test]
    async fn test_create_collision() {
        let cluster = InMemoryCluster::new("memory://test");
        cluster
            .create(&reference("web"), &deployment("web", 1))
            .await
            .unwrap();
        let err = cluster
            .create(&reference("web"), &deployment("web", 5))
            .await
            .unwrap_err();

        assert!(matches!(err, K8sError::AlreadyExists(_)));
        let stored = cluster.get(&reference("web")).await.unwrap();
        assert_eq!(stored["spec"]["replicas"], 1);
    }

    #[tokio::test]
    async fn test_generate_name() {
        let cluster = InMemoryCluster::new("memory://test");
        let doc = json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"generateName": "web-"},
        });
        let created = cluster.create(&reference(""), &doc).await.unwrap();
        let name = created["metadata"]["name"].as_str().unwrap();
        assert!(name.starts_with("web-") && name.len() == 9);
    }

    #[tokio::test]
    async fn test_replace_checks_resource_version() {
        let cluster = InMemoryCluster::new("memory://test");
        let created = cluster
            .create(&reference("web"), &deployment("web", 1))
            .await
            .unwrap();
        cluster.touch(&reference("web")).await.unwrap();

        let mut stale = created.clone();
        stale["spec"]["replicas"] = json!(3);
        let err = cluster.replace(&reference("web"), &stale).await.unwrap_err();
        assert!(matches!(err, K8sError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_replace_keeps_status_and_bumps_generation() {
        let cluster = InMemoryCluster::new("memory://test");
        cluster
            .create(&reference("web"), &deployment("web", 1))
            .await
            .unwrap();
        cluster
            .set_status(&reference("web"), json!({"readyReplicas": 1}))
            .await
            .unwrap();

        let mut current = cluster.get(&reference("web")).await.unwrap();
        current["spec"]["replicas"] = json!(4);
        current["status"] = json!({"readyReplicas": 99});
        let replaced = cluster.replace(&reference("web"), &current).await.unwrap();

        assert_eq!(replaced["status"]["readyReplicas"], 1);
        assert_eq!(replaced["metadata"]["generation"], 2);
        assert_ne!(
            replaced["metadata"]["resourceVersion"],
            current["metadata"]["resourceVersion"]
        );
    }

    #[tokio::test]
    async fn test_missing_objects() {
        let cluster = InMemoryCluster::new("memory://test");
        let r = reference("ghost");
        assert!(matches!(cluster.get(&r).await, Err(K8sError::ResourceNotFound { .. })));
        assert!(matches!(
            cluster.replace(&r, &deployment("ghost", 1)).await,
            Err(K8sError::ResourceNotFound { .. })
        ));
        assert!(matches!(cluster.delete(&r).await, Err(K8sError::ResourceNotFound { .. })));
        assert_eq!(cluster.creates().await, 0);
    }

    #[tokio::test]
    async fn test_pods_by_namespace() {
        let pod = |name: &str, ns: &str| PodInfo {
            name: name.to_string(),
            namespace: ns.to_string(),
            ..Default::default()
        };
        let cluster = InMemoryCluster::new("memory://test")
            .with_pod(pod("a", "shop"))
            .with_pod(pod("b", "shop"))
            .with_pod(pod("c", "ops"));

        assert_eq!(cluster.list_pods("shop").await.unwrap().len(), 2);
        assert_eq!(cluster.get_pod("ops", "c").await.unwrap().name, "c");
        assert!(cluster.get_pod("ops", "a").await.is_err());
    }
}
