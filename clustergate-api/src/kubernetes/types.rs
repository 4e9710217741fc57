//! Kubernetes types for the gateway
//!
//! Resource addressing, the generic document model, and the simplified pod
//! representation returned by the typed read path.

use kube::discovery::ApiResource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Full desired-state payload of one resource, kept schema-less
pub type ResourceDocument = serde_json::Value;

/// Canonical address of one object on a cluster's control plane
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceReference {
    /// API group, empty for the core group
    pub group: String,
    pub version: String,
    /// Kind as declared in the manifest (e.g. "Deployment")
    pub kind: String,
    /// Plural lowercase resource name (e.g. "deployments")
    pub resource_kind: String,
    /// Never empty once resolved
    pub namespace: String,
    /// May be empty only on the create path
    pub name: String,
}

impl ResourceReference {
    /// `group/version`, or just `version` for the core group
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// Dynamic API descriptor used for schema-less calls
    pub fn api_resource(&self) -> ApiResource {
        ApiResource {
            group: self.group.clone(),
            version: self.version.clone(),
            api_version: self.api_version(),
            kind: self.kind.clone(),
            plural: self.resource_kind.clone(),
        }
    }

    pub fn has_name(&self) -> bool {
        !self.name.is_empty()
    }
}

impl fmt::Display for ResourceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = if self.name.is_empty() { "<unnamed>" } else { &self.name };
        write!(
            f,
            "{}.{}/{} {}/{}",
            self.resource_kind,
            self.api_version(),
            self.kind,
            self.namespace,
            name
        )
    }
}

/// Operation requested against a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Get,
    Delete,
}

impl Operation {
    /// Every operation except create needs a named target
    pub fn requires_name(&self) -> bool {
        !matches!(self, Self::Create)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Get => write!(f, "get"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Connection parameters extracted from a credential blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParameters {
    /// Kubernetes API server URL
    pub api_server: String,
    /// Kubeconfig context the client is built for
    pub context: String,
    /// Namespace configured on that context, if any
    pub default_namespace: Option<String>,
}

/// Result of a pod query: one named pod or every pod in a namespace
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PodSelection {
    One(PodInfo),
    Many(Vec<PodInfo>),
}

/// Simplified pod information
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PodInfo {
    pub name: String,
    pub namespace: String,
    pub status: PodStatus,
    pub node_name: Option<String>,
    pub pod_ip: Option<String>,
    pub host_ip: Option<String>,
    pub containers: Vec<ContainerInfo>,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub created_at: Option<String>,
    pub restart_count: i32,
}

/// Pod status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PodStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    #[default]
    Unknown,
}

/// Container information within a pod
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub name: String,
    pub image: String,
    pub ready: bool,
    pub restart_count: i32,
    pub state: ContainerState,
}

/// Container state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum ContainerState {
    Waiting { reason: Option<String> },
    Running { started_at: Option<String> },
    Terminated { exit_code: i32, reason: Option<String> },
    #[default]
    Unknown,
}
