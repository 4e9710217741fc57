//! Pod read operations
//!
//! Typed-mode reads that return the simplified `PodInfo` shape.

use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, ListParams};
use kube::Client;

use super::error::{K8sError, K8sResult};
use super::types::{ContainerInfo, ContainerState, PodInfo, PodStatus};

/// List pods in a namespace
pub async fn list_pods(client: &Client, namespace: &str) -> K8sResult<Vec<PodInfo>> {
    let pods: Api<Pod> = Api::namespaced(client.clone(), namespace);
    let pod_list = pods.list(&ListParams::default()).await?;

    Ok(pod_list.items.into_iter().map(pod_to_info).collect())
}

/// Get a single pod
pub async fn get_pod(client: &Client, namespace: &str, name: &str) -> K8sResult<PodInfo> {
    let pods: Api<Pod> = Api::namespaced(client.clone(), namespace);

    match pods.get(name).await {
        Ok(pod) => Ok(pod_to_info(pod)),
        Err(kube::Error::Api(e)) if e.code == 404 => Err(K8sError::ResourceNotFound {
            kind: "Pod".to_string(),
            name: name.to_string(),
            namespace: namespace.to_string(),
        }),
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn pod_to_info(pod: Pod) -> PodInfo {
    let metadata = pod.metadata;
    let spec = pod.spec.unwrap_or_default();
    let status = pod.status.unwrap_or_default();

    let pod_status = match status.phase.as_deref() {
        Some("Pending") => PodStatus::Pending,
        Some("Running") => PodStatus::Running,
        Some("Succeeded") => PodStatus::Succeeded,
        Some("Failed") => PodStatus::Failed,
        _ => PodStatus::Unknown,
    };

    let container_statuses = status.container_statuses.unwrap_or_default();
    let containers: Vec<ContainerInfo> = spec
        .containers
        .iter()
        .map(|c| {
            let (ready, restart_count, state) =
                match container_statuses.iter().find(|cs| cs.name == c.name) {
                    Some(cs) => {
                        let state = cs
                            .state
                            .as_ref()
                            .map(|s| {
                                if let Some(ref waiting) = s.waiting {
                                    ContainerState::Waiting {
                                        reason: waiting.reason.clone(),
                                    }
                                } else if let Some(ref running) = s.running {
                                    ContainerState::Running {
                                        started_at: running
                                            .started_at
                                            .as_ref()
                                            .map(|t| t.0.to_rfc3339()),
                                    }
                                } else if let Some(ref terminated) = s.terminated {
                                    ContainerState::Terminated {
                                        exit_code: terminated.exit_code,
                                        reason: terminated.reason.clone(),
                                    }
                                } else {
                                    ContainerState::Unknown
                                }
                            })
                            .unwrap_or_default();
                        (cs.ready, cs.restart_count, state)
                    }
                    None => (false, 0, ContainerState::Unknown),
                };

            ContainerInfo {
                name: c.name.clone(),
                image: c.image.clone().unwrap_or_default(),
                ready,
                restart_count,
                state,
            }
        })
        .collect();

    let restart_count: i32 = containers.iter().map(|c| c.restart_count).sum();

    PodInfo {
        name: metadata.name.unwrap_or_default(),
        namespace: metadata.namespace.unwrap_or_default(),
        status: pod_status,
        node_name: spec.node_name,
        pod_ip: status.pod_ip,
        host_ip: status.host_ip,
        containers,
        labels: metadata.labels.unwrap_or_default(),
        annotations: metadata.annotations.unwrap_or_default(),
        created_at: metadata.creation_timestamp.map(|t| t.0.to_rfc3339()),
        restart_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pod(value: serde_json::Value) -> Pod {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_running_pod_to_info() {
        let info = pod_to_info(pod(json!({
            "metadata": {
                "name": "web-0",
                "namespace": "shop",
                "labels": {"app": "web"},
                "creationTimestamp": "2024-03-01T10:00:00Z"
            },
            "spec": {
                "nodeName": "node-a",
                "containers": [
                    {"name": "app", "image": "nginx:1.25"},
                    {"name": "sidecar", "image": "envoy:1.29"}
                ]
            },
            "status": {
                "phase": "Running",
                "podIP": "10.0.0.7",
                "containerStatuses": [
                    {
                        "name": "app", "image": "nginx:1.25", "imageID": "",
                        "ready": true, "restartCount": 2,
                        "state": {"running": {"startedAt": "2024-03-01T10:00:05Z"}}
                    },
                    {
                        "name": "sidecar", "image": "envoy:1.29", "imageID": "",
                        "ready": false, "restartCount": 1,
                        "state": {"waiting": {"reason": "CrashLoopBackOff"}}
                    }
                ]
            }
        })));

        assert_eq!(info.name, "web-0");
        assert_eq!(info.namespace, "shop");
        assert_eq!(info.status, PodStatus::Running);
        assert_eq!(info.node_name.as_deref(), Some("node-a"));
        assert_eq!(info.pod_ip.as_deref(), Some("10.0.0.7"));
        assert_eq!(info.restart_count, 3);
        assert_eq!(info.labels.get("app").map(String::as_str), Some("web"));
        assert!(info.created_at.is_some());
        assert!(info.containers[0].ready);
        assert!(matches!(
            info.containers[1].state,
            ContainerState::Waiting { reason: Some(ref r) } if r == "CrashLoopBackOff"
        ));
    }

    #[test]
    fn test_pod_without_status() {
        let info = pod_to_info(pod(json!({
            "metadata": {"name": "pending"},
            "spec": {"containers": [{"name": "app"}]}
        })));

        assert_eq!(info.status, PodStatus::Unknown);
        assert_eq!(info.containers.len(), 1);
        assert!(!info.containers[0].ready);
        assert!(matches!(info.containers[0].state, ContainerState::Unknown));
    }
}
