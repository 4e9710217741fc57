//! Resource operation dispatch
//!
//! Every operation goes through the client's generic addressing mode,
//! whatever the resource kind. Updates are read-modify-write: only `spec` is
//! taken from the caller, everything else (including the fetched
//! `metadata.resourceVersion`) is sent back as it was read, so the control
//! plane detects concurrent writers. Nothing here retries.

use serde_json::Value;
use std::future::Future;
use std::time::Duration;

use super::client::ClusterClient;
use super::error::{K8sError, K8sResult};
use super::types::{Operation, ResourceDocument, ResourceReference};

/// Executes operations against a cluster client with a per-call deadline
#[derive(Debug, Clone, Copy)]
pub struct ResourceOperationDispatcher {
    timeout: Duration,
}

impl ResourceOperationDispatcher {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn execute(
        &self,
        client: &dyn ClusterClient,
        reference: &ResourceReference,
        operation: Operation,
        document: Option<&ResourceDocument>,
    ) -> K8sResult<ResourceDocument> {
        if operation.requires_name() && !reference.has_name() {
            return Err(K8sError::NameRequired(format!(
                "{} of {}",
                operation, reference.kind
            )));
        }

        tracing::info!(
            operation = %operation,
            kind = %reference.kind,
            namespace = %reference.namespace,
            name = %reference.name,
            api_server = %client.api_server(),
            "Dispatching resource operation"
        );

        let result = match operation {
            Operation::Create => {
                let document = required_document(operation, document)?;
                self.bounded(operation, client.create(reference, document))
                    .await
            }
            Operation::Update => {
                let document = required_document(operation, document)?;
                self.update(client, reference, document).await
            }
            Operation::Get => self.bounded(operation, client.get(reference)).await,
            Operation::Delete => self.bounded(operation, client.delete(reference)).await,
        };

        if let Err(ref e) = result {
            tracing::warn!(
                operation = %operation,
                kind = %reference.kind,
                namespace = %reference.namespace,
                name = %reference.name,
                error = %e,
                "Resource operation failed"
            );
        }

        result
    }

    async fn update(
        &self,
        client: &dyn ClusterClient,
        reference: &ResourceReference,
        document: &ResourceDocument,
    ) -> K8sResult<ResourceDocument> {
        let spec = document
            .get("spec")
            .filter(|spec| !spec.is_null())
            .ok_or_else(|| {
                K8sError::ManifestInvalid(format!("Update of {} carries no spec", reference))
            })?;

        // Absent objects surface as NotFound here; update never creates
        let existing = self.bounded(Operation::Get, client.get(reference)).await?;
        let merged = merge_spec(existing, spec.clone())?;

        self.bounded(Operation::Update, client.replace(reference, &merged))
            .await
    }

    /// Run one control-plane call under the deadline; expiry is `Unavailable`
    pub async fn bounded<T>(
        &self,
        operation: Operation,
        call: impl Future<Output = K8sResult<T>>,
    ) -> K8sResult<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(K8sError::Unavailable(format!(
                "{} call timed out after {:?}",
                operation, self.timeout
            ))),
        }
    }
}

/// Replace the `spec` of a fetched object, leaving every other field as read
pub fn merge_spec(mut existing: ResourceDocument, spec: Value) -> K8sResult<ResourceDocument> {
    match existing.as_object_mut() {
        Some(map) => {
            map.insert("spec".to_string(), spec);
            Ok(existing)
        }
        None => Err(K8sError::Internal(
            "Control plane returned a non-object resource".to_string(),
        )),
    }
}

fn required_document(
    operation: Operation,
    document: Option<&ResourceDocument>,
) -> K8sResult<&ResourceDocument> {
    document.ok_or_else(|| K8sError::ManifestInvalid(format!("{} requires a manifest", operation)))
}
