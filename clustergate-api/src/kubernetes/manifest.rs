//! Manifest resolution
//!
//! Turns a raw manifest (YAML or JSON) into a `ResourceReference` plus the
//! document itself. Resolution is pure: the same bytes and resolver
//! settings always yield the same reference.

use serde_json::Value;
use std::collections::HashMap;

use super::error::{K8sError, K8sResult};
use super::types::{ResourceDocument, ResourceReference};

/// Kinds whose plural is not `<lowercase kind>s`
const IRREGULAR_PLURALS: &[(&str, &str)] = &[
    ("endpoints", "endpoints"),
    ("ingress", "ingresses"),
    ("ingressclass", "ingressclasses"),
    ("networkpolicy", "networkpolicies"),
    ("podsecuritypolicy", "podsecuritypolicies"),
    ("priorityclass", "priorityclasses"),
    ("runtimeclass", "runtimeclasses"),
    ("storageclass", "storageclasses"),
];

/// `(kind, plural, apiVersion)` for kinds addressable without an apiVersion
const WELL_KNOWN_KINDS: &[(&str, &str, &str)] = &[
    ("Pod", "pods", "v1"),
    ("Service", "services", "v1"),
    ("ConfigMap", "configmaps", "v1"),
    ("Secret", "secrets", "v1"),
    ("PersistentVolumeClaim", "persistentvolumeclaims", "v1"),
    ("ServiceAccount", "serviceaccounts", "v1"),
    ("Deployment", "deployments", "apps/v1"),
    ("StatefulSet", "statefulsets", "apps/v1"),
    ("DaemonSet", "daemonsets", "apps/v1"),
    ("ReplicaSet", "replicasets", "apps/v1"),
    ("Job", "jobs", "batch/v1"),
    ("CronJob", "cronjobs", "batch/v1"),
    ("Ingress", "ingresses", "networking.k8s.io/v1"),
    ("NetworkPolicy", "networkpolicies", "networking.k8s.io/v1"),
];

/// Call path a manifest is resolved for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveIntent {
    /// Create: the name may be left to the control plane
    Create,
    /// Update, get or delete: the manifest must name its target
    Identify,
}

/// Parses manifests into resource references
#[derive(Debug, Clone)]
pub struct ManifestResolver {
    default_namespace: String,
    plural_overrides: HashMap<String, String>,
}

impl Default for ManifestResolver {
    fn default() -> Self {
        Self::new("default")
    }
}

impl ManifestResolver {
    pub fn new(default_namespace: impl Into<String>) -> Self {
        Self {
            default_namespace: default_namespace.into(),
            plural_overrides: HashMap::new(),
        }
    }

    /// Extra irregular plurals, keyed by lowercase kind
    pub fn with_plural_overrides(mut self, overrides: HashMap<String, String>) -> Self {
        self.plural_overrides = overrides
            .into_iter()
            .map(|(kind, plural)| (kind.to_lowercase(), plural))
            .collect();
        self
    }

    pub fn default_namespace(&self) -> &str {
        &self.default_namespace
    }

    /// Resolve raw manifest bytes
    pub fn resolve(
        &self,
        raw: &[u8],
        intent: ResolveIntent,
    ) -> K8sResult<(ResourceReference, ResourceDocument)> {
        self.resolve_document(parse_manifest(raw)?, intent)
    }

    /// Resolve an already parsed document
    ///
    /// The resolved namespace is written back into `metadata.namespace`, so
    /// the document sent to the control plane always agrees with the
    /// reference it is sent to.
    pub fn resolve_document(
        &self,
        mut document: ResourceDocument,
        intent: ResolveIntent,
    ) -> K8sResult<(ResourceReference, ResourceDocument)> {
        let api_version = required_str(&document, "apiVersion")?;
        let kind = required_str(&document, "kind")?;
        let (group, version) = split_api_version(&api_version)?;

        let metadata = match document.get("metadata") {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) => Some(map),
            Some(_) => {
                return Err(K8sError::ManifestInvalid(
                    "metadata must be a mapping".to_string(),
                ))
            }
        };
        let field = |key: &str| -> K8sResult<String> {
            match metadata.and_then(|m| m.get(key)) {
                None | Some(Value::Null) => Ok(String::new()),
                Some(Value::String(s)) => Ok(s.clone()),
                Some(_) => Err(K8sError::ManifestInvalid(format!(
                    "metadata.{} must be a string",
                    key
                ))),
            }
        };
        let name = field("name")?;
        let namespace = match field("namespace")? {
            ns if ns.is_empty() => self.default_namespace.clone(),
            ns => ns,
        };

        if intent == ResolveIntent::Identify && name.is_empty() {
            return Err(K8sError::NameRequired(format!(
                "{} manifest without metadata.name",
                kind
            )));
        }

        if !document.get("metadata").is_some_and(Value::is_object) {
            document["metadata"] = Value::Object(Default::default());
        }
        document["metadata"]["namespace"] = Value::String(namespace.clone());

        let reference = ResourceReference {
            group,
            version,
            resource_kind: self.pluralize(&kind),
            kind,
            namespace,
            name,
        };

        tracing::debug!(resource = %reference, "Resolved manifest");

        Ok((reference, document))
    }

    /// Resolve a reference from query parameters instead of a manifest
    ///
    /// Without `api_version`, `kind` must be one of the well-known kinds
    /// (matched case-insensitively, singular or plural). An empty namespace
    /// becomes the default namespace.
    pub fn resolve_query(
        &self,
        kind: &str,
        api_version: Option<&str>,
        namespace: &str,
        name: &str,
    ) -> K8sResult<ResourceReference> {
        if kind.is_empty() {
            return Err(K8sError::ManifestInvalid("kind is required".to_string()));
        }
        if name.is_empty() {
            return Err(K8sError::NameRequired(format!("{} query", kind)));
        }

        let well_known = well_known_kind(kind);
        let api_version = match (api_version.filter(|v| !v.is_empty()), well_known) {
            (Some(v), _) => v,
            (None, Some((_, _, v))) => v,
            (None, None) => {
                return Err(K8sError::ManifestInvalid(format!(
                    "Unknown kind '{}' requires an apiVersion",
                    kind
                )))
            }
        };
        let (group, version) = split_api_version(api_version)?;

        let (kind, resource_kind) = match well_known {
            Some((canonical, plural, _)) => (canonical.to_string(), plural.to_string()),
            None => (kind.to_string(), self.resource_name(kind)),
        };

        Ok(ResourceReference {
            group,
            version,
            kind,
            resource_kind,
            namespace: if namespace.is_empty() {
                self.default_namespace.clone()
            } else {
                namespace.to_string()
            },
            name: name.to_string(),
        })
    }

    /// Whether a kind given on a path or query names the same resource type
    /// as `reference`
    ///
    /// Accepts the kind in any case, the plural resource name, or a
    /// well-known alias of either.
    pub fn matches_kind(&self, kind: &str, reference: &ResourceReference) -> bool {
        if let Some((canonical, plural, _)) = well_known_kind(kind) {
            return canonical == reference.kind && plural == reference.resource_kind;
        }
        kind.eq_ignore_ascii_case(&reference.kind)
            || self.resource_name(kind) == reference.resource_kind
    }

    /// Resource name for a kind given on the query path, where callers may
    /// already use the plural form
    ///
    /// Lowercase names ending in "s", and plurals known from the override or
    /// irregular tables, are taken as they are.
    fn resource_name(&self, kind: &str) -> String {
        let lower = kind.to_lowercase();
        let known_plural = self.plural_overrides.values().any(|p| *p == lower)
            || IRREGULAR_PLURALS.iter().any(|(_, p)| *p == lower);
        let is_singular_key = self.plural_overrides.contains_key(&lower)
            || IRREGULAR_PLURALS.iter().any(|(k, _)| *k == lower);

        if known_plural || (!is_singular_key && kind == lower && lower.ends_with('s')) {
            lower
        } else {
            self.pluralize(kind)
        }
    }

    /// Lowercase the kind and append "s", unless an irregular plural is known
    pub fn pluralize(&self, kind: &str) -> String {
        let lower = kind.to_lowercase();
        if let Some(plural) = self.plural_overrides.get(&lower) {
            return plural.clone();
        }
        if let Some((_, plural)) = IRREGULAR_PLURALS.iter().find(|(k, _)| *k == lower) {
            return plural.to_string();
        }
        format!("{}s", lower)
    }
}

/// Parse manifest text as JSON when it looks like JSON, YAML otherwise
pub fn parse_manifest(raw: &[u8]) -> K8sResult<ResourceDocument> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| K8sError::ManifestInvalid(format!("Manifest is not UTF-8: {}", e)))?;
    let text = text.trim();
    if text.is_empty() {
        return Err(K8sError::ManifestInvalid("Manifest is empty".to_string()));
    }

    let document: Value = if text.starts_with('{') {
        serde_json::from_str(text)
            .map_err(|e| K8sError::ManifestInvalid(format!("Invalid JSON manifest: {}", e)))?
    } else {
        serde_yaml::from_str(text)
            .map_err(|e| K8sError::ManifestInvalid(format!("Invalid YAML manifest: {}", e)))?
    };

    if !document.is_object() {
        return Err(K8sError::ManifestInvalid(
            "Manifest must describe a single resource mapping".to_string(),
        ));
    }

    Ok(document)
}

/// Split `group/version`; a bare version belongs to the core group
pub fn split_api_version(api_version: &str) -> K8sResult<(String, String)> {
    let invalid = || K8sError::ManifestInvalid(format!("Invalid apiVersion '{}'", api_version));

    match api_version.split('/').collect::<Vec<_>>().as_slice() {
        [version] if !version.is_empty() => Ok((String::new(), version.to_string())),
        [group, version] if !group.is_empty() && !version.is_empty() => {
            Ok((group.to_string(), version.to_string()))
        }
        _ => Err(invalid()),
    }
}

fn well_known_kind(kind: &str) -> Option<(&'static str, &'static str, &'static str)> {
    WELL_KNOWN_KINDS
        .iter()
        .find(|(k, plural, _)| k.eq_ignore_ascii_case(kind) || plural.eq_ignore_ascii_case(kind))
        .copied()
}

fn required_str(document: &Value, key: &str) -> K8sResult<String> {
    match document.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::String(_)) | None | Some(Value::Null) => {
            Err(K8sError::ManifestInvalid(format!("{} is required", key)))
        }
        Some(_) => Err(K8sError::ManifestInvalid(format!("{} must be a string", key))),
    }
}
