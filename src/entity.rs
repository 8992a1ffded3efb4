use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashSet;

use crate::error::FetchError;

pub const DEFAULT_NAMESPACE: &str = "default";

/// A fetched resource instance, or an error record shaped like one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubeEntity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
}

impl KubeEntity {
    pub fn new(kind: impl Into<String>, name: &str, namespace: Option<&str>) -> Self {
        Self {
            kind: kind.into(),
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: namespace.map(str::to_string),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.metadata.namespace.as_deref()
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.metadata
            .labels
            .as_ref()
            .and_then(|labels| labels.get(key))
            .map(String::as_str)
    }

    /// Identity used for deduplication: kind, name and namespace.
    pub fn identity(&self) -> (String, String, String) {
        (
            self.kind.clone(),
            self.name().to_string(),
            self.namespace().unwrap_or_default().to_string(),
        )
    }

    /// Substitute for a resource whose fetch failed.
    ///
    /// A not-found failure yields an `Offline` record. Any other failure
    /// yields a `Failed` record, unless `raw` is set, in which case the
    /// error is handed back to the caller unchanged.
    pub fn from_fetch_error(
        reference: &ResourceReference,
        backup_namespace: &str,
        err: FetchError,
        raw: bool,
    ) -> Result<Self, FetchError> {
        let (state, message) = match &err {
            FetchError::NotFound(_) => (State::Offline, "resource has been deleted"),
            FetchError::Other(_) if raw => return Err(err),
            FetchError::Other(_) => (State::Failed, "error fetching resource"),
        };

        let namespace = reference
            .namespace
            .as_deref()
            .unwrap_or(backup_namespace)
            .to_string();

        Ok(Self {
            api_version: None,
            kind: reference.kind.clone(),
            metadata: ObjectMeta {
                name: reference.name.clone(),
                namespace: Some(namespace),
                ..Default::default()
            },
            spec: None,
            status: Some(json!({
                "state": state.to_string(),
                "message": message,
            })),
        })
    }
}

/// What to fetch. A missing `name` means a list query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceReference {
    pub kind: String,
    pub name: Option<String>,
    pub namespace: Option<String>,
    pub context: Option<String>,
}

impl ResourceReference {
    pub fn named(kind: impl Into<String>, name: impl Into<String>, namespace: &str) -> Self {
        Self {
            kind: kind.into(),
            name: Some(name.into()),
            namespace: Some(namespace.to_string()),
            context: None,
        }
    }

    /// Builds a reference from one YAML document. The namespace comes from
    /// the document itself, then the request, then `default`.
    pub fn from_document(document: &Value, request_namespace: Option<&str>) -> Option<Self> {
        let kind = document.get("kind")?.as_str()?;
        let metadata = document.get("metadata")?;
        let name = metadata.get("name")?.as_str()?;
        let namespace = metadata
            .get("namespace")
            .and_then(Value::as_str)
            .or(request_namespace)
            .unwrap_or(DEFAULT_NAMESPACE);

        Some(Self::named(kind, name, namespace))
    }

    pub fn describe(&self) -> String {
        match (&self.name, &self.namespace) {
            (Some(name), Some(ns)) => format!("{} {} -n {}", self.kind, name, ns),
            (Some(name), None) => format!("{} {}", self.kind, name),
            (None, Some(ns)) => format!("{} -n {}", self.kind, ns),
            (None, None) => self.kind.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextDescriptor {
    pub name: String,
    pub namespace: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum State {
    Online,
    Pending,
    Offline,
    Failed,
    Unknown,
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            State::Online => write!(f, "Online"),
            State::Pending => write!(f, "Pending"),
            State::Offline => write!(f, "Offline"),
            State::Failed => write!(f, "Failed"),
            State::Unknown => write!(f, "Unknown"),
        }
    }
}

impl State {
    pub fn parse(value: &str) -> Self {
        match value {
            "Online" | "Running" | "Succeeded" | "Active" | "Bound" | "Ready" => State::Online,
            "Pending" | "ContainerCreating" | "Terminating" => State::Pending,
            "Offline" => State::Offline,
            "Failed" | "CrashLoopBackOff" | "Error" => State::Failed,
            _ => State::Unknown,
        }
    }

    /// Derives the displayed state of an entity from whatever its status carries.
    pub fn of(entity: &KubeEntity) -> Self {
        let Some(status) = &entity.status else {
            return State::Unknown;
        };

        if let Some(state) = status.get("state").and_then(Value::as_str) {
            return State::parse(state);
        }

        if let Some(phase) = status.get("phase").and_then(Value::as_str) {
            return State::parse(phase);
        }

        if let Some(desired) = entity
            .spec
            .as_ref()
            .and_then(|spec| spec.get("replicas"))
            .and_then(Value::as_i64)
        {
            let ready = status
                .get("readyReplicas")
                .and_then(Value::as_i64)
                .unwrap_or(0);
            return if ready >= desired {
                State::Online
            } else {
                State::Pending
            };
        }

        let conditions = status.get("conditions").and_then(Value::as_array);
        for condition in conditions.into_iter().flatten() {
            let kind = condition.get("type").and_then(Value::as_str);
            if matches!(kind, Some("Ready") | Some("Available")) {
                return match condition.get("status").and_then(Value::as_str) {
                    Some("True") => State::Online,
                    Some("False") => State::Failed,
                    _ => State::Pending,
                };
            }
        }

        State::Unknown
    }
}

/// When a status poller may stop watching a resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinalState {
    #[default]
    NotPendingLike,
    OnlineLike,
    OfflineLike,
}

impl FinalState {
    pub fn is_reached(&self, state: State) -> bool {
        match self {
            FinalState::NotPendingLike => !matches!(state, State::Pending | State::Unknown),
            FinalState::OnlineLike => state == State::Online,
            FinalState::OfflineLike => matches!(state, State::Offline | State::Failed),
        }
    }
}

/// Drops repeated entities, keeping the first occurrence of each identity.
pub fn remove_duplicate_resources(entities: Vec<KubeEntity>) -> Vec<KubeEntity> {
    let mut seen = HashSet::new();
    entities
        .into_iter()
        .filter(|entity| seen.insert(entity.identity()))
        .collect()
}
