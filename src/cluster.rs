use async_trait::async_trait;

use crate::entity::{ContextDescriptor, KubeEntity};
use crate::error::FetchError;

/// Scoping for a single cluster query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOptions {
    pub context: Option<String>,
    pub namespace: Option<String>,
    pub label_selector: Option<String>,
}

impl FetchOptions {
    pub fn context(mut self, context: &str) -> Self {
        self.context = Some(context.to_string());
        self
    }

    pub fn namespace(mut self, namespace: &str) -> Self {
        self.namespace = Some(namespace.to_string());
        self
    }

    pub fn labels(mut self, selector: &str) -> Self {
        if !selector.is_empty() {
            self.label_selector = Some(selector.to_string());
        }
        self
    }
}

/// Read-only queries against one cluster context.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Fetches a named resource, or lists a kind when `name` is `None`.
    async fn get(
        &self,
        kind: &str,
        name: Option<&str>,
        options: &FetchOptions,
    ) -> Result<Vec<KubeEntity>, FetchError>;
}

#[async_trait]
pub trait ContextProvider: Send + Sync {
    async fn list_contexts(&self) -> Result<Vec<ContextDescriptor>, FetchError>;

    async fn current_context(&self) -> Result<String, FetchError>;
}
