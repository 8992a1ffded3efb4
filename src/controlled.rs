use futures::future::join_all;
use tracing::{debug, warn};

use crate::cluster::FetchOptions;
use crate::entity::{DEFAULT_NAMESPACE, KubeEntity, remove_duplicate_resources};
use crate::status::StatusService;

pub const CONTROLLER_LABEL: &str = "app";

/// Label selector for the pods an entity controls, if it controls any.
pub fn controlled_pod_selector(entity: &KubeEntity) -> Option<String> {
    if entity.kind == "Pod" {
        return None;
    }
    entity
        .label(CONTROLLER_LABEL)
        .map(|app| format!("{CONTROLLER_LABEL}={app}"))
}

impl StatusService {
    /// Pods selected by the `app` label of each non-pod entity.
    ///
    /// A failed lookup contributes nothing.
    pub(crate) async fn find_controlled_resources(&self, entities: &[KubeEntity]) -> Vec<KubeEntity> {
        let lookups: Vec<(String, String)> = entities
            .iter()
            .filter_map(|entity| {
                let selector = controlled_pod_selector(entity)?;
                let namespace = entity.namespace().unwrap_or(DEFAULT_NAMESPACE).to_string();
                Some((namespace, selector))
            })
            .collect();

        if lookups.is_empty() {
            return Vec::new();
        }
        debug!(lookups = lookups.len(), "finding controlled resources");

        let pods = join_all(lookups.iter().map(|(namespace, selector)| async move {
            let options = FetchOptions::default().namespace(namespace).labels(selector);
            match self.client.get("pods", None, &options).await {
                Ok(pods) => pods,
                Err(err) => {
                    warn!(namespace = %namespace, selector = %selector, error = %err, "failed to fetch controlled pods");
                    Vec::new()
                }
            }
        }))
        .await;

        remove_duplicate_resources(pods.into_iter().flatten().collect())
    }
}
