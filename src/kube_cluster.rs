//! Cluster access through kubeconfig contexts and API discovery.

use async_trait::async_trait;
use futures::future::try_join_all;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResource;
use kube::api::{ApiResource, DynamicObject, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::cluster::{ClusterClient, ContextProvider, FetchOptions};
use crate::entity::{ContextDescriptor, DEFAULT_NAMESPACE, KubeEntity};
use crate::error::FetchError;

/// A resource type the API server reported during discovery.
#[derive(Debug, Clone)]
pub struct DiscoveredResource {
    pub api_resource: ApiResource,
    pub namespaced: bool,
    pub categories: Vec<String>,
}

/// Resource types of one cluster, addressable the way `kubectl get` accepts them.
#[derive(Debug, Default)]
pub struct ResourceIndex {
    resources: Vec<DiscoveredResource>,
    aliases: HashMap<String, usize>,
}

impl ResourceIndex {
    /// Registers a discovered type. Earlier registrations win alias clashes,
    /// so core types shadow same-named custom resources.
    pub fn insert(&mut self, group: &str, version: &str, resource: &APIResource) {
        // subresources such as pods/log
        if resource.name.contains('/') {
            return;
        }

        let api_version = if group.is_empty() {
            version.to_string()
        } else {
            format!("{group}/{version}")
        };
        let idx = self.resources.len();
        self.resources.push(DiscoveredResource {
            api_resource: ApiResource {
                group: group.to_string(),
                version: version.to_string(),
                api_version,
                kind: resource.kind.clone(),
                plural: resource.name.clone(),
            },
            namespaced: resource.namespaced,
            categories: resource.categories.clone().unwrap_or_default(),
        });

        let mut aliases = vec![
            resource.name.clone(),
            resource.singular_name.clone(),
            resource.kind.to_lowercase(),
        ];
        aliases.extend(resource.short_names.iter().flatten().cloned());
        if !group.is_empty() {
            aliases.push(format!("{}.{group}", resource.name));
        }

        for alias in aliases.into_iter().filter(|alias| !alias.is_empty()) {
            self.aliases.entry(alias.to_lowercase()).or_insert(idx);
        }
    }

    /// The types `kind` names: a single type for a name, short name or kind,
    /// or every member of a category such as `all`.
    pub fn resolve(&self, kind: &str) -> Result<Vec<&DiscoveredResource>, FetchError> {
        let key = kind.to_lowercase();
        if let Some(&idx) = self.aliases.get(&key) {
            return Ok(vec![&self.resources[idx]]);
        }

        let members: Vec<_> = self
            .resources
            .iter()
            .filter(|resource| resource.categories.iter().any(|c| *c == key))
            .collect();
        if members.is_empty() {
            return Err(FetchError::NotFound(format!(
                "the server doesn't have a resource type \"{kind}\""
            )));
        }
        Ok(members)
    }

    async fn discover(client: &Client) -> Result<Self, kube::Error> {
        let mut index = ResourceIndex::default();

        for version in client.list_core_api_versions().await?.versions {
            let list = client.list_core_api_resources(&version).await?;
            for resource in &list.resources {
                index.insert("", &version, resource);
            }
        }

        for group in client.list_api_groups().await?.groups {
            let Some(preferred) = group
                .preferred_version
                .as_ref()
                .or_else(|| group.versions.first())
            else {
                continue;
            };
            let list = client
                .list_api_group_resources(&preferred.group_version)
                .await?;
            for resource in &list.resources {
                index.insert(&group.name, &preferred.version, resource);
            }
        }

        Ok(index)
    }
}

/// Shortest gap between two rediscoveries of the same context.
pub const REDISCOVERY_INTERVAL: Duration = Duration::from_secs(10);

/// Discovery results of one context. A kind missing from the index triggers
/// one rediscovery, so resource types installed later become resolvable.
pub struct DiscoveryCache {
    index: RwLock<Arc<ResourceIndex>>,
    refreshed_at: Mutex<Instant>,
    min_refresh_interval: Duration,
}

impl DiscoveryCache {
    pub fn new(index: ResourceIndex, min_refresh_interval: Duration) -> Self {
        Self {
            index: RwLock::new(Arc::new(index)),
            refreshed_at: Mutex::new(Instant::now()),
            min_refresh_interval,
        }
    }

    pub async fn resolve<F, Fut>(
        &self,
        kind: &str,
        discover: F,
    ) -> Result<Vec<DiscoveredResource>, FetchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ResourceIndex, FetchError>>,
    {
        let seen = self.index.read().await.clone();
        let miss = match seen.resolve(kind) {
            Ok(found) => return Ok(found.into_iter().cloned().collect()),
            Err(err) => err,
        };

        let mut refreshed_at = self.refreshed_at.lock().await;
        let current = self.index.read().await.clone();
        if !Arc::ptr_eq(&current, &seen) {
            // refreshed by a concurrent lookup
            return current
                .resolve(kind)
                .map(|found| found.into_iter().cloned().collect());
        }
        if refreshed_at.elapsed() < self.min_refresh_interval {
            return Err(miss);
        }

        debug!(kind, "unknown resource type, rediscovering");
        let fresh = Arc::new(discover().await?);
        *refreshed_at = Instant::now();
        *self.index.write().await = fresh.clone();

        fresh
            .resolve(kind)
            .map(|found| found.into_iter().cloned().collect())
    }
}

pub enum KubeconfigSource {
    /// `$KUBECONFIG` or `~/.kube/config`, read again on every lookup.
    Default,
    Fixed(Kubeconfig),
}

struct ContextClient {
    client: Client,
    discovery: DiscoveryCache,
    /// Namespace the context selects, `default` when it names none.
    namespace: String,
}

pub struct KubeCluster {
    source: KubeconfigSource,
    clients: RwLock<HashMap<String, Arc<ContextClient>>>,
}

impl KubeCluster {
    pub fn new() -> Self {
        Self::with_source(KubeconfigSource::Default)
    }

    pub fn from_kubeconfig(kubeconfig: Kubeconfig) -> Self {
        Self::with_source(KubeconfigSource::Fixed(kubeconfig))
    }

    fn with_source(source: KubeconfigSource) -> Self {
        Self {
            source,
            clients: RwLock::new(HashMap::new()),
        }
    }

    fn kubeconfig(&self) -> Result<Kubeconfig, FetchError> {
        match &self.source {
            KubeconfigSource::Default => {
                Kubeconfig::read().map_err(|err| FetchError::Other(err.to_string()))
            }
            KubeconfigSource::Fixed(kubeconfig) => Ok(kubeconfig.clone()),
        }
    }

    async fn context_client(&self, context: &str) -> Result<Arc<ContextClient>, FetchError> {
        if let Some(existing) = self.clients.read().await.get(context) {
            return Ok(existing.clone());
        }

        let config = Config::from_custom_kubeconfig(
            self.kubeconfig()?,
            &KubeConfigOptions {
                context: Some(context.to_string()),
                ..Default::default()
            },
        )
        .await
        .map_err(|err| FetchError::Other(format!("context {context}: {err}")))?;
        let namespace = config.default_namespace.clone();
        let client = Client::try_from(config)?;

        let index = ResourceIndex::discover(&client).await?;
        info!(context, resource_types = index.resources.len(), "discovered cluster resources");

        let handle = Arc::new(ContextClient {
            client,
            discovery: DiscoveryCache::new(index, REDISCOVERY_INTERVAL),
            namespace,
        });
        self.clients
            .write()
            .await
            .insert(context.to_string(), handle.clone());
        Ok(handle)
    }
}

impl Default for KubeCluster {
    fn default() -> Self {
        Self::new()
    }
}

fn to_entity(object: DynamicObject, resource: &ApiResource) -> KubeEntity {
    KubeEntity {
        api_version: Some(resource.api_version.clone()),
        kind: resource.kind.clone(),
        spec: object.data.get("spec").cloned(),
        status: object.data.get("status").cloned(),
        metadata: object.metadata,
    }
}

#[async_trait]
impl ClusterClient for KubeCluster {
    async fn get(
        &self,
        kind: &str,
        name: Option<&str>,
        options: &FetchOptions,
    ) -> Result<Vec<KubeEntity>, FetchError> {
        let context = match &options.context {
            Some(context) => context.clone(),
            None => self.current_context().await?,
        };
        let handle = self.context_client(&context).await?;
        let discovery_client = handle.client.clone();
        let resources = handle
            .discovery
            .resolve(kind, || async move {
                ResourceIndex::discover(&discovery_client)
                    .await
                    .map_err(FetchError::from)
            })
            .await?;

        debug!(
            kind,
            name = ?name,
            context = %context,
            namespace = ?options.namespace,
            resource_types = resources.len(),
            "fetching resources"
        );

        let fetched = try_join_all(resources.iter().map(|resource| {
            let client = handle.client.clone();
            let namespace = options.namespace.as_deref().unwrap_or(&handle.namespace);
            async move {
                let ar = &resource.api_resource;
                let api: Api<DynamicObject> = if resource.namespaced {
                    Api::namespaced_with(client, namespace, ar)
                } else {
                    Api::all_with(client, ar)
                };

                match name {
                    Some(name) => Ok::<_, kube::Error>(vec![to_entity(api.get(name).await?, ar)]),
                    None => {
                        let mut params = ListParams::default();
                        if let Some(selector) = &options.label_selector {
                            params = params.labels(selector);
                        }
                        let list = api.list(&params).await?;
                        Ok(list.items.into_iter().map(|o| to_entity(o, ar)).collect())
                    }
                }
            }
        }))
        .await?;

        Ok(fetched.into_iter().flatten().collect())
    }
}

#[async_trait]
impl ContextProvider for KubeCluster {
    async fn list_contexts(&self) -> Result<Vec<ContextDescriptor>, FetchError> {
        let kubeconfig = self.kubeconfig()?;
        Ok(kubeconfig
            .contexts
            .into_iter()
            .map(|named| ContextDescriptor {
                namespace: named
                    .context
                    .and_then(|ctx| ctx.namespace)
                    .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
                name: named.name,
            })
            .collect())
    }

    async fn current_context(&self) -> Result<String, FetchError> {
        self.kubeconfig()?
            .current_context
            .ok_or_else(|| FetchError::Other("kubeconfig has no current context".to_string()))
    }
}
