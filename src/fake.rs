//! In-memory cluster and filesystem used by unit tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::cluster::{ClusterClient, ContextProvider, FetchOptions};
use crate::config::StatusSettings;
use crate::entity::{ContextDescriptor, KubeEntity};
use crate::error::{FetchError, StatusError};
use crate::files::FileLoader;
use crate::format::TableFormatter;
use crate::retry::RetryPolicy;
use crate::status::StatusService;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCall {
    pub kind: String,
    pub name: Option<String>,
    pub options: FetchOptions,
}

type Handler = dyn Fn(&FetchCall) -> Result<Vec<KubeEntity>, FetchError> + Send + Sync;

pub struct FakeCluster {
    handler: Box<Handler>,
    contexts: Vec<ContextDescriptor>,
    current: String,
    calls: Mutex<Vec<FetchCall>>,
}

impl FakeCluster {
    pub fn new<H>(handler: H) -> Self
    where
        H: Fn(&FetchCall) -> Result<Vec<KubeEntity>, FetchError> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            contexts: vec![context("kind-dev", "default")],
            current: "kind-dev".to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_contexts(mut self, contexts: Vec<ContextDescriptor>, current: &str) -> Self {
        self.contexts = contexts;
        self.current = current.to_string();
        self
    }

    pub fn calls(&self) -> Vec<FetchCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn get(
        &self,
        kind: &str,
        name: Option<&str>,
        options: &FetchOptions,
    ) -> Result<Vec<KubeEntity>, FetchError> {
        let call = FetchCall {
            kind: kind.to_string(),
            name: name.map(str::to_string),
            options: options.clone(),
        };
        self.calls.lock().unwrap().push(call.clone());
        (self.handler)(&call)
    }
}

#[async_trait]
impl ContextProvider for FakeCluster {
    async fn list_contexts(&self) -> Result<Vec<ContextDescriptor>, FetchError> {
        Ok(self.contexts.clone())
    }

    async fn current_context(&self) -> Result<String, FetchError> {
        Ok(self.current.clone())
    }
}

/// Directories list their entries in insertion order.
#[derive(Default)]
pub struct FakeFiles {
    dirs: HashMap<PathBuf, Vec<String>>,
    files: HashMap<String, String>,
    links: HashMap<PathBuf, PathBuf>,
}

impl FakeFiles {
    pub fn with_dir(mut self, path: &str, entries: &[&str]) -> Self {
        self.dirs.insert(
            PathBuf::from(path),
            entries.iter().map(|entry| entry.to_string()).collect(),
        );
        self
    }

    pub fn with_file(mut self, path: &str, contents: &str) -> Self {
        self.files.insert(path.to_string(), contents.to_string());
        self
    }

    /// Makes `path` canonicalize to `target`, like a symlink.
    pub fn with_link(mut self, path: &str, target: &str) -> Self {
        self.links.insert(PathBuf::from(path), PathBuf::from(target));
        self
    }
}

#[async_trait]
impl FileLoader for FakeFiles {
    fn resolve_path(&self, target: &str) -> PathBuf {
        PathBuf::from(target)
    }

    async fn is_directory(&self, path: &Path) -> Option<bool> {
        if self.dirs.contains_key(path) {
            Some(true)
        } else if self.files.contains_key(path.to_string_lossy().as_ref()) {
            Some(false)
        } else {
            None
        }
    }

    async fn list_directory(&self, path: &Path) -> Result<Vec<String>, StatusError> {
        self.dirs.get(path).cloned().ok_or_else(|| StatusError::Load {
            location: path.display().to_string(),
            message: "no such directory".to_string(),
        })
    }

    async fn fetch_file_contents(&self, location: &str) -> Result<String, StatusError> {
        self.files
            .get(location)
            .cloned()
            .ok_or_else(|| StatusError::Load {
                location: location.to_string(),
                message: "no such file".to_string(),
            })
    }

    async fn canonical_path(&self, path: &Path) -> PathBuf {
        self.links
            .get(path)
            .cloned()
            .unwrap_or_else(|| path.to_path_buf())
    }
}

pub fn context(name: &str, namespace: &str) -> ContextDescriptor {
    ContextDescriptor {
        name: name.to_string(),
        namespace: namespace.to_string(),
    }
}

fn labeled(kind: &str, name: &str, namespace: &str, app: Option<&str>) -> KubeEntity {
    let mut entity = KubeEntity::new(kind, name, Some(namespace));
    if let Some(app) = app {
        entity.metadata.labels = Some([("app".to_string(), app.to_string())].into());
    }
    entity
}

pub fn pod(name: &str, namespace: &str, app: Option<&str>) -> KubeEntity {
    labeled("Pod", name, namespace, app)
}

pub fn deployment(name: &str, namespace: &str, app: Option<&str>) -> KubeEntity {
    labeled("Deployment", name, namespace, app)
}

/// A status service over the fakes, retrying 404s twice without delay.
pub fn service(cluster: FakeCluster, files: FakeFiles) -> (StatusService, Arc<FakeCluster>) {
    service_with_files(cluster, Arc::new(files))
}

pub fn service_with_files(
    cluster: FakeCluster,
    files: Arc<dyn FileLoader>,
) -> (StatusService, Arc<FakeCluster>) {
    let cluster = Arc::new(cluster);
    let settings = StatusSettings {
        retry: RetryPolicy::new(2, Duration::from_millis(1)),
        ..Default::default()
    };
    let status = StatusService::new(
        cluster.clone(),
        cluster.clone(),
        files,
        Arc::new(TableFormatter),
        settings,
    );
    (status, cluster)
}
