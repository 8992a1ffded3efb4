use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Settings;
use crate::files::LocalFiles;
use crate::format::TableFormatter;
use crate::kube_cluster::KubeCluster;
use crate::router;
use crate::status::StatusService;

pub struct StatusServer {
    pub addr: SocketAddr,
    pub listener: tokio::net::TcpListener,
    pub router: axum::Router,
}

impl StatusServer {
    /// Serves clusters from the default kubeconfig.
    pub async fn new(settings: Settings) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Self::new_with_cluster(settings, Arc::new(KubeCluster::new())).await
    }

    pub async fn new_with_cluster(
        settings: Settings,
        cluster: Arc<KubeCluster>,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let base_dir = match settings.base_dir {
            Some(dir) => dir,
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        };

        let service = StatusService::new(
            cluster.clone(),
            cluster,
            Arc::new(LocalFiles::new(base_dir)),
            Arc::new(TableFormatter),
            settings.status,
        );
        let router = router::new_router(Arc::new(service));
        let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;
        let addr = listener.local_addr()?;

        Ok(StatusServer {
            addr,
            listener,
            router,
        })
    }

    pub async fn serve(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        axum::serve(self.listener, self.router).await?;
        Ok(())
    }
}
