use crate::{TestCluster, TestResources};
use kubestatus::config::{Settings, StatusSettings};
use kubestatus::retry::RetryPolicy;
use kubestatus::server::StatusServer;
use serde_json::Value;
use std::time::Duration;

const NAMESPACE: &str = "status-ns";

fn attribute<'a>(row: &'a Value, key: &str) -> Option<&'a str> {
    row["attributes"]
        .as_array()?
        .iter()
        .find(|attr| attr["key"] == key)?["value"]
        .as_str()
}

#[tokio::test]
async fn test_status_against_k3s() -> Result<(), Box<dyn std::error::Error>> {
    let cluster = TestCluster::new().await?;
    cluster.wait_for_ready().await?;

    let resources = TestResources::new(cluster.client.clone(), NAMESPACE);
    resources.create_namespace().await?;
    resources.create_test_deployment("web", 1).await?;
    resources.create_test_service("web-svc", "web").await?;
    resources.wait_for_pods_ready("app=web", 1).await?;

    let workdir = tempfile::tempdir()?;
    let app = workdir.path().join("app");
    std::fs::create_dir(&app)?;
    std::fs::write(
        app.join("main.yaml"),
        format!("apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: web\n  namespace: {NAMESPACE}\n"),
    )?;
    std::fs::write(
        app.join("svc.yaml"),
        format!(
            "apiVersion: v1\nkind: Service\nmetadata:\n  name: web-svc\n  namespace: {NAMESPACE}\n\
             ---\napiVersion: v1\nkind: Service\nmetadata:\n  name: gone\n  namespace: {NAMESPACE}\n"
        ),
    )?;

    let settings = Settings {
        bind_addr: "127.0.0.1:0".to_string(),
        base_dir: Some(workdir.path().to_path_buf()),
        status: StatusSettings {
            retry: RetryPolicy::new(1, Duration::from_millis(100)),
            ..Default::default()
        },
    };
    let server = StatusServer::new_with_cluster(settings, cluster.status_cluster())
        .await
        .map_err(|e| -> Box<dyn std::error::Error> { e })?;
    let server_url = format!("http://{}", server.addr);
    let _server_handle = tokio::spawn(async move { server.serve().await });

    // kind and name: the deployment, then the pods it controls
    let response = reqwest::get(format!(
        "{server_url}/status?target=deployment&name=web&namespace={NAMESPACE}"
    ))
    .await?;
    assert_eq!(response.status(), 200);
    let tiers: Value = response.json().await?;
    assert_eq!(tiers[0][0]["title"], "deployment");
    assert_eq!(tiers[0][1]["name"], "web");
    assert_eq!(tiers[1][0]["title"], "pods");
    assert_eq!(tiers[1].as_array().map(Vec::len), Some(2));
    assert_eq!(attribute(&tiers[1][1], "STATUS"), Some("Online"));

    // directory: main.yaml first, deleted resources reported in place
    let tables: Value = reqwest::get(format!("{server_url}/status?target=app"))
        .await?
        .json()
        .await?;
    assert_eq!(tables[0][0][0]["title"], "main");
    let services = &tables[1];
    assert_eq!(services[0]["title"], "svc");
    assert_eq!(services[1]["name"], "web-svc");
    assert_eq!(services[2]["name"], "gone");
    assert_eq!(attribute(&services[2], "STATUS"), Some("Offline"));

    // raw kind listing
    let raw: Value = reqwest::get(format!(
        "{server_url}/status?target=pods&namespace={NAMESPACE}&raw=true"
    ))
    .await?
    .json()
    .await?;
    let pods = raw.as_array().cloned().unwrap_or_default();
    assert_eq!(pods.len(), 1);
    assert_eq!(pods[0]["kind"], "Pod");
    assert_eq!(pods[0]["metadata"]["labels"]["app"], "web");

    let unknown = reqwest::get(format!("{server_url}/status?target=notakind")).await?;
    assert_eq!(unknown.status(), 404);

    let current = reqwest::get(format!("{server_url}/status")).await?;
    assert_eq!(current.status(), 200);

    resources.cleanup().await?;
    Ok(())
}
