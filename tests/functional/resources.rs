use k8s_openapi::api::{
    apps::v1::{Deployment, DeploymentSpec},
    core::v1::{
        Container, Namespace, Pod, PodSpec, PodTemplateSpec, Service, ServicePort, ServiceSpec,
    },
};
use k8s_openapi::apimachinery::pkg::{
    apis::meta::v1::{LabelSelector, ObjectMeta},
    util::intstr::IntOrString,
};
use kube::{
    Api, Client,
    api::{DeleteParams, ListParams},
};
use std::collections::BTreeMap;

pub struct TestResources {
    pub client: Client,
    pub namespace: String,
}

fn app_labels(app: &str) -> BTreeMap<String, String> {
    BTreeMap::from([("app".to_string(), app.to_string())])
}

impl TestResources {
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            client,
            namespace: namespace.to_string(),
        }
    }

    pub async fn create_namespace(&self) -> Result<(), Box<dyn std::error::Error>> {
        let namespace = Namespace {
            metadata: ObjectMeta {
                name: Some(self.namespace.clone()),
                ..Default::default()
            },
            ..Default::default()
        };

        let namespaces: Api<Namespace> = Api::all(self.client.clone());

        match namespaces.create(&Default::default(), &namespace).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(ae)) if ae.code == 409 => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// A deployment labeled `app=<name>` whose pods carry the same label.
    pub async fn create_test_deployment(
        &self,
        name: &str,
        replicas: i32,
    ) -> Result<Deployment, Box<dyn std::error::Error>> {
        let labels = app_labels(name);

        let deployment = Deployment {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(self.namespace.clone()),
                labels: Some(labels.clone()),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                replicas: Some(replicas),
                selector: LabelSelector {
                    match_labels: Some(labels.clone()),
                    ..Default::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(labels),
                        ..Default::default()
                    }),
                    spec: Some(PodSpec {
                        containers: vec![Container {
                            name: "app".to_string(),
                            image: Some("busybox:latest".to_string()),
                            command: Some(vec!["sleep".to_string(), "3600".to_string()]),
                            ..Default::default()
                        }],
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        };

        let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), &self.namespace);
        Ok(deployments.create(&Default::default(), &deployment).await?)
    }

    /// A service without an `app` label, so it controls nothing.
    pub async fn create_test_service(
        &self,
        name: &str,
        app_selector: &str,
    ) -> Result<Service, Box<dyn std::error::Error>> {
        let service = Service {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(self.namespace.clone()),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                selector: Some(app_labels(app_selector)),
                ports: Some(vec![ServicePort {
                    port: 80,
                    target_port: Some(IntOrString::Int(80)),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        };

        let services: Api<Service> = Api::namespaced(self.client.clone(), &self.namespace);
        Ok(services.create(&Default::default(), &service).await?)
    }

    pub async fn wait_for_pods_ready(
        &self,
        label_selector: &str,
        expected_count: usize,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &self.namespace);

        for _ in 0..120 {
            let pod_list = pods
                .list(&ListParams::default().labels(label_selector))
                .await?;

            let running = pod_list
                .items
                .iter()
                .filter(|pod| {
                    pod.status
                        .as_ref()
                        .and_then(|s| s.phase.as_deref())
                        == Some("Running")
                })
                .count();

            if running == expected_count {
                return Ok(());
            }

            tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
        }

        Err(format!("expected {expected_count} running pods for {label_selector}").into())
    }

    pub async fn cleanup(&self) -> Result<(), Box<dyn std::error::Error>> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        match namespaces
            .delete(&self.namespace, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
