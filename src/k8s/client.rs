//! Kubernetes 客户端抽象
//! 应用引擎与集群服务只依赖 ResourceClient / ClusterConnector，测试中替换为内存实现

use crate::{
    error::AppError,
    k8s::{manifest::Manifest, mapper::ResourceMapping, summary},
    models::k8s::{ClusterOverview, NamespaceSummary, NodeSummary, WorkloadKind, WorkloadSummary},
};
use async_trait::async_trait;
use k8s_openapi::api::{
    apps::v1::Deployment,
    core::v1::{Namespace, Node, Pod, Service},
};
use kube::{
    api::{Api, DynamicObject, ListParams, Patch, PatchParams},
    config::{KubeConfigOptions, Kubeconfig},
    core::GroupVersionKind,
    discovery::{self, Discovery, Scope},
    Client, Config,
};
use std::sync::Arc;
use std::time::Duration;

/// 面向单个集群的资源操作
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// GVK → REST 资源与作用域
    async fn resolve(&self, gvk: &GroupVersionKind) -> Result<ResourceMapping, AppError>;

    /// 未给出 apiVersion 时按 kind 查找
    async fn find_kind(&self, kind: &str) -> Result<ResourceMapping, AppError>;

    async fn get(
        &self,
        mapping: &ResourceMapping,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Manifest, AppError>;

    /// Server-side apply（force）
    async fn apply(
        &self,
        mapping: &ResourceMapping,
        manifest: &Manifest,
        field_manager: &str,
        dry_run: bool,
    ) -> Result<Manifest, AppError>;

    /// 集群概览
    async fn overview(&self) -> Result<ClusterOverview, AppError>;

    async fn list_nodes(&self) -> Result<Vec<NodeSummary>, AppError>;

    async fn list_namespaces(&self) -> Result<Vec<NamespaceSummary>, AppError>;

    /// namespace 为 None 时列出全部命名空间
    async fn list_workloads(
        &self,
        kind: WorkloadKind,
        namespace: Option<&str>,
    ) -> Result<Vec<WorkloadSummary>, AppError>;
}

/// 由 kubeconfig 建立客户端
#[async_trait]
pub trait ClusterConnector: Send + Sync {
    async fn connect(&self, kubeconfig: &str) -> Result<Arc<dyn ResourceClient>, AppError>;
}

/// kube-rs 连接器
pub struct KubeConnector {
    timeout: Duration,
}

impl KubeConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ClusterConnector for KubeConnector {
    async fn connect(&self, kubeconfig: &str) -> Result<Arc<dyn ResourceClient>, AppError> {
        let kubeconfig = Kubeconfig::from_yaml(kubeconfig)
            .map_err(|e| AppError::BadRequest(format!("Invalid kubeconfig: {}", e)))?;

        let mut config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| AppError::BadRequest(format!("Invalid kubeconfig: {}", e)))?;
        config.connect_timeout = Some(self.timeout);
        config.read_timeout = Some(self.timeout);
        config.write_timeout = Some(self.timeout);

        let client = Client::try_from(config)?;
        Ok(Arc::new(KubeResourceClient::new(client)))
    }
}

pub struct KubeResourceClient {
    client: Client,
}

impl KubeResourceClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn dynamic_api(&self, mapping: &ResourceMapping, namespace: Option<&str>) -> Api<DynamicObject> {
        match (mapping.namespaced, namespace) {
            (true, Some(ns)) => Api::namespaced_with(self.client.clone(), ns, &mapping.resource),
            _ => Api::all_with(self.client.clone(), &mapping.resource),
        }
    }

    fn typed_api<K>(&self, namespace: Option<&str>) -> Api<K>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        <K as kube::Resource>::DynamicType: Default,
    {
        match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }
}

/// 发现阶段的 404 与缺失 kind 视为请求错误
fn map_discovery_error(e: kube::Error, what: &str) -> AppError {
    match e {
        kube::Error::Discovery(_) => AppError::BadRequest(format!("Unknown resource type: {}", what)),
        kube::Error::Api(ref resp) if resp.code == 404 => {
            AppError::BadRequest(format!("Unknown resource type: {}", what))
        }
        other => AppError::Kubernetes(other),
    }
}

fn to_manifest(object: DynamicObject) -> Result<Manifest, AppError> {
    let value = serde_json::to_value(object)
        .map_err(|e| AppError::Internal(format!("Failed to encode object: {}", e)))?;
    Manifest::from_value(value)
}

#[async_trait]
impl ResourceClient for KubeResourceClient {
    async fn resolve(&self, gvk: &GroupVersionKind) -> Result<ResourceMapping, AppError> {
        let (resource, caps) = discovery::pinned_kind(&self.client, gvk)
            .await
            .map_err(|e| map_discovery_error(e, &gvk.kind))?;

        Ok(ResourceMapping {
            resource,
            namespaced: caps.scope == Scope::Namespaced,
        })
    }

    async fn find_kind(&self, kind: &str) -> Result<ResourceMapping, AppError> {
        let discovery = Discovery::new(self.client.clone()).run().await?;

        for group in discovery.groups() {
            for (resource, caps) in group.recommended_resources() {
                if resource.kind == kind {
                    return Ok(ResourceMapping {
                        resource,
                        namespaced: caps.scope == Scope::Namespaced,
                    });
                }
            }
        }

        Err(AppError::BadRequest(format!("Unknown resource type: {}", kind)))
    }

    async fn get(
        &self,
        mapping: &ResourceMapping,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Manifest, AppError> {
        let api = self.dynamic_api(mapping, namespace);
        let object = api.get(name).await.map_err(|e| match e {
            kube::Error::Api(ref resp) if resp.code == 404 => {
                AppError::NotFound(format!("{} {}", mapping.kind(), name))
            }
            other => AppError::Kubernetes(other),
        })?;

        to_manifest(object)
    }

    async fn apply(
        &self,
        mapping: &ResourceMapping,
        manifest: &Manifest,
        field_manager: &str,
        dry_run: bool,
    ) -> Result<Manifest, AppError> {
        let name = manifest
            .name()
            .ok_or_else(|| AppError::Validation(format!("{} is missing metadata.name", manifest.describe())))?;

        let api = self.dynamic_api(mapping, manifest.namespace());
        let mut params = PatchParams::apply(field_manager).force();
        params.dry_run = dry_run;

        let applied = api
            .patch(name, &params, &Patch::Apply(manifest.as_map()))
            .await
            .map_err(|e| match e {
                // 422/400 等为对象本身的问题
                kube::Error::Api(ref resp) if resp.code < 500 && resp.code != 401 && resp.code != 403 => {
                    AppError::BadRequest(format!("{}: {}", manifest.describe(), resp.message))
                }
                other => AppError::Kubernetes(other),
            })?;

        to_manifest(applied)
    }

    async fn overview(&self) -> Result<ClusterOverview, AppError> {
        let version = self.client.apiserver_version().await?;
        let mut overview = ClusterOverview {
            version: version.git_version,
            ..Default::default()
        };
        let params = ListParams::default();

        // 版本之外的统计项失败时保持 0
        match Api::<Node>::all(self.client.clone()).list(&params).await {
            Ok(nodes) => {
                overview.node_count = nodes.items.len() as i32;
                overview.ready_nodes = nodes
                    .items
                    .iter()
                    .filter(|node| {
                        node.status
                            .as_ref()
                            .and_then(|s| s.conditions.as_ref())
                            .is_some_and(|conds| {
                                conds.iter().any(|c| c.type_ == "Ready" && c.status == "True")
                            })
                    })
                    .count() as i32;
            }
            Err(e) => tracing::warn!(error = %e, "Failed to list nodes"),
        }

        match Api::<Pod>::all(self.client.clone()).list(&params).await {
            Ok(pods) => {
                overview.pod_count = pods.items.len() as i32;
                overview.running_pods = pods
                    .items
                    .iter()
                    .filter(|pod| {
                        pod.status
                            .as_ref()
                            .and_then(|s| s.phase.as_deref())
                            == Some("Running")
                    })
                    .count() as i32;
            }
            Err(e) => tracing::warn!(error = %e, "Failed to list pods"),
        }

        match Api::<Namespace>::all(self.client.clone()).list(&params).await {
            Ok(namespaces) => overview.namespace_count = namespaces.items.len() as i32,
            Err(e) => tracing::warn!(error = %e, "Failed to list namespaces"),
        }

        match Api::<Deployment>::all(self.client.clone()).list(&params).await {
            Ok(deployments) => overview.deployment_count = deployments.items.len() as i32,
            Err(e) => tracing::warn!(error = %e, "Failed to list deployments"),
        }

        match Api::<Service>::all(self.client.clone()).list(&params).await {
            Ok(services) => overview.service_count = services.items.len() as i32,
            Err(e) => tracing::warn!(error = %e, "Failed to list services"),
        }

        Ok(overview)
    }

    async fn list_nodes(&self) -> Result<Vec<NodeSummary>, AppError> {
        let nodes = Api::<Node>::all(self.client.clone())
            .list(&ListParams::default())
            .await?;
        Ok(nodes.items.iter().map(summary::node_summary).collect())
    }

    async fn list_namespaces(&self) -> Result<Vec<NamespaceSummary>, AppError> {
        let namespaces = Api::<Namespace>::all(self.client.clone())
            .list(&ListParams::default())
            .await?;
        Ok(namespaces.items.iter().map(summary::namespace_summary).collect())
    }

    async fn list_workloads(
        &self,
        kind: WorkloadKind,
        namespace: Option<&str>,
    ) -> Result<Vec<WorkloadSummary>, AppError> {
        let params = ListParams::default();
        let items = match kind {
            WorkloadKind::Deployment => self
                .typed_api::<Deployment>(namespace)
                .list(&params)
                .await?
                .items
                .iter()
                .map(summary::deployment_summary)
                .collect(),
            WorkloadKind::Pod => self
                .typed_api::<Pod>(namespace)
                .list(&params)
                .await?
                .items
                .iter()
                .map(summary::pod_summary)
                .collect(),
            WorkloadKind::Service => self
                .typed_api::<Service>(namespace)
                .list(&params)
                .await?
                .items
                .iter()
                .map(summary::service_summary)
                .collect(),
        };
        Ok(items)
    }
}
