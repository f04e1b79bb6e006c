//! 集群服务
//! 集群记录维护、连接测试，以及绑定到已登记集群的 YAML 操作

use crate::{
    config::KubernetesConfig,
    error::AppError,
    k8s::{
        apply::DEFAULT_HISTORY_ACTION, ApplyContext, ClusterConnector, KubeconfigCipher,
        ResourceClient, YamlApplyEngine,
    },
    models::k8s::*,
    repository::{ClusterStore, YamlHistoryStore},
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// 操作人
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: Uuid,
    pub username: String,
}

pub struct ClusterService {
    store: Arc<dyn ClusterStore>,
    connector: Arc<dyn ClusterConnector>,
    cipher: KubeconfigCipher,
    engine: YamlApplyEngine,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl ClusterService {
    pub fn new(
        store: Arc<dyn ClusterStore>,
        history: Arc<dyn YamlHistoryStore>,
        connector: Arc<dyn ClusterConnector>,
        config: &KubernetesConfig,
    ) -> Self {
        Self {
            store,
            connector,
            cipher: KubeconfigCipher::new(&config.encryption_key),
            engine: YamlApplyEngine::new(history, &config.field_manager, config.history_retention),
        }
    }

    // ==================== 集群记录 ====================

    pub async fn create_cluster(
        &self,
        req: CreateClusterRequest,
        created_by: Uuid,
    ) -> Result<Cluster, AppError> {
        req.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        if self.store.find_by_code(&req.code).await?.is_some() {
            return Err(AppError::BadRequest("Cluster code already exists".to_string()));
        }

        let encrypted = self.cipher.encrypt(&req.kubeconfig)?;
        let mut cluster = NewCluster {
            name: req.name,
            code: req.code,
            api_server: req.api_server,
            kubeconfig: encrypted,
            env_code: non_empty(req.env_code),
            description: non_empty(req.description),
            version: None,
            status: CLUSTER_STATUS_HEALTHY,
            node_count: 0,
            pod_count: 0,
            last_check_at: None,
            created_by: Some(created_by),
        };

        // 连接失败不阻止登记
        match self.fetch_overview(&req.kubeconfig).await {
            Ok(overview) => {
                cluster.version = Some(overview.version);
                cluster.node_count = overview.node_count;
                cluster.pod_count = overview.pod_count;
                cluster.last_check_at = Some(Utc::now());
            }
            Err(e) => {
                tracing::warn!(code = %cluster.code, error = %e, "Cluster connection check failed");
                cluster.status = CLUSTER_STATUS_UNREACHABLE;
            }
        }

        let created = self.store.create(&cluster).await?;
        tracing::info!(cluster_id = %created.id, code = %created.code, status = created.status, "Cluster created");
        Ok(created)
    }

    async fn fetch_overview(&self, kubeconfig: &str) -> Result<ClusterOverview, AppError> {
        let client = self.connector.connect(kubeconfig).await?;
        client.overview().await
    }

    pub async fn update_cluster(&self, id: Uuid, req: UpdateClusterRequest) -> Result<Cluster, AppError> {
        let mut changes = UpdateClusterRequest {
            name: non_empty(req.name),
            api_server: non_empty(req.api_server),
            kubeconfig: None,
            env_code: non_empty(req.env_code),
            description: non_empty(req.description),
        };
        if let Some(kubeconfig) = non_empty(req.kubeconfig) {
            changes.kubeconfig = Some(self.cipher.encrypt(&kubeconfig)?);
        }

        let cluster = self
            .store
            .update(id, &changes)
            .await?
            .ok_or_else(|| AppError::not_found("Cluster not found"))?;

        tracing::info!(cluster_id = %id, "Cluster updated");
        Ok(cluster)
    }

    pub async fn delete_cluster(&self, id: Uuid) -> Result<(), AppError> {
        if !self.store.delete(id).await? {
            return Err(AppError::not_found("Cluster not found"));
        }
        tracing::info!(cluster_id = %id, "Cluster deleted");
        Ok(())
    }

    pub async fn get_cluster(&self, id: Uuid) -> Result<Cluster, AppError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("Cluster not found"))
    }

    pub async fn list_clusters(&self, query: ClusterListQuery) -> Result<(Vec<Cluster>, i64), AppError> {
        self.store.list(&query).await
    }

    /// 连接测试并回写状态
    pub async fn test_connection(&self, id: Uuid) -> Result<ClusterOverview, AppError> {
        let cluster = self.get_cluster(id).await?;
        let kubeconfig = self.cipher.decrypt(&cluster.kubeconfig)?;

        match self.fetch_overview(&kubeconfig).await {
            Ok(overview) => {
                self.store
                    .update_status(
                        id,
                        &ClusterStatusUpdate {
                            status: CLUSTER_STATUS_HEALTHY,
                            version: Some(overview.version.clone()),
                            node_count: overview.node_count,
                            pod_count: overview.pod_count,
                        },
                    )
                    .await?;
                Ok(overview)
            }
            Err(e) => {
                tracing::warn!(cluster_id = %id, error = %e, "Cluster connection test failed");
                self.store
                    .update_status(
                        id,
                        &ClusterStatusUpdate {
                            status: CLUSTER_STATUS_UNREACHABLE,
                            version: None,
                            node_count: 0,
                            pod_count: 0,
                        },
                    )
                    .await?;
                Err(e)
            }
        }
    }

    async fn client_for(&self, id: Uuid) -> Result<Arc<dyn ResourceClient>, AppError> {
        let cluster = self.get_cluster(id).await?;
        let kubeconfig = self.cipher.decrypt(&cluster.kubeconfig)?;
        self.connector.connect(&kubeconfig).await
    }

    // ==================== 集群浏览 ====================

    /// 实时概览，不回写集群状态
    pub async fn get_overview(&self, id: Uuid) -> Result<ClusterOverview, AppError> {
        self.client_for(id).await?.overview().await
    }

    pub async fn list_nodes(&self, id: Uuid) -> Result<Vec<NodeSummary>, AppError> {
        self.client_for(id).await?.list_nodes().await
    }

    pub async fn list_namespaces(&self, id: Uuid) -> Result<Vec<NamespaceSummary>, AppError> {
        self.client_for(id).await?.list_namespaces().await
    }

    pub async fn list_workloads(
        &self,
        id: Uuid,
        kind: WorkloadKind,
        namespace: Option<String>,
    ) -> Result<Vec<WorkloadSummary>, AppError> {
        let namespace = non_empty(namespace);
        self.client_for(id)
            .await?
            .list_workloads(kind, namespace.as_deref())
            .await
    }

    // ==================== YAML ====================

    pub async fn apply_yaml(
        &self,
        id: Uuid,
        req: ApplyYamlRequest,
        actor: &Actor,
    ) -> Result<Vec<ApplyResult>, AppError> {
        req.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let client = self.client_for(id).await?;
        let ctx = ApplyContext {
            cluster_id: id,
            actor_id: Some(actor.user_id),
            username: Some(actor.username.clone()),
            default_namespace: non_empty(req.namespace),
            dry_run: req.dry_run,
            action: non_empty(req.action).unwrap_or_else(|| DEFAULT_HISTORY_ACTION.to_string()),
        };

        self.engine.apply(client.as_ref(), &ctx, &req.yaml).await
    }

    pub fn format_yaml(&self, input: &str) -> Result<String, AppError> {
        YamlApplyEngine::format_yaml(input)
    }

    pub async fn get_resource_yaml(&self, id: Uuid, query: ResourceYamlQuery) -> Result<String, AppError> {
        let client = self.client_for(id).await?;
        self.engine.get_resource_yaml(client.as_ref(), &query).await
    }

    pub async fn list_yaml_history(
        &self,
        id: Uuid,
        query: YamlHistoryQuery,
    ) -> Result<Vec<K8sYamlHistory>, AppError> {
        let key = YamlHistoryKey {
            cluster_id: id,
            kind: query.kind,
            namespace: query.namespace,
            name: query.name,
        };
        self.engine.list_history(&key, query.limit).await
    }
}
