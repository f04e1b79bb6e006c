//! Kubernetes cluster and YAML history models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;
use validator::Validate;

/// Cluster status codes
pub const CLUSTER_STATUS_DISABLED: i16 = 0;
pub const CLUSTER_STATUS_HEALTHY: i16 = 1;
pub const CLUSTER_STATUS_UNREACHABLE: i16 = 2;

/// Kubernetes cluster record
///
/// `kubeconfig` holds the encrypted blob and is never serialized.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Cluster {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub version: Option<String>,
    pub api_server: String,
    #[serde(skip_serializing, default)]
    pub kubeconfig: String,
    pub description: Option<String>,
    pub env_code: Option<String>,
    pub status: i16,
    pub node_count: i32,
    pub pod_count: i32,
    pub last_check_at: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Cluster row to insert (kubeconfig already encrypted)
#[derive(Debug, Clone)]
pub struct NewCluster {
    pub name: String,
    pub code: String,
    pub api_server: String,
    pub kubeconfig: String,
    pub env_code: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
    pub status: i16,
    pub node_count: i32,
    pub pod_count: i32,
    pub last_check_at: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
}

/// Cluster status refresh after a connection check
#[derive(Debug, Clone)]
pub struct ClusterStatusUpdate {
    pub status: i16,
    pub version: Option<String>,
    pub node_count: i32,
    pub pod_count: i32,
}

/// Create cluster request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateClusterRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 50))]
    pub code: String,
    #[validate(length(min = 1, max = 255))]
    pub api_server: String,
    #[validate(length(min = 1))]
    pub kubeconfig: String,
    pub env_code: Option<String>,
    pub description: Option<String>,
}

/// Update cluster request; the service encrypts `kubeconfig` before it reaches the store
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateClusterRequest {
    pub name: Option<String>,
    pub api_server: Option<String>,
    pub kubeconfig: Option<String>,
    pub env_code: Option<String>,
    pub description: Option<String>,
}

/// Cluster list query
#[derive(Debug, Deserialize)]
pub struct ClusterListQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    pub env_code: Option<String>,
    pub keyword: Option<String>,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    20
}

/// Live cluster summary returned by a connection test
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterOverview {
    pub version: String,
    pub node_count: i32,
    pub ready_nodes: i32,
    pub pod_count: i32,
    pub running_pods: i32,
    pub namespace_count: i32,
    pub deployment_count: i32,
    pub service_count: i32,
}

/// Node as shown in the cluster browser
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeSummary {
    pub name: String,
    /// "Ready" or "NotReady"
    pub status: String,
    pub roles: Vec<String>,
    pub internal_ip: Option<String>,
    pub external_ip: Option<String>,
    pub os_image: String,
    pub kernel_version: String,
    pub container_runtime: String,
    pub kubelet_version: String,
    pub cpu_capacity: Option<String>,
    pub cpu_allocatable: Option<String>,
    pub memory_capacity: Option<String>,
    pub memory_allocatable: Option<String>,
    pub pod_capacity: Option<String>,
    pub conditions: Vec<NodeConditionSummary>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConditionSummary {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: String,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NamespaceSummary {
    pub name: String,
    pub status: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub labels: BTreeMap<String, String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Kinds listed per namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadKind {
    Deployment,
    Pod,
    Service,
}

impl WorkloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadKind::Deployment => "Deployment",
            WorkloadKind::Pod => "Pod",
            WorkloadKind::Service => "Service",
        }
    }
}

/// Deployment, pod or service row
///
/// `status` is the rollout state for deployments, the phase for pods and
/// the service type for services.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkloadSummary {
    pub name: String,
    pub namespace: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready: Option<i32>,
    pub status: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub images: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Namespace filter of the workload listings; empty means all namespaces
#[derive(Debug, Default, Deserialize)]
pub struct NamespaceQuery {
    pub namespace: Option<String>,
}

/// Append-only record of a non-dry-run apply
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct K8sYamlHistory {
    pub id: Uuid,
    pub cluster_id: Uuid,
    pub kind: String,
    pub namespace: String,
    pub name: String,
    pub yaml: String,
    pub action: String,
    pub created_by: Option<Uuid>,
    pub username: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// History row to insert
#[derive(Debug, Clone)]
pub struct NewYamlHistory {
    pub cluster_id: Uuid,
    pub kind: String,
    pub namespace: String,
    pub name: String,
    pub yaml: String,
    pub action: String,
    pub created_by: Option<Uuid>,
    pub username: Option<String>,
}

/// Retention key of a history row
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct YamlHistoryKey {
    pub cluster_id: Uuid,
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

impl NewYamlHistory {
    pub fn key(&self) -> YamlHistoryKey {
        YamlHistoryKey {
            cluster_id: self.cluster_id,
            kind: self.kind.clone(),
            namespace: self.namespace.clone(),
            name: self.name.clone(),
        }
    }
}

/// Apply YAML request
#[derive(Debug, Deserialize, Validate)]
pub struct ApplyYamlRequest {
    #[validate(length(min = 1))]
    pub yaml: String,
    pub namespace: Option<String>,
    #[serde(default)]
    pub dry_run: bool,
    /// History label, defaults to "apply"
    pub action: Option<String>,
}

/// Format YAML request
#[derive(Debug, Deserialize, Validate)]
pub struct FormatYamlRequest {
    #[validate(length(min = 1))]
    pub yaml: String,
}

/// Resource YAML query
#[derive(Debug, Deserialize)]
pub struct ResourceYamlQuery {
    pub kind: String,
    pub name: String,
    pub namespace: Option<String>,
    pub api_version: Option<String>,
}

/// YAML history query
#[derive(Debug, Deserialize)]
pub struct YamlHistoryQuery {
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    pub limit: Option<i64>,
}

/// Outcome of one applied object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyAction {
    Applied,
    Validated,
}

/// Per-object apply result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyResult {
    pub kind: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub action: ApplyAction,
}
