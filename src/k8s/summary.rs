//! 集群浏览用的资源摘要

use crate::models::k8s::{NamespaceSummary, NodeConditionSummary, NodeSummary, WorkloadSummary};
use k8s_openapi::{
    api::{
        apps::v1::Deployment,
        core::v1::{Container, Namespace, Node, Pod, Service},
    },
    apimachinery::pkg::{api::resource::Quantity, apis::meta::v1::ObjectMeta},
};
use std::collections::BTreeMap;

const NODE_ROLE_PREFIX: &str = "node-role.kubernetes.io/";

fn created_at(meta: &ObjectMeta) -> Option<chrono::DateTime<chrono::Utc>> {
    meta.creation_timestamp.as_ref().map(|t| t.0)
}

fn quantity(resources: Option<&BTreeMap<String, Quantity>>, key: &str) -> Option<String> {
    resources.and_then(|r| r.get(key)).map(|q| q.0.clone())
}

fn images(containers: &[Container]) -> Vec<String> {
    containers.iter().filter_map(|c| c.image.clone()).collect()
}

pub fn node_summary(node: &Node) -> NodeSummary {
    let mut roles: Vec<String> = node
        .metadata
        .labels
        .iter()
        .flatten()
        .filter_map(|(label, _)| label.strip_prefix(NODE_ROLE_PREFIX))
        .filter(|role| !role.is_empty())
        .map(str::to_string)
        .collect();
    if roles.is_empty() {
        roles.push("worker".to_string());
    }

    let mut summary = NodeSummary {
        name: node.metadata.name.clone().unwrap_or_default(),
        status: "NotReady".to_string(),
        roles,
        created_at: created_at(&node.metadata),
        ..Default::default()
    };

    let Some(status) = node.status.as_ref() else {
        return summary;
    };

    if let Some(info) = status.node_info.as_ref() {
        summary.os_image = info.os_image.clone();
        summary.kernel_version = info.kernel_version.clone();
        summary.container_runtime = info.container_runtime_version.clone();
        summary.kubelet_version = info.kubelet_version.clone();
    }

    summary.cpu_capacity = quantity(status.capacity.as_ref(), "cpu");
    summary.cpu_allocatable = quantity(status.allocatable.as_ref(), "cpu");
    summary.memory_capacity = quantity(status.capacity.as_ref(), "memory");
    summary.memory_allocatable = quantity(status.allocatable.as_ref(), "memory");
    summary.pod_capacity = quantity(status.capacity.as_ref(), "pods");

    for address in status.addresses.iter().flatten() {
        match address.type_.as_str() {
            "InternalIP" => summary.internal_ip = Some(address.address.clone()),
            "ExternalIP" => summary.external_ip = Some(address.address.clone()),
            _ => {}
        }
    }

    for condition in status.conditions.iter().flatten() {
        if condition.type_ == "Ready" && condition.status == "True" {
            summary.status = "Ready".to_string();
        }
        summary.conditions.push(NodeConditionSummary {
            condition_type: condition.type_.clone(),
            status: condition.status.clone(),
            message: condition.message.clone(),
        });
    }

    summary
}

pub fn namespace_summary(namespace: &Namespace) -> NamespaceSummary {
    NamespaceSummary {
        name: namespace.metadata.name.clone().unwrap_or_default(),
        status: namespace
            .status
            .as_ref()
            .and_then(|s| s.phase.clone())
            .unwrap_or_default(),
        labels: namespace.metadata.labels.clone().unwrap_or_default(),
        created_at: created_at(&namespace.metadata),
    }
}

/// 就绪副本为 0 记为 NotReady，未全部就绪记为 Progressing
pub fn deployment_summary(deployment: &Deployment) -> WorkloadSummary {
    let spec = deployment.spec.as_ref();
    // 未声明副本数时 apiserver 默认为 1
    let replicas = spec.and_then(|s| s.replicas).unwrap_or(1);
    let ready = deployment
        .status
        .as_ref()
        .and_then(|s| s.ready_replicas)
        .unwrap_or(0);

    let status = if ready == 0 && replicas > 0 {
        "NotReady"
    } else if ready < replicas {
        "Progressing"
    } else {
        "Running"
    };

    WorkloadSummary {
        name: deployment.metadata.name.clone().unwrap_or_default(),
        namespace: deployment.metadata.namespace.clone().unwrap_or_default(),
        kind: "Deployment".to_string(),
        replicas: Some(replicas),
        ready: Some(ready),
        status: status.to_string(),
        images: spec
            .and_then(|s| s.template.spec.as_ref())
            .map(|pod| images(&pod.containers))
            .unwrap_or_default(),
        created_at: created_at(&deployment.metadata),
    }
}

pub fn pod_summary(pod: &Pod) -> WorkloadSummary {
    WorkloadSummary {
        name: pod.metadata.name.clone().unwrap_or_default(),
        namespace: pod.metadata.namespace.clone().unwrap_or_default(),
        kind: "Pod".to_string(),
        status: pod
            .status
            .as_ref()
            .and_then(|s| s.phase.clone())
            .unwrap_or_else(|| "Unknown".to_string()),
        images: pod
            .spec
            .as_ref()
            .map(|s| images(&s.containers))
            .unwrap_or_default(),
        created_at: created_at(&pod.metadata),
        ..Default::default()
    }
}

pub fn service_summary(service: &Service) -> WorkloadSummary {
    WorkloadSummary {
        name: service.metadata.name.clone().unwrap_or_default(),
        namespace: service.metadata.namespace.clone().unwrap_or_default(),
        kind: "Service".to_string(),
        status: service
            .spec
            .as_ref()
            .and_then(|s| s.type_.clone())
            .unwrap_or_else(|| "ClusterIP".to_string()),
        created_at: created_at(&service.metadata),
        ..Default::default()
    }
}
