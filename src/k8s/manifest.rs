//! Kubernetes 清单
//! 文档保持为不透明的 JSON 对象，只通过字段路径访问器读写

use crate::error::AppError;
use kube::core::GroupVersionKind;
use serde::Deserialize;
use serde_json::{Map, Value};

/// 服务端维护、提交前需要剥离的 metadata 字段
const SERVER_MANAGED_METADATA: [&str; 6] = [
    "creationTimestamp",
    "resourceVersion",
    "uid",
    "generation",
    "selfLink",
    "managedFields",
];

/// 单个 Kubernetes 对象
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest(Map<String, Value>);

impl Manifest {
    pub fn from_value(value: Value) -> Result<Self, AppError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(AppError::Validation(format!(
                "expected a mapping, got {}",
                json_type(&other)
            ))),
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn api_version(&self) -> Option<&str> {
        non_empty(self.0.get("apiVersion"))
    }

    pub fn kind(&self) -> Option<&str> {
        non_empty(self.0.get("kind"))
    }

    fn metadata(&self) -> Option<&Map<String, Value>> {
        self.0.get("metadata").and_then(Value::as_object)
    }

    pub fn name(&self) -> Option<&str> {
        self.metadata().and_then(|m| non_empty(m.get("name")))
    }

    pub fn namespace(&self) -> Option<&str> {
        self.metadata().and_then(|m| non_empty(m.get("namespace")))
    }

    pub fn set_namespace(&mut self, namespace: &str) {
        let namespace = Value::String(namespace.to_string());
        let metadata = self
            .0
            .entry("metadata")
            .or_insert_with(|| Value::Object(Map::new()));
        match metadata {
            Value::Object(map) => {
                map.insert("namespace".to_string(), namespace);
            }
            other => {
                let mut map = Map::new();
                map.insert("namespace".to_string(), namespace);
                *other = Value::Object(map);
            }
        }
    }

    pub fn clear_namespace(&mut self) {
        if let Some(Value::Object(metadata)) = self.0.get_mut("metadata") {
            metadata.remove("namespace");
        }
    }

    /// 剥离 status 与服务端维护的 metadata 字段
    pub fn sanitize(&mut self) {
        self.0.remove("status");
        if let Some(Value::Object(metadata)) = self.0.get_mut("metadata") {
            for field in SERVER_MANAGED_METADATA {
                metadata.remove(field);
            }
        }
    }

    /// List 类型（kind 以 List 结尾且带 items 数组）
    pub fn is_list(&self) -> bool {
        self.kind().is_some_and(|k| k.ends_with("List"))
            && self.0.get("items").is_some_and(Value::is_array)
    }

    /// 由 apiVersion + kind 得到 GVK
    pub fn gvk(&self) -> Result<GroupVersionKind, AppError> {
        let api_version = self
            .api_version()
            .ok_or_else(|| AppError::Validation(format!("{} is missing apiVersion", self.describe())))?;
        let kind = self
            .kind()
            .ok_or_else(|| AppError::Validation(format!("{} is missing kind", self.describe())))?;

        let (group, version) = split_api_version(api_version);
        Ok(GroupVersionKind::gvk(group, version, kind))
    }

    /// 日志与错误信息中使用的 `Kind/name`
    pub fn describe(&self) -> String {
        format!(
            "{}/{}",
            self.kind().unwrap_or("<unknown kind>"),
            self.name().unwrap_or("<unnamed>")
        )
    }

    pub fn to_yaml(&self) -> Result<String, AppError> {
        serde_yaml::to_string(&self.0)
            .map_err(|e| AppError::Internal(format!("Failed to encode YAML: {}", e)))
    }
}

/// `apps/v1` → (`apps`, `v1`)，`v1` → (``, `v1`)
pub fn split_api_version(api_version: &str) -> (&str, &str) {
    match api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", api_version),
    }
}

fn non_empty(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

/// 以 `{` 或 `[` 开头的输入按连续 JSON 文档解码，失败时退回 YAML
fn decode_stream(input: &str) -> Result<Vec<Value>, AppError> {
    let trimmed = input.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        let documents: Result<Vec<Value>, _> = serde_json::Deserializer::from_str(trimmed)
            .into_iter::<Value>()
            .collect();
        match documents {
            Ok(documents) => return Ok(documents),
            Err(e) => tracing::debug!(error = %e, "Input is not a JSON stream, decoding as YAML"),
        }
    }

    serde_yaml::Deserializer::from_str(input)
        .enumerate()
        .map(|(index, document)| {
            Value::deserialize(document).map_err(|e| {
                AppError::Validation(format!("document {} is not valid YAML: {}", index + 1, e))
            })
        })
        .collect()
}

/// 解析多文档 YAML 或连续 JSON，跳过空文档并展开 List
pub fn parse_documents(input: &str) -> Result<Vec<Manifest>, AppError> {
    let mut manifests = Vec::new();

    for (index, value) in decode_stream(input)?.into_iter().enumerate() {
        if value.is_null() {
            continue;
        }
        let manifest = Manifest::from_value(value).map_err(|e| match e {
            AppError::Validation(msg) => {
                AppError::Validation(format!("document {}: {}", index + 1, msg))
            }
            other => other,
        })?;
        expand_into(manifest, &mut manifests)?;
    }

    Ok(manifests)
}

fn expand_into(manifest: Manifest, out: &mut Vec<Manifest>) -> Result<(), AppError> {
    let mut pending = vec![manifest];
    while let Some(next) = pending.pop() {
        if !next.is_list() {
            out.push(next);
            continue;
        }
        let kind = next.kind().unwrap_or_default().to_string();
        let items = match next.into_value() {
            Value::Object(mut map) => match map.remove("items") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };
        // 逆序入栈保持原顺序
        for item in items.into_iter().rev() {
            if item.is_null() {
                continue;
            }
            let item = Manifest::from_value(item)
                .map_err(|_| AppError::Validation(format!("{} contains a non-mapping item", kind)))?;
            pending.push(item);
        }
    }
    Ok(())
}
