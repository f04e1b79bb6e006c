//! YAML 应用历史数据访问

use crate::{error::AppError, models::k8s::*};
use async_trait::async_trait;
use sqlx::PgPool;

/// 历史存储
#[async_trait]
pub trait YamlHistoryStore: Send + Sync {
    async fn create(&self, entry: &NewYamlHistory) -> Result<K8sYamlHistory, AppError>;

    /// 按时间倒序，同一时刻按写入顺序倒序
    async fn list(&self, key: &YamlHistoryKey, limit: i64) -> Result<Vec<K8sYamlHistory>, AppError>;

    /// 只保留最新的 keep 条，返回删除条数
    async fn trim(&self, key: &YamlHistoryKey, keep: i64) -> Result<u64, AppError>;
}

pub struct PgYamlHistoryStore {
    db: PgPool,
}

impl PgYamlHistoryStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl YamlHistoryStore for PgYamlHistoryStore {
    async fn create(&self, entry: &NewYamlHistory) -> Result<K8sYamlHistory, AppError> {
        let history = sqlx::query_as::<_, K8sYamlHistory>(
            r#"
            INSERT INTO k8s_yaml_histories
                (cluster_id, kind, namespace, name, yaml, action, created_by, username)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(entry.cluster_id)
        .bind(&entry.kind)
        .bind(&entry.namespace)
        .bind(&entry.name)
        .bind(&entry.yaml)
        .bind(&entry.action)
        .bind(entry.created_by)
        .bind(&entry.username)
        .fetch_one(&self.db)
        .await?;

        Ok(history)
    }

    async fn list(&self, key: &YamlHistoryKey, limit: i64) -> Result<Vec<K8sYamlHistory>, AppError> {
        let rows = sqlx::query_as::<_, K8sYamlHistory>(
            r#"
            SELECT * FROM k8s_yaml_histories
            WHERE cluster_id = $1 AND kind = $2 AND namespace = $3 AND name = $4
            ORDER BY created_at DESC, seq DESC
            LIMIT $5
            "#,
        )
        .bind(key.cluster_id)
        .bind(&key.kind)
        .bind(&key.namespace)
        .bind(&key.name)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    async fn trim(&self, key: &YamlHistoryKey, keep: i64) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            DELETE FROM k8s_yaml_histories
            WHERE id IN (
                SELECT id FROM k8s_yaml_histories
                WHERE cluster_id = $1 AND kind = $2 AND namespace = $3 AND name = $4
                ORDER BY created_at DESC, seq DESC
                OFFSET $5
            )
            "#,
        )
        .bind(key.cluster_id)
        .bind(&key.kind)
        .bind(&key.namespace)
        .bind(&key.name)
        .bind(keep)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }
}
