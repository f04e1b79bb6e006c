//! 用户权限缓存
//! 按用户缓存已解析的权限码，TTL 在构造时确定

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use uuid::Uuid;

struct CachedPermissions {
    codes: HashMap<String, bool>,
    expires_at: Instant,
}

/// 进程内权限缓存
///
/// 读走读锁，填充与失效走写锁。锁中毒时继续使用内部数据。
pub struct PermissionCache {
    entries: RwLock<HashMap<Uuid, CachedPermissions>>,
    ttl: Duration,
}

impl PermissionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// 查询缓存
    ///
    /// 无条目或已过期返回 None；条目有效但不含该权限码返回 Some(false)。
    pub fn get(&self, user_id: Uuid, code: &str) -> Option<bool> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let cached = entries.get(&user_id)?;
        if Instant::now() >= cached.expires_at {
            return None;
        }
        Some(cached.codes.get(code).copied().unwrap_or(false))
    }

    /// 整体替换用户的权限表并重置过期时间
    pub fn set(&self, user_id: Uuid, codes: HashMap<String, bool>) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            user_id,
            CachedPermissions {
                codes,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    pub fn invalidate(&self, user_id: Uuid) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if entries.remove(&user_id).is_some() {
            tracing::debug!(user_id = %user_id, "Permission cache invalidated");
        }
    }

    pub fn invalidate_all(&self) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let count = entries.len();
        entries.clear();
        tracing::debug!(entries = count, "Permission cache cleared");
    }

    /// 当前条目数（含已过期未清理的）
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PermissionCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}
