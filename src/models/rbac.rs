//! Role, permission and group domain models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Role code that bypasses every permission gate
pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_OPERATOR: &str = "operator";
pub const ROLE_DEVELOP: &str = "develop";
pub const ROLE_VIEWER: &str = "viewer";

/// Wildcard accepted in resource permission action lists
pub const ACTION_WILDCARD: &str = "*";

/// Role
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Permission
///
/// `code` is the authorization currency and follows `<resource>:<action>`.
/// `path` + `method` map an API route template to this permission for the
/// path-derived gate; `method` may list several verbs separated by commas.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Permission {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub perm_type: String, // menu, button, api
    pub resource: Option<String>,
    pub action: Option<String>,
    pub parent_id: Option<Uuid>,
    pub path: Option<String>,
    pub method: Option<String>,
    pub sort: i32,
    pub status: i16, // 1: enabled, 0: disabled
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Permission {
    pub fn is_enabled(&self) -> bool {
        self.status == 1
    }

    /// Whether this permission is mapped to the given route template and verb
    pub fn matches_route(&self, path: &str, method: &str) -> bool {
        if !self.is_enabled() || self.path.as_deref() != Some(path) {
            return false;
        }
        match self.method.as_deref() {
            None | Some("") => true,
            Some(methods) => methods
                .split(',')
                .any(|m| m.trim().eq_ignore_ascii_case(method)),
        }
    }
}

/// User group (hierarchical through `parent_id`)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserGroup {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Resource-scoped grant
///
/// `resource_id = None` grants the actions on every instance of
/// `resource_type`. `actions` is stored as a JSON array; legacy rows hold a
/// comma-separated list. `conditions` is interpreted by callers only.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ResourcePermission {
    pub id: Uuid,
    pub role_id: Uuid,
    pub resource_type: String,
    pub resource_id: Option<Uuid>,
    pub actions: String,
    pub conditions: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResourcePermission {
    /// Parsed action list
    pub fn action_list(&self) -> Vec<String> {
        parse_actions(&self.actions)
    }

    /// Whether this row covers the requested instance and action
    pub fn grants(&self, resource_id: Option<Uuid>, action: &str) -> bool {
        let instance_matches = match self.resource_id {
            None => true,
            Some(scoped) => resource_id == Some(scoped),
        };
        instance_matches
            && self
                .action_list()
                .iter()
                .any(|a| a == action || a == ACTION_WILDCARD)
    }
}

/// Parse an action list stored either as a JSON array or comma-separated text
pub fn parse_actions(raw: &str) -> Vec<String> {
    match serde_json::from_str::<Vec<String>>(raw) {
        Ok(actions) => actions.into_iter().map(|a| a.trim().to_string()).collect(),
        Err(_) => raw
            .split(',')
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect(),
    }
}

/// Create permission request
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePermissionRequest {
    #[validate(length(min = 1, max = 50))]
    pub name: String,
    #[validate(length(min = 1, max = 100))]
    pub code: String,
    #[serde(rename = "type", default = "default_permission_type")]
    pub perm_type: String,
    pub resource: Option<String>,
    pub action: Option<String>,
    pub parent_id: Option<Uuid>,
    pub path: Option<String>,
    pub method: Option<String>,
    #[serde(default)]
    pub sort: i32,
}

fn default_permission_type() -> String {
    "api".to_string()
}

/// Update permission request
#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePermissionRequest {
    #[validate(length(min = 1, max = 50))]
    pub name: Option<String>,
    pub resource: Option<String>,
    pub action: Option<String>,
    pub parent_id: Option<Uuid>,
    pub path: Option<String>,
    pub method: Option<String>,
    pub sort: Option<i32>,
    pub status: Option<i16>,
}

/// Replace role permissions request
#[derive(Debug, Deserialize)]
pub struct UpdateRolePermissionsRequest {
    pub permission_ids: Vec<Uuid>,
}

/// Create resource permission request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateResourcePermissionRequest {
    pub role_id: Uuid,
    #[validate(length(min = 1, max = 50))]
    pub resource_type: String,
    pub resource_id: Option<Uuid>,
    #[validate(length(min = 1))]
    pub actions: Vec<String>,
    pub conditions: Option<serde_json::Value>,
}

/// Resource permission list filter
#[derive(Debug, Default, Deserialize)]
pub struct ResourcePermissionFilter {
    pub role_id: Option<Uuid>,
    pub resource_type: Option<String>,
}

/// Add group members request
#[derive(Debug, Deserialize)]
pub struct AddGroupMembersRequest {
    pub user_ids: Vec<Uuid>,
}

/// Replace group roles request
#[derive(Debug, Deserialize)]
pub struct SetGroupRolesRequest {
    pub role_ids: Vec<Uuid>,
}
