//! Handles for resources created on the remote platform.

use serde::{Deserialize, Serialize};

/// Top-level tenant scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrgHandle {
    pub id: String,
    pub name: String,
}

/// Sub-scope within an organization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpaceHandle {
    pub id: String,
    pub name: String,
    pub org_id: String,
}

/// Deployable unit owned by exactly one space.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppHandle {
    pub id: String,
    pub name: String,
    pub space_id: String,
}

/// Synthetic identity created by the run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserHandle {
    pub id: String,
}

/// Scope a role is granted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    Org,
    Space,
}

/// Role granted to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Plain org membership.
    OrgUser,
    SpaceDeveloper,
}

/// A role grant issued against the platform. Never stored locally beyond
/// what a caller chooses to keep.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub user_id: String,
    pub scope: ScopeKind,
    pub scope_id: String,
    pub role: Role,
}

impl RoleAssignment {
    pub fn org_user(user_id: &str, org_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            scope: ScopeKind::Org,
            scope_id: org_id.to_string(),
            role: Role::OrgUser,
        }
    }

    pub fn space_developer(user_id: &str, space_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            scope: ScopeKind::Space,
            scope_id: space_id.to_string(),
            role: Role::SpaceDeveloper,
        }
    }
}

/// Naming scheme for generated resources. Stable names make re-runs hit
/// conflicts instead of creating duplicates.
pub mod names {
    pub const TEST_PREFIX: &str = "perm-test";
    pub const EXTERNAL_PREFIX: &str = "perm-external";

    pub fn org(prefix: &str, i: usize) -> String {
        format!("{prefix}-org-{i}")
    }

    pub fn space(prefix: &str, j: usize, i: usize) -> String {
        format!("{prefix}-space-{j}-in-org-{i}")
    }

    pub fn app(prefix: &str, k: usize, j: usize, i: usize) -> String {
        format!("{prefix}-app-{k}-in-space-{j}-in-org-{i}")
    }
}
