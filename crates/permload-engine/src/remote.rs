//! The remote platform as the engine sees it.

use async_trait::async_trait;
use permload_core::{ApiError, AppHandle, OrgHandle, SpaceHandle, UserHandle};

/// Result of a single remote call, before classification.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Black-box resource-creation service.
///
/// Implementations make exactly one attempt per call; retries and conflict
/// handling live in the provisioner.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn create_org(&self, name: &str) -> ApiResult<OrgHandle>;

    async fn create_space(&self, name: &str, org_id: &str) -> ApiResult<SpaceHandle>;

    async fn create_app(&self, name: &str, space_id: &str) -> ApiResult<AppHandle>;

    async fn create_user(&self, id: &str) -> ApiResult<UserHandle>;

    async fn associate_user_with_org(&self, user_id: &str, org_id: &str) -> ApiResult<()>;

    async fn assign_space_developer_role(&self, user_id: &str, space_id: &str) -> ApiResult<()>;

    /// Look up an org by exact name.
    async fn find_org(&self, name: &str) -> ApiResult<Option<OrgHandle>>;

    async fn find_space(&self, name: &str, org_id: &str) -> ApiResult<Option<SpaceHandle>>;

    async fn find_app(&self, name: &str, space_id: &str) -> ApiResult<Option<AppHandle>>;

    async fn list_orgs(&self) -> ApiResult<Vec<OrgHandle>>;

    async fn list_spaces(&self) -> ApiResult<Vec<SpaceHandle>>;

    // Progress reporting only.
    async fn count_orgs(&self) -> ApiResult<usize>;

    async fn count_spaces(&self) -> ApiResult<usize>;

    async fn count_users(&self) -> ApiResult<usize>;
}
