//! In-memory platform: a `RemoteApi` with Cloud Controller conflict semantics.
//!
//! Backs the `dry-run` command and the engine's tests. Failures can be
//! scripted per operation, and an optional per-call latency makes concurrency
//! observable.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use permload_core::{ApiError, AppHandle, OrgHandle, Role, RoleAssignment, SpaceHandle, UserHandle};

use crate::classify;
use crate::remote::{ApiResult, RemoteApi};

/// Operation names accepted by [`InMemoryPlatform::fail_next`].
pub mod ops {
    pub const CREATE_ORG: &str = "create_org";
    pub const CREATE_SPACE: &str = "create_space";
    pub const CREATE_APP: &str = "create_app";
    pub const CREATE_USER: &str = "create_user";
    pub const ASSOCIATE_ORG_USER: &str = "associate_user_with_org";
    pub const SPACE_DEVELOPER: &str = "assign_space_developer_role";
    pub const FIND: &str = "find";
    pub const LIST: &str = "list";
    pub const COUNT: &str = "count";
}

#[derive(Default)]
struct PlatformState {
    orgs: Vec<OrgHandle>,
    spaces: Vec<SpaceHandle>,
    apps: Vec<AppHandle>,
    users: Vec<UserHandle>,
    grants: HashSet<RoleAssignment>,
    next_id: u64,
    scripted_failures: HashMap<&'static str, VecDeque<ApiError>>,
}

impl PlatformState {
    fn count_role(&self, role: Role) -> usize {
        self.grants.iter().filter(|g| g.role == role).count()
    }

    fn mint_id(&mut self, kind: &str) -> String {
        self.next_id += 1;
        format!("{kind}-{:08}", self.next_id)
    }
}

/// Snapshot of what the platform holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformSnapshot {
    pub orgs: Vec<OrgHandle>,
    pub spaces: Vec<SpaceHandle>,
    pub apps: Vec<AppHandle>,
    pub users: Vec<UserHandle>,
    pub org_users: usize,
    pub space_developers: usize,
}

pub struct InMemoryPlatform {
    state: Mutex<PlatformState>,
    latency: Option<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PlatformState::default()),
            latency: None,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Sleep this long inside every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make the next `times` calls of `op` fail with `err`.
    pub fn fail_next(&self, op: &'static str, times: usize, err: ApiError) {
        let mut state = self.state.lock();
        let queue = state.scripted_failures.entry(op).or_default();
        for _ in 0..times {
            queue.push_back(err.clone());
        }
    }

    /// Calls received so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of calls observed in flight at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> PlatformSnapshot {
        let state = self.state.lock();
        PlatformSnapshot {
            orgs: state.orgs.clone(),
            spaces: state.spaces.clone(),
            apps: state.apps.clone(),
            users: state.users.clone(),
            org_users: state.count_role(Role::OrgUser),
            space_developers: state.count_role(Role::SpaceDeveloper),
        }
    }

    pub fn is_org_user(&self, user_id: &str, org_id: &str) -> bool {
        self.state
            .lock()
            .grants
            .contains(&RoleAssignment::org_user(user_id, org_id))
    }

    pub fn is_space_developer(&self, user_id: &str, space_id: &str) -> bool {
        self.state
            .lock()
            .grants
            .contains(&RoleAssignment::space_developer(user_id, space_id))
    }

    /// Every grant held by `user_id`.
    pub fn grants_for(&self, user_id: &str) -> Vec<RoleAssignment> {
        self.state
            .lock()
            .grants
            .iter()
            .filter(|g| g.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Count the call, hold it in flight for the configured latency, then
    /// pop a scripted failure if one is queued.
    async fn enter(&self, op: &'static str) -> ApiResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let scripted = self
            .state
            .lock()
            .scripted_failures
            .get_mut(op)
            .and_then(VecDeque::pop_front);
        match scripted {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Default for InMemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteApi for InMemoryPlatform {
    async fn create_org(&self, name: &str) -> ApiResult<OrgHandle> {
        self.enter(ops::CREATE_ORG).await?;
        let mut state = self.state.lock();
        if state.orgs.iter().any(|o| o.name == name) {
            return Err(ApiError::status(
                400,
                classify::ORGANIZATION_NAME_TAKEN,
                format!("The organization name is taken: {name}"),
            ));
        }
        let org = OrgHandle {
            id: state.mint_id("org"),
            name: name.to_string(),
        };
        state.orgs.push(org.clone());
        Ok(org)
    }

    async fn create_space(&self, name: &str, org_id: &str) -> ApiResult<SpaceHandle> {
        self.enter(ops::CREATE_SPACE).await?;
        let mut state = self.state.lock();
        if !state.orgs.iter().any(|o| o.id == org_id) {
            return Err(ApiError::status(
                400,
                "CF-OrganizationNotFound",
                format!("The organization could not be found: {org_id}"),
            ));
        }
        if state
            .spaces
            .iter()
            .any(|s| s.name == name && s.org_id == org_id)
        {
            return Err(ApiError::status(
                400,
                classify::SPACE_NAME_TAKEN,
                format!("The space name is taken: {name}"),
            ));
        }
        let space = SpaceHandle {
            id: state.mint_id("space"),
            name: name.to_string(),
            org_id: org_id.to_string(),
        };
        state.spaces.push(space.clone());
        Ok(space)
    }

    async fn create_app(&self, name: &str, space_id: &str) -> ApiResult<AppHandle> {
        self.enter(ops::CREATE_APP).await?;
        let mut state = self.state.lock();
        if state
            .apps
            .iter()
            .any(|a| a.name == name && a.space_id == space_id)
        {
            return Err(ApiError::status(
                422,
                classify::UNPROCESSABLE_ENTITY,
                classify::APP_NAME_NOT_UNIQUE,
            ));
        }
        let app = AppHandle {
            id: state.mint_id("app"),
            name: name.to_string(),
            space_id: space_id.to_string(),
        };
        state.apps.push(app.clone());
        Ok(app)
    }

    async fn create_user(&self, id: &str) -> ApiResult<UserHandle> {
        self.enter(ops::CREATE_USER).await?;
        let mut state = self.state.lock();
        if state.users.iter().any(|u| u.id == id) {
            return Err(ApiError::status(
                400,
                classify::USER_ID_TAKEN,
                format!("The UAA ID is taken: {id}"),
            ));
        }
        let user = UserHandle { id: id.to_string() };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn associate_user_with_org(&self, user_id: &str, org_id: &str) -> ApiResult<()> {
        self.enter(ops::ASSOCIATE_ORG_USER).await?;
        self.state
            .lock()
            .grants
            .insert(RoleAssignment::org_user(user_id, org_id));
        Ok(())
    }

    async fn assign_space_developer_role(&self, user_id: &str, space_id: &str) -> ApiResult<()> {
        self.enter(ops::SPACE_DEVELOPER).await?;
        self.state
            .lock()
            .grants
            .insert(RoleAssignment::space_developer(user_id, space_id));
        Ok(())
    }

    async fn find_org(&self, name: &str) -> ApiResult<Option<OrgHandle>> {
        self.enter(ops::FIND).await?;
        Ok(self.state.lock().orgs.iter().find(|o| o.name == name).cloned())
    }

    async fn find_space(&self, name: &str, org_id: &str) -> ApiResult<Option<SpaceHandle>> {
        self.enter(ops::FIND).await?;
        Ok(self
            .state
            .lock()
            .spaces
            .iter()
            .find(|s| s.name == name && s.org_id == org_id)
            .cloned())
    }

    async fn find_app(&self, name: &str, space_id: &str) -> ApiResult<Option<AppHandle>> {
        self.enter(ops::FIND).await?;
        Ok(self
            .state
            .lock()
            .apps
            .iter()
            .find(|a| a.name == name && a.space_id == space_id)
            .cloned())
    }

    async fn list_orgs(&self) -> ApiResult<Vec<OrgHandle>> {
        self.enter(ops::LIST).await?;
        Ok(self.state.lock().orgs.clone())
    }

    async fn list_spaces(&self) -> ApiResult<Vec<SpaceHandle>> {
        self.enter(ops::LIST).await?;
        Ok(self.state.lock().spaces.clone())
    }

    async fn count_orgs(&self) -> ApiResult<usize> {
        self.enter(ops::COUNT).await?;
        Ok(self.state.lock().orgs.len())
    }

    async fn count_spaces(&self) -> ApiResult<usize> {
        self.enter(ops::COUNT).await?;
        Ok(self.state.lock().spaces.len())
    }

    async fn count_users(&self) -> ApiResult<usize> {
        self.enter(ops::COUNT).await?;
        Ok(self.state.lock().users.len())
    }
}
