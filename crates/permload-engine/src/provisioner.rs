//! Idempotent resource creation on top of [`RemoteApi`].
//!
//! Every operation runs under the retry policy with the classifier for its
//! resource kind. Conflicts count as success: the existing resource is looked
//! up by name so callers always get a usable handle back.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use permload_core::{
    ApiError, AppHandle, Error, OrgHandle, Result, SpaceHandle, UserHandle,
};
use tracing::{debug, error, warn};

use crate::classify::{self, Classifier};
use crate::remote::RemoteApi;
use crate::retry::{retry_notify, RetryOutcome, RetryPolicy};

/// Cloneable handle; clones share the remote API and the retry counter.
#[derive(Clone)]
pub struct Provisioner {
    api: Arc<dyn RemoteApi>,
    policy: RetryPolicy,
    retry_events: Arc<AtomicU64>,
}

impl Provisioner {
    pub fn new(api: Arc<dyn RemoteApi>, policy: RetryPolicy) -> Self {
        Self {
            api,
            policy,
            retry_events: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Backoff retries scheduled so far across all clones.
    pub fn retry_events(&self) -> u64 {
        self.retry_events.load(Ordering::Relaxed)
    }

    async fn retry<T, F, Fut>(
        &self,
        operation: &'static str,
        classify: Classifier,
        op: F,
    ) -> Result<RetryOutcome<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, ApiError>>,
    {
        let events = &self.retry_events;
        let result = retry_notify(&self.policy, operation, classify, op, |err, delay: Duration| {
            events.fetch_add(1, Ordering::Relaxed);
            warn!(
                operation,
                backoff_ms = delay.as_millis() as u64,
                "{} failed, retrying: {}",
                operation,
                err
            );
        })
        .await;

        if let Err(e) = &result {
            error!(operation, "{} finally failed: {}", operation, e);
        }
        result
    }

    /// Retry with the default classifier and treat a conflict as an error.
    async fn retry_plain<T, F, Fut>(&self, operation: &'static str, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, ApiError>>,
    {
        match self.retry(operation, classify::default, op).await? {
            RetryOutcome::Done(value) => Ok(value),
            RetryOutcome::Conflict(err) => Err(Error::Api(err)),
        }
    }

    pub async fn create_org_if_absent(&self, name: &str) -> Result<OrgHandle> {
        debug!(org.name = name, "Creating org");
        match self
            .retry("create-org", classify::org_create, || self.api.create_org(name))
            .await?
        {
            RetryOutcome::Done(org) => Ok(org),
            RetryOutcome::Conflict(_) => {
                debug!(org.name = name, "Org already exists");
                self.retry_plain("find-org", || self.api.find_org(name))
                    .await?
                    .ok_or_else(|| Error::NotFound(format!("org {name} reported taken but not found")))
            }
        }
    }

    pub async fn create_space_if_absent(&self, name: &str, org_id: &str) -> Result<SpaceHandle> {
        debug!(space.name = name, org.guid = org_id, "Creating space");
        match self
            .retry("create-space", classify::space_create, || {
                self.api.create_space(name, org_id)
            })
            .await?
        {
            RetryOutcome::Done(space) => Ok(space),
            RetryOutcome::Conflict(_) => {
                debug!(space.name = name, "Space already exists");
                self.retry_plain("find-space", || self.api.find_space(name, org_id))
                    .await?
                    .ok_or_else(|| {
                        Error::NotFound(format!(
                            "space {name} in org {org_id} reported taken but not found"
                        ))
                    })
            }
        }
    }

    pub async fn create_app_if_absent(&self, name: &str, space_id: &str) -> Result<AppHandle> {
        debug!(app.name = name, space.guid = space_id, "Creating app");
        match self
            .retry("create-app", classify::app_create, || {
                self.api.create_app(name, space_id)
            })
            .await?
        {
            RetryOutcome::Done(app) => Ok(app),
            RetryOutcome::Conflict(_) => {
                debug!(app.name = name, "App already exists");
                self.retry_plain("find-app", || self.api.find_app(name, space_id))
                    .await?
                    .ok_or_else(|| {
                        Error::NotFound(format!(
                            "app {name} in space {space_id} reported taken but not found"
                        ))
                    })
            }
        }
    }

    /// Create a user with a caller-chosen id. An id that is already taken
    /// refers to the same user.
    pub async fn create_user(&self, id: &str) -> Result<UserHandle> {
        debug!(user.guid = id, "Creating user");
        match self
            .retry("create-user", classify::user_create, || self.api.create_user(id))
            .await?
        {
            RetryOutcome::Done(user) => Ok(user),
            RetryOutcome::Conflict(_) => {
                debug!(user.guid = id, "User already exists");
                Ok(UserHandle { id: id.to_string() })
            }
        }
    }

    pub async fn associate_user_with_org(&self, user_id: &str, org_id: &str) -> Result<()> {
        debug!(user.guid = user_id, org.guid = org_id, "Associating user with org");
        self.retry_plain("associate-user-with-org", || {
            self.api.associate_user_with_org(user_id, org_id)
        })
        .await
    }

    /// Grant the space developer role.
    pub async fn assign_space_role(&self, user_id: &str, space_id: &str) -> Result<()> {
        debug!(user.guid = user_id, space.guid = space_id, "Making user space developer");
        self.retry_plain("make-user-space-developer", || {
            self.api.assign_space_developer_role(user_id, space_id)
        })
        .await
    }

    /// Orgs whose name starts with `prefix`.
    pub async fn list_orgs(&self, prefix: &str) -> Result<Vec<OrgHandle>> {
        let orgs = self.retry_plain("list-orgs", || self.api.list_orgs()).await?;
        Ok(orgs
            .into_iter()
            .filter(|o| o.name.starts_with(prefix))
            .collect())
    }

    /// Spaces whose name starts with `prefix`.
    pub async fn list_spaces(&self, prefix: &str) -> Result<Vec<SpaceHandle>> {
        let spaces = self.retry_plain("list-spaces", || self.api.list_spaces()).await?;
        Ok(spaces
            .into_iter()
            .filter(|s| s.name.starts_with(prefix))
            .collect())
    }

    pub async fn count_orgs(&self) -> Result<usize> {
        self.retry_plain("count-orgs", || self.api.count_orgs()).await
    }

    pub async fn count_spaces(&self) -> Result<usize> {
        self.retry_plain("count-spaces", || self.api.count_spaces()).await
    }

    pub async fn count_users(&self) -> Result<usize> {
        self.retry_plain("count-users", || self.api.count_users()).await
    }
}
