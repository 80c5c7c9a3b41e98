//! The known-user environment: one pre-specified user granted access to every
//! org and space created.

use std::sync::Arc;

use permload_core::{names, FailurePolicy, Result, TestDataConfig};
use tracing::{debug, info};

use super::{BuildCounters, UnitRunner};
use crate::governor::Governor;
use crate::provisioner::Provisioner;
use crate::types::BuildReport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedEnvironment {
    pub user_id: String,
    pub org_count: usize,
    pub spaces_per_org: usize,
    pub apps_per_space: usize,
}

impl FixedEnvironment {
    pub fn from_config(config: &TestDataConfig) -> Self {
        Self {
            user_id: config.test_environment.user_guid.clone(),
            org_count: config.test_environment.org_count,
            spaces_per_org: config.spaces_per_org_count,
            apps_per_space: config.apps_per_space_count,
        }
    }

    /// Create the user, then every org subtree concurrently under `governor`.
    pub async fn create(
        &self,
        provisioner: &Provisioner,
        governor: &Governor,
        policy: FailurePolicy,
    ) -> Result<BuildReport> {
        info!(
            "Creating test environment: orgs={}, spaces_per_org={}, apps_per_space={}",
            self.org_count, self.spaces_per_org, self.apps_per_space
        );

        let permit = governor.acquire().await?;
        let user = provisioner.create_user(&self.user_id).await?;
        permit.release();
        let counters = Arc::new(BuildCounters::default());
        BuildCounters::add(&counters.users, 1);

        let mut runner = UnitRunner::new(governor.clone(), policy);
        for i in 0..self.org_count {
            let unit = populate_org(
                provisioner.clone(),
                counters.clone(),
                user.id.clone(),
                i,
                self.spaces_per_org,
                self.apps_per_space,
            );
            if !runner.submit(names::org(names::TEST_PREFIX, i), unit).await {
                break;
            }
        }
        let failed = runner.finish().await?;

        let report = counters.report(failed);
        info!(
            "Test environment complete: {} orgs, {} spaces, {} apps, {} failed",
            report.orgs, report.spaces, report.apps, report.failed_units
        );
        Ok(report)
    }
}

/// One org subtree. Role grants for the user run in order within the
/// subtree.
async fn populate_org(
    provisioner: Provisioner,
    counters: Arc<BuildCounters>,
    user_id: String,
    i: usize,
    spaces_per_org: usize,
    apps_per_space: usize,
) -> Result<()> {
    let org = provisioner
        .create_org_if_absent(&names::org(names::TEST_PREFIX, i))
        .await?;
    BuildCounters::add(&counters.orgs, 1);

    provisioner.associate_user_with_org(&user_id, &org.id).await?;
    BuildCounters::add(&counters.role_assignments, 1);

    for j in 0..spaces_per_org {
        let space = provisioner
            .create_space_if_absent(&names::space(names::TEST_PREFIX, j, i), &org.id)
            .await?;
        BuildCounters::add(&counters.spaces, 1);

        provisioner.assign_space_role(&user_id, &space.id).await?;
        BuildCounters::add(&counters.role_assignments, 1);

        for k in 0..apps_per_space {
            provisioner
                .create_app_if_absent(&names::app(names::TEST_PREFIX, k, j, i), &space.id)
                .await?;
            BuildCounters::add(&counters.apps, 1);
        }
    }

    debug!(org.name = %org.name, "Org subtree complete");
    Ok(())
}
