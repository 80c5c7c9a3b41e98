//! The randomized population: a larger hierarchy plus synthetic users whose
//! visibility into it is drawn from distribution tables.

use std::sync::Arc;

use permload_core::{
    names, DistributionTable, FailurePolicy, OrgHandle, Result, SpaceHandle, TestDataConfig,
};
use rand::Rng;
use tracing::{debug, info};
use uuid::Builder;

use super::{BuildCounters, UnitRunner};
use crate::collector::HandleCollector;
use crate::governor::Governor;
use crate::provisioner::Provisioner;
use crate::sampler::Sampler;
use crate::types::BuildReport;
use crate::window::select_window;

#[derive(Debug, Clone, PartialEq)]
pub struct PopulationEnvironment {
    pub org_count: usize,
    pub spaces_per_org: usize,
    pub apps_per_space: usize,
    pub user_count: usize,
    pub org_distribution: DistributionTable,
    pub space_distribution: DistributionTable,
    /// List existing orgs and spaces instead of creating them.
    pub reuse_existing: bool,
}

/// Frozen org and space pools, sorted by name.
struct Hierarchy {
    orgs: Vec<OrgHandle>,
    spaces: Vec<SpaceHandle>,
    failed_units: usize,
}

impl PopulationEnvironment {
    pub fn from_config(config: &TestDataConfig) -> Self {
        let external = &config.external_environment;
        Self {
            org_count: external.org_count,
            spaces_per_org: config.spaces_per_org_count,
            apps_per_space: config.apps_per_space_count,
            user_count: external.user_count,
            org_distribution: external.user_org_distribution.clone(),
            space_distribution: external.user_space_distribution.clone(),
            reuse_existing: external.reuse_existing,
        }
    }

    /// Build the hierarchy, then create users and grant each a sampled
    /// window of orgs and spaces.
    ///
    /// `rng` drives every sampling and window decision and the synthetic user
    /// ids, so a seeded source reproduces the same population.
    pub async fn create<R: Rng + Send>(
        &self,
        provisioner: &Provisioner,
        governor: &Governor,
        policy: FailurePolicy,
        rng: &mut R,
    ) -> Result<BuildReport> {
        info!(
            "Creating external environment: orgs={}, spaces_per_org={}, apps_per_space={}, users={}",
            self.org_count, self.spaces_per_org, self.apps_per_space, self.user_count
        );
        let counters = Arc::new(BuildCounters::default());

        let hierarchy = if self.reuse_existing {
            self.list_hierarchy(provisioner, &counters).await?
        } else {
            self.build_hierarchy(provisioner, governor, policy, &counters).await?
        };
        info!(
            "External hierarchy ready: {} orgs, {} spaces",
            hierarchy.orgs.len(),
            hierarchy.spaces.len()
        );

        let mut sampler = Sampler::new(rng);
        let mut runner = UnitRunner::new(governor.clone(), policy);
        for i in 0..self.user_count {
            let label = format!("external-user-{i}");

            let num_orgs = sampler.draw(&self.org_distribution);
            let orgs = match pick(sampler.rng_mut(), &hierarchy.orgs, num_orgs) {
                Ok(orgs) => orgs,
                Err(e) => {
                    if runner.fail(&label, e) {
                        continue;
                    }
                    break;
                }
            };

            let num_spaces = sampler.draw(&self.space_distribution);
            let spaces = match pick(sampler.rng_mut(), &hierarchy.spaces, num_spaces) {
                Ok(spaces) => spaces,
                Err(e) => {
                    if runner.fail(&label, e) {
                        continue;
                    }
                    break;
                }
            };

            let user_id = Builder::from_random_bytes(sampler.rng_mut().gen())
                .into_uuid()
                .to_string();
            debug!(
                user.guid = %user_id,
                "Planned {} org and {} space assignments",
                orgs.len(),
                spaces.len()
            );

            let unit = provision_user(provisioner.clone(), counters.clone(), user_id, orgs, spaces);
            if !runner.submit(label, unit).await {
                break;
            }
        }
        let failed = runner.finish().await?;

        let report = counters.report(hierarchy.failed_units + failed);
        info!(
            "External environment complete: {} users, {} role assignments, {} failed",
            report.users, report.role_assignments, report.failed_units
        );
        Ok(report)
    }

    async fn build_hierarchy(
        &self,
        provisioner: &Provisioner,
        governor: &Governor,
        policy: FailurePolicy,
        counters: &Arc<BuildCounters>,
    ) -> Result<Hierarchy> {
        let org_sink = Arc::new(HandleCollector::new());
        let space_sink = Arc::new(HandleCollector::new());

        let mut runner = UnitRunner::new(governor.clone(), policy);
        for i in 0..self.org_count {
            let unit = build_org(
                provisioner.clone(),
                counters.clone(),
                org_sink.clone(),
                space_sink.clone(),
                i,
                self.spaces_per_org,
                self.apps_per_space,
            );
            if !runner.submit(names::org(names::EXTERNAL_PREFIX, i), unit).await {
                break;
            }
        }
        let failed_units = runner.finish().await?;

        let mut orgs = org_sink.freeze()?;
        let mut spaces = space_sink.freeze()?;
        orgs.sort_by(|a, b| a.name.cmp(&b.name));
        spaces.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Hierarchy {
            orgs,
            spaces,
            failed_units,
        })
    }

    async fn list_hierarchy(
        &self,
        provisioner: &Provisioner,
        counters: &Arc<BuildCounters>,
    ) -> Result<Hierarchy> {
        let mut orgs = provisioner
            .list_orgs(&format!("{}-org-", names::EXTERNAL_PREFIX))
            .await?;
        let mut spaces = provisioner
            .list_spaces(&format!("{}-space-", names::EXTERNAL_PREFIX))
            .await?;
        orgs.sort_by(|a, b| a.name.cmp(&b.name));
        spaces.sort_by(|a, b| a.name.cmp(&b.name));

        BuildCounters::add(&counters.orgs, orgs.len());
        BuildCounters::add(&counters.spaces, spaces.len());
        Ok(Hierarchy {
            orgs,
            spaces,
            failed_units: 0,
        })
    }
}

/// Zero means the user sees none of the pool.
fn pick<T: Clone, R: Rng>(rng: &mut R, pool: &[T], count: usize) -> Result<Vec<T>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    Ok(select_window(rng, pool, count)?.to_vec())
}

async fn build_org(
    provisioner: Provisioner,
    counters: Arc<BuildCounters>,
    org_sink: Arc<HandleCollector<OrgHandle>>,
    space_sink: Arc<HandleCollector<SpaceHandle>>,
    i: usize,
    spaces_per_org: usize,
    apps_per_space: usize,
) -> Result<()> {
    let org = provisioner
        .create_org_if_absent(&names::org(names::EXTERNAL_PREFIX, i))
        .await?;
    BuildCounters::add(&counters.orgs, 1);
    org_sink.push(org.clone())?;

    for j in 0..spaces_per_org {
        let space = provisioner
            .create_space_if_absent(&names::space(names::EXTERNAL_PREFIX, j, i), &org.id)
            .await?;
        BuildCounters::add(&counters.spaces, 1);
        space_sink.push(space.clone())?;

        for k in 0..apps_per_space {
            provisioner
                .create_app_if_absent(&names::app(names::EXTERNAL_PREFIX, k, j, i), &space.id)
                .await?;
            BuildCounters::add(&counters.apps, 1);
        }
    }
    Ok(())
}

/// Create one user and grant its roles: spaces first (org membership plus
/// developer), then plain org membership. Strictly sequential.
async fn provision_user(
    provisioner: Provisioner,
    counters: Arc<BuildCounters>,
    user_id: String,
    orgs: Vec<OrgHandle>,
    spaces: Vec<SpaceHandle>,
) -> Result<()> {
    let user = provisioner.create_user(&user_id).await?;
    BuildCounters::add(&counters.users, 1);

    for space in &spaces {
        provisioner
            .associate_user_with_org(&user.id, &space.org_id)
            .await?;
        provisioner.assign_space_role(&user.id, &space.id).await?;
        BuildCounters::add(&counters.role_assignments, 2);
    }

    for org in &orgs {
        provisioner.associate_user_with_org(&user.id, &org.id).await?;
        BuildCounters::add(&counters.role_assignments, 1);
    }
    Ok(())
}
