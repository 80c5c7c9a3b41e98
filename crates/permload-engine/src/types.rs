//! Run reports.

use serde::Serialize;

/// What one environment builder produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub orgs: usize,
    pub spaces: usize,
    pub apps: usize,
    pub users: usize,
    #[serde(rename = "roleAssignments")]
    pub role_assignments: usize,
    /// Units (org subtrees or users) that failed under the isolate policy.
    #[serde(rename = "failedUnits")]
    pub failed_units: usize,
}

/// Both environments of a seeding run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    #[serde(rename = "testEnvironment")]
    pub test_environment: BuildReport,
    #[serde(rename = "externalEnvironment")]
    pub external_environment: BuildReport,
    /// Backoff retries scheduled across the whole run.
    #[serde(rename = "retryEvents")]
    pub retry_events: u64,
}

impl RunReport {
    pub fn failed_units(&self) -> usize {
        self.test_environment.failed_units + self.external_environment.failed_units
    }
}
