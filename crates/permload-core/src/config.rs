//! Run configuration: file loading, defaults and validation.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::distribution::DistributionTable;
use crate::error::{Error, Result};

pub const DEFAULT_WORKER_CONCURRENCY: usize = 12;
pub const MAX_WORKER_CONCURRENCY: usize = 1024;
pub const DEFAULT_TIMEOUT_SECS: u64 = 3;
pub const DEFAULT_PROGRESS_INTERVAL_SECS: u64 = 10;

/// Top-level run configuration (persisted as JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    pub cloud_controller: CloudControllerConfig,
    pub test_data: TestDataConfig,
}

/// Where the platform API lives and how to authenticate against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudControllerConfig {
    pub url: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub skip_ssl_validation: bool,
    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Shape and pacing of the generated data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestDataConfig {
    pub apps_per_space_count: usize,
    pub spaces_per_org_count: usize,
    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,
    /// Seed for the sampler and window selector. Drawn from entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    #[serde(default = "default_progress_interval_secs")]
    pub progress_interval_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
    pub test_environment: TestEnvironmentConfig,
    pub external_environment: ExternalEnvironmentConfig,
}

/// The known user and the hierarchy it is granted access to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestEnvironmentConfig {
    pub user_guid: String,
    pub org_count: usize,
}

/// The synthetic user population.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalEnvironmentConfig {
    pub org_count: usize,
    pub user_count: usize,
    /// List already-created `perm-external-*` orgs and spaces instead of
    /// creating the hierarchy.
    #[serde(default)]
    pub reuse_existing: bool,
    pub user_org_distribution: DistributionTable,
    pub user_space_distribution: DistributionTable,
}

/// What happens to the rest of a run when one unit of work fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Cancel every sibling task and fail the run.
    #[default]
    AbortAll,
    /// Log and count the failure, keep going.
    Isolate,
}

/// Exponential backoff parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_initial_interval_ms")]
    pub initial_interval_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_randomization_factor")]
    pub randomization_factor: f64,
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,
    /// `null` removes the elapsed-time cap.
    #[serde(default = "default_max_elapsed_secs")]
    pub max_elapsed_secs: Option<u64>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: default_initial_interval_ms(),
            multiplier: default_multiplier(),
            randomization_factor: default_randomization_factor(),
            max_interval_ms: default_max_interval_ms(),
            max_elapsed_secs: default_max_elapsed_secs(),
            max_attempts: None,
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}
fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}
fn default_worker_concurrency() -> usize {
    DEFAULT_WORKER_CONCURRENCY
}
fn default_progress_interval_secs() -> u64 {
    DEFAULT_PROGRESS_INTERVAL_SECS
}
fn default_initial_interval_ms() -> u64 {
    500
}
fn default_multiplier() -> f64 {
    1.5
}
fn default_randomization_factor() -> f64 {
    0.5
}
fn default_max_interval_ms() -> u64 {
    60_000
}
fn default_max_elapsed_secs() -> Option<u64> {
    Some(15 * 60)
}

impl RunConfig {
    /// Read and parse a config file. Does not validate.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: RunConfig = serde_json::from_str(&contents)?;
        info!("Loaded run config from {}", path.display());
        Ok(config)
    }

    /// Reject configurations the engine cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.cloud_controller.url.trim().is_empty() {
            return Err(Error::Config("cloud_controller.url is empty".into()));
        }
        self.test_data.validate()
    }
}

impl TestDataConfig {
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_WORKER_CONCURRENCY).contains(&self.worker_concurrency) {
            return Err(Error::Validation(format!(
                "worker_concurrency must be within [1, {MAX_WORKER_CONCURRENCY}]"
            )));
        }
        if self.test_environment.user_guid.trim().is_empty() {
            return Err(Error::Validation(
                "test_environment.user_guid is empty".into(),
            ));
        }
        self.retry.validate()?;

        let external = &self.external_environment;
        external
            .user_org_distribution
            .validate("user_org_distribution", external.org_count)?;
        external.user_space_distribution.validate(
            "user_space_distribution",
            external.org_count.saturating_mul(self.spaces_per_org_count),
        )?;

        // No external user may see more than the known test user.
        let test_orgs = self.test_environment.org_count;
        let test_spaces = test_orgs.saturating_mul(self.spaces_per_org_count);
        if external.user_org_distribution.max_count() > test_orgs {
            return Err(Error::Validation(format!(
                "user_org_distribution: external users may not see more than the test user's {test_orgs} orgs"
            )));
        }
        if external.user_space_distribution.max_count() > test_spaces {
            return Err(Error::Validation(format!(
                "user_space_distribution: external users may not see more than the test user's {test_spaces} spaces"
            )));
        }
        Ok(())
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(Error::Validation(
                "retry.multiplier must be a finite number >= 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.randomization_factor) {
            return Err(Error::Validation(
                "retry.randomization_factor must be within [0, 1]".into(),
            ));
        }
        if self.max_attempts == Some(0) {
            return Err(Error::Validation("retry.max_attempts must be >= 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "log_level": "debug",
        "cloud_controller": {
            "url": "https://api.example.com",
            "client_id": "loader",
            "client_secret": "secret"
        },
        "test_data": {
            "apps_per_space_count": 1,
            "spaces_per_org_count": 2,
            "test_environment": { "user_guid": "known-user", "org_count": 3 },
            "external_environment": {
                "org_count": 10,
                "user_count": 100,
                "user_org_distribution": [
                    { "percent_users": 0.2, "num_orgs": 3 },
                    { "percent_users": 0.8, "num_orgs": 1 }
                ],
                "user_space_distribution": [
                    { "percent_users": 1.0, "num_spaces": 2 }
                ]
            }
        }
    }"#;

    fn sample() -> RunConfig {
        serde_json::from_str(SAMPLE).unwrap()
    }

    #[test]
    fn test_defaults_applied() {
        let config = sample();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.cloud_controller.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert!(!config.cloud_controller.skip_ssl_validation);
        assert_eq!(config.test_data.worker_concurrency, 12);
        assert_eq!(config.test_data.failure_policy, FailurePolicy::AbortAll);
        assert_eq!(config.test_data.retry.max_elapsed_secs, Some(900));
        assert_eq!(config.test_data.retry.max_attempts, None);
        assert!(!config.test_data.external_environment.reuse_existing);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loaddata.json");
        std::fs::write(&path, SAMPLE).unwrap();
        let config = RunConfig::load(&path).unwrap();
        assert_eq!(config.test_data.test_environment.org_count, 3);
        assert_eq!(
            config
                .test_data
                .external_environment
                .user_org_distribution
                .buckets()
                .len(),
            2
        );
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = RunConfig::load(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_space_distribution_bounded_by_pool() {
        let mut config = sample();
        // 10 orgs * 2 spaces = 20 spaces
        config.test_data.external_environment.user_space_distribution =
            DistributionTable::from_pairs(&[(1.0, 21)]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = sample();
        config.test_data.worker_concurrency = 0;
        assert!(matches!(config.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_oversized_worker_pool_rejected() {
        let mut config = sample();
        config.test_data.worker_concurrency = usize::MAX;
        assert!(matches!(config.validate(), Err(Error::Validation(_))));

        config.test_data.worker_concurrency = MAX_WORKER_CONCURRENCY;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_org_distribution_bounded_by_test_user() {
        let mut config = sample();
        // Fits the 10 external orgs but exceeds the test user's 3.
        config.test_data.external_environment.user_org_distribution =
            DistributionTable::from_pairs(&[(0.2, 5), (0.8, 1)]);
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::Validation(ref msg) if msg.contains("user_org_distribution")));
    }

    #[test]
    fn test_space_distribution_bounded_by_test_user() {
        let mut config = sample();
        // 3 test orgs * 2 spaces = 6; the external pool holds 20.
        config.test_data.external_environment.user_space_distribution =
            DistributionTable::from_pairs(&[(1.0, 7)]);
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::Validation(ref msg) if msg.contains("user_space_distribution")));

        config.test_data.external_environment.user_space_distribution =
            DistributionTable::from_pairs(&[(1.0, 6)]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_non_finite_multiplier_rejected() {
        let mut retry: RetryConfig = serde_json::from_str("{}").unwrap();
        retry.multiplier = f64::INFINITY;
        assert!(retry.validate().is_err());
        retry.multiplier = f64::NAN;
        assert!(retry.validate().is_err());
    }

    #[test]
    fn test_failure_policy_parses() {
        let policy: FailurePolicy = serde_json::from_str("\"isolate\"").unwrap();
        assert_eq!(policy, FailurePolicy::Isolate);
    }

    #[test]
    fn test_unbounded_elapsed() {
        let retry: RetryConfig = serde_json::from_str(r#"{"max_elapsed_secs": null}"#).unwrap();
        assert_eq!(retry.max_elapsed_secs, None);
        assert_eq!(retry.initial_interval_ms, 500);
    }
}
