//! Top-level run: validate the configuration, then build both environments
//! concurrently under one governor.

use std::time::Duration;

use permload_core::{Error, Result, TestDataConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{error, info};

use crate::environment::{FixedEnvironment, PopulationEnvironment};
use crate::governor::{CancelSignal, Governor};
use crate::progress::{report_progress, spawn_progress_reporter};
use crate::provisioner::Provisioner;
use crate::types::{BuildReport, RunReport};

pub struct Seeder {
    provisioner: Provisioner,
    cancel: CancelSignal,
}

impl Seeder {
    pub fn new(provisioner: Provisioner) -> Self {
        Self {
            provisioner,
            cancel: CancelSignal::new(),
        }
    }

    /// Signal that stops the run when cancelled (e.g. on Ctrl-C).
    pub fn cancel_signal(&self) -> CancelSignal {
        self.cancel.clone()
    }

    pub fn provisioner(&self) -> &Provisioner {
        &self.provisioner
    }

    /// Seed the platform as described by `config`.
    ///
    /// The configuration is validated before any remote call. Both environments
    /// share a governor of `worker_concurrency` slots, so the bound holds
    /// across the whole run.
    pub async fn run(&self, config: &TestDataConfig) -> Result<RunReport> {
        config.validate()?;

        let seed = config.seed.unwrap_or_else(rand::random);
        info!(
            seed,
            workers = config.worker_concurrency,
            policy = ?config.failure_policy,
            "Starting seeding run"
        );
        let mut rng = StdRng::seed_from_u64(seed);

        let governor = Governor::new(config.worker_concurrency, self.cancel.clone());
        let fixed = FixedEnvironment::from_config(config);
        let population = PopulationEnvironment::from_config(config);

        let stop_progress = CancelSignal::new();
        let reporter = (config.progress_interval_secs > 0).then(|| {
            spawn_progress_reporter(
                self.provisioner.clone(),
                Duration::from_secs(config.progress_interval_secs),
                stop_progress.clone(),
            )
        });

        let (test_environment, external_environment) = tokio::join!(
            fixed.create(&self.provisioner, &governor, config.failure_policy),
            population.create(
                &self.provisioner,
                &governor,
                config.failure_policy,
                &mut rng
            ),
        );

        stop_progress.cancel();
        if let Some(reporter) = reporter {
            // A panicked reporter only loses log lines.
            let _ = reporter.await;
        }

        let (test_environment, external_environment) =
            merge_results(test_environment, external_environment)?;
        report_progress(&self.provisioner).await;

        let report = RunReport {
            test_environment,
            external_environment,
            retry_events: self.provisioner.retry_events(),
        };
        info!(
            failed_units = report.failed_units(),
            retry_events = report.retry_events,
            "Seeding run complete"
        );
        Ok(report)
    }
}

/// Both builders must succeed. When both fail, the one that did not merely
/// observe the other's cancellation is the cause.
fn merge_results(
    test: Result<BuildReport>,
    external: Result<BuildReport>,
) -> Result<(BuildReport, BuildReport)> {
    match (test, external) {
        (Ok(t), Ok(e)) => Ok((t, e)),
        (Err(err), Ok(_)) | (Ok(_), Err(err)) => {
            error!("Seeding run failed: {}", err);
            Err(err)
        }
        (Err(Error::Cancelled), Err(err)) | (Err(err), Err(_)) => {
            error!("Seeding run failed: {}", err);
            Err(err)
        }
    }
}
