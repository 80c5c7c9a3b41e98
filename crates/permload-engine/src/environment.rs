//! Environment builders and the unit runner they share.
//!
//! A unit is one org subtree or one user's role assignments. Each unit holds
//! a governor permit for its whole lifetime and reports a typed result; the
//! runner applies the failure policy to those results.

pub mod fixed;
pub mod population;

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

use permload_core::{Error, FailurePolicy, Result};
use tokio::task::{JoinError, JoinSet};
use tracing::{error, warn};

use crate::governor::Governor;
use crate::types::BuildReport;

pub use fixed::FixedEnvironment;
pub use population::PopulationEnvironment;

/// Resources a builder has seen through to completion. Shared by its units.
#[derive(Debug, Default)]
pub(crate) struct BuildCounters {
    pub orgs: AtomicUsize,
    pub spaces: AtomicUsize,
    pub apps: AtomicUsize,
    pub users: AtomicUsize,
    pub role_assignments: AtomicUsize,
}

impl BuildCounters {
    pub fn add(counter: &AtomicUsize, n: usize) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn report(&self, failed_units: usize) -> BuildReport {
        BuildReport {
            orgs: self.orgs.load(Ordering::Relaxed),
            spaces: self.spaces.load(Ordering::Relaxed),
            apps: self.apps.load(Ordering::Relaxed),
            users: self.users.load(Ordering::Relaxed),
            role_assignments: self.role_assignments.load(Ordering::Relaxed),
            failed_units,
        }
    }
}

type UnitResult = (String, Result<()>);

/// Spawns units under the governor and collects their results.
pub(crate) struct UnitRunner {
    governor: Governor,
    policy: FailurePolicy,
    tasks: JoinSet<UnitResult>,
    failed: usize,
    first_error: Option<Error>,
    interrupted: Option<Error>,
}

impl UnitRunner {
    pub fn new(governor: Governor, policy: FailurePolicy) -> Self {
        Self {
            governor,
            policy,
            tasks: JoinSet::new(),
            failed: 0,
            first_error: None,
            interrupted: None,
        }
    }

    /// Wait for a governor slot, then spawn `unit`.
    ///
    /// Returns false once no further units should be submitted: the run was
    /// cancelled or, under `AbortAll`, a unit has failed.
    pub async fn submit<F>(&mut self, label: String, unit: F) -> bool
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        self.reap();
        if self.first_error.is_some() {
            return false;
        }

        let permit = match self.governor.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                self.interrupted.get_or_insert(e);
                return false;
            }
        };

        let governor = self.governor.clone();
        let abort_on_failure = self.policy == FailurePolicy::AbortAll;
        self.tasks.spawn(async move {
            let result = unit.await;
            permit.release();
            if result.is_err() && abort_on_failure {
                governor.cancel();
            }
            (label, result)
        });
        true
    }

    /// Record a unit that failed before it could be spawned. Returns whether
    /// submission should continue.
    pub fn fail(&mut self, label: &str, err: Error) -> bool {
        self.record_failure(label, err);
        self.policy == FailurePolicy::Isolate
    }

    /// Barrier: wait for every spawned unit. Returns the number of failed
    /// units, or the error that stopped the run.
    pub async fn finish(mut self) -> Result<usize> {
        let cancel = self.governor.cancel_signal().clone();
        let abort_on_cancel = self.policy == FailurePolicy::AbortAll;
        let mut aborted = false;

        loop {
            tokio::select! {
                joined = self.tasks.join_next() => match joined {
                    Some(joined) => self.handle(joined),
                    None => break,
                },
                _ = cancel.cancelled(), if abort_on_cancel && !aborted => {
                    self.tasks.abort_all();
                    aborted = true;
                }
            }
        }

        if let Some(e) = self.first_error {
            return Err(e);
        }
        if let Some(e) = self.interrupted {
            return Err(e);
        }
        if aborted {
            return Err(Error::Cancelled);
        }
        Ok(self.failed)
    }

    fn reap(&mut self) {
        while let Some(joined) = self.tasks.try_join_next() {
            self.handle(joined);
        }
    }

    fn handle(&mut self, joined: std::result::Result<UnitResult, JoinError>) {
        match joined {
            Ok((_, Ok(()))) => {}
            Ok((label, Err(e))) => self.record_failure(&label, e),
            Err(e) if e.is_cancelled() => {}
            Err(e) => self.record_failure("unit", Error::TaskFailed(e.to_string())),
        }
    }

    fn record_failure(&mut self, label: &str, err: Error) {
        self.failed += 1;
        match self.policy {
            FailurePolicy::AbortAll => {
                if self.first_error.is_none() {
                    error!("{} failed, aborting run: {}", label, err);
                    self.governor.cancel();
                    self.tasks.abort_all();
                    self.first_error = Some(err);
                }
            }
            FailurePolicy::Isolate => {
                warn!("{} failed, continuing: {}", label, err);
            }
        }
    }
}
