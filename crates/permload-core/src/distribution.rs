//! Discrete distribution tables: how many resources a synthetic user sees.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Allowed deviation of a table's probability sum from 1.0.
pub const PROBABILITY_TOLERANCE: f64 = 1e-9;

/// One step of a piecewise cumulative distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    /// Share of users falling into this bucket.
    #[serde(alias = "percent_users")]
    pub probability: f64,
    /// Number of resources a user in this bucket is assigned.
    #[serde(alias = "num_orgs", alias = "num_spaces")]
    pub count: usize,
}

impl Bucket {
    pub fn new(probability: f64, count: usize) -> Self {
        Self { probability, count }
    }
}

/// Ordered list of buckets whose probabilities sum to 1.0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DistributionTable {
    buckets: Vec<Bucket>,
}

impl DistributionTable {
    pub fn new(buckets: Vec<Bucket>) -> Self {
        Self { buckets }
    }

    /// Build from `(probability, count)` pairs.
    pub fn from_pairs(pairs: &[(f64, usize)]) -> Self {
        Self::new(pairs.iter().map(|&(p, c)| Bucket::new(p, c)).collect())
    }

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn total_probability(&self) -> f64 {
        self.buckets.iter().map(|b| b.probability).sum()
    }

    /// Largest assignment count any bucket can produce.
    pub fn max_count(&self) -> usize {
        self.buckets.iter().map(|b| b.count).max().unwrap_or(0)
    }

    /// Check the table against the pool it will later select from.
    ///
    /// `label` names the table in error messages.
    pub fn validate(&self, label: &str, pool_size: usize) -> Result<()> {
        for (i, bucket) in self.buckets.iter().enumerate() {
            if !(0.0..=1.0).contains(&bucket.probability) {
                return Err(Error::Validation(format!(
                    "{label}: bucket {i} probability {} is outside [0, 1]",
                    bucket.probability
                )));
            }
            if bucket.count > pool_size {
                return Err(Error::Validation(format!(
                    "{label}: bucket {i} assigns {} resources but only {pool_size} exist",
                    bucket.count
                )));
            }
        }

        let total = self.total_probability();
        if (total - 1.0).abs() > PROBABILITY_TOLERANCE {
            return Err(Error::Validation(format!(
                "{label}: probabilities must sum to 1 (got {total})"
            )));
        }
        Ok(())
    }
}
