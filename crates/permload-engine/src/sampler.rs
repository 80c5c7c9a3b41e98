//! Distribution sampling: uniform draw → assignment count.

use permload_core::DistributionTable;
use rand::Rng;

/// Map a uniform draw `x` to the count of the bucket it falls in.
///
/// Bucket `i` covers the half-open interval `(cum, cum + p_i]`, where `cum`
/// is the sum of the preceding probabilities. A draw matching no bucket,
/// including `x == 0.0` which the strict lower bound excludes from the first
/// bucket, yields 0.
pub fn sample_assignment_count(table: &DistributionTable, x: f64) -> usize {
    let mut cum = 0.0;
    for bucket in table.buckets() {
        if x > cum && x <= cum + bucket.probability {
            return bucket.count;
        }
        cum += bucket.probability;
    }
    0
}

/// Draws assignment counts from an injected random source.
pub struct Sampler<R> {
    rng: R,
}

impl<R: Rng> Sampler<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Draw `x ∈ [0, 1)` and sample the table with it.
    pub fn draw(&mut self, table: &DistributionTable) -> usize {
        let x: f64 = self.rng.gen();
        sample_assignment_count(table, x)
    }

    /// The underlying random source, for callers that draw other values from
    /// the same stream.
    pub fn rng_mut(&mut self) -> &mut R {
        &mut self.rng
    }
}
