//! Data model, error types and run configuration for permload.

pub mod config;
pub mod distribution;
pub mod error;
pub mod types;

pub use config::{
    CloudControllerConfig, ExternalEnvironmentConfig, FailurePolicy, RetryConfig, RunConfig,
    TestDataConfig, TestEnvironmentConfig,
};
pub use distribution::{Bucket, DistributionTable};
pub use error::{ApiError, ApiErrorEntry, Error, ErrorClass, Result};
pub use types::*;
