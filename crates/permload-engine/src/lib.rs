//! Seeding engine: provisioning under retry and bounded concurrency, plus the
//! environment builders that drive a run.

pub mod classify;
pub mod collector;
pub mod environment;
pub mod governor;
pub mod memory;
pub mod progress;
pub mod provisioner;
pub mod remote;
pub mod retry;
pub mod sampler;
pub mod seeder;
pub mod types;
pub mod window;

pub use collector::HandleCollector;
pub use environment::{FixedEnvironment, PopulationEnvironment};
pub use governor::{CancelSignal, Governor, Permit};
pub use memory::InMemoryPlatform;
pub use progress::{report_progress, spawn_progress_reporter, ProgressSnapshot};
pub use provisioner::Provisioner;
pub use remote::{ApiResult, RemoteApi};
pub use retry::{retry_notify, RetryOutcome, RetryPolicy};
pub use sampler::{sample_assignment_count, Sampler};
pub use seeder::Seeder;
pub use types::*;
pub use window::select_window;
