pub mod aggregator;
pub mod code_host;
pub mod error;
pub mod pages;
pub mod resilience;
pub mod scanner;
pub mod scout;
pub mod sources;
#[cfg(any(test, feature = "test-support"))]
pub mod fixtures;
pub mod walker;

pub use aggregator::{aggregate_all, Aggregate, SourceOutcome, SourceReport};
pub use error::{Result, ScoutError};
pub use resilience::{RateLimiter, RequestPolicy, RetryError, RetryPolicy};
pub use scout::Scout;
