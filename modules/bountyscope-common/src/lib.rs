pub mod catalog;
pub mod config;
pub mod error;
pub mod indicators;
pub mod text;
pub mod types;

pub use catalog::FallbackCatalog;
pub use config::{Config, RateSettings};
pub use error::{BountyError, Result};
pub use text::*;
pub use types::*;
