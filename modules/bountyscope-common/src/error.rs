use thiserror::Error;

use crate::types::TargetKind;

pub type Result<T> = std::result::Result<T, BountyError>;

#[derive(Error, Debug)]
pub enum BountyError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Invalid {kind} identifier: {identifier}")]
    InvalidTarget { kind: TargetKind, identifier: String },

    #[error("Validation error: {0}")]
    Validation(String),
}
