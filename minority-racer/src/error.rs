use minority_core::MinorityError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RacerError>;

#[derive(Error, Debug)]
pub enum RacerError {
    #[error("Core error: {0}")]
    Core(#[from] MinorityError),

    #[error("Invalid racer configuration: {0}")]
    Config(String),

    #[error("Fee bump overflows: {0}")]
    FeeOverflow(String),
}

impl RacerError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
