use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid reader id: {0}")]
    InvalidReaderId(String),

    #[error("Battery level must be between 0.0 and 1.0, got {0}")]
    InvalidBatteryLevel(f32),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },
}

pub type Result<T> = std::result::Result<T, Error>;
