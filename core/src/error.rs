use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToneSwitchError {
    #[error("Invalid input size")]
    InvalidInputSize,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, ToneSwitchError>;
