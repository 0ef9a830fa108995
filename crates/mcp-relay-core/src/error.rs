use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Primary stream error: {0}")]
    Primary(anyhow::Error),

    #[error("Notification stream error: {0}")]
    Notification(anyhow::Error),

    #[error("Advance step error: {0}")]
    Advance(anyhow::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;
