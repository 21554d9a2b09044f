use thiserror::Error;

/// All errors produced by bargein-core.
#[derive(Debug, Error)]
pub enum BargeInError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("no Tokio runtime available; the arbiter must be created inside a runtime")]
    NoRuntime,

    #[error("speech interrupt failed: {0}")]
    Interrupt(String),

    #[error("interrupt commit failed: {0}")]
    Commit(String),
}

pub type Result<T> = std::result::Result<T, BargeInError>;
