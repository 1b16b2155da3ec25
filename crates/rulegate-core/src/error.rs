use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid assignment '{0}': expected key=value")]
    InvalidAssignment(String),

    #[error("invalid attribute: {0}")]
    InvalidAttribute(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
