use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("Unrecognized conversation state: {0}")]
    Unrecognized(String),

    #[error("Session table unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, StateError>;
