//! Shared error types for the test runner

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Unknown outcome token: {token}")]
    UnknownOutcome { token: String },

    #[error("Invalid configuration: {field} = {value}")]
    InvalidConfig { field: String, value: String },
}

pub type SharedResult<T> = Result<T, SharedError>;
